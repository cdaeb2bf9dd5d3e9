use serde::{Deserialize, Serialize};

/// Ed25519 signing key (private).
pub struct SigningKey(ed25519_dalek::SigningKey);

/// Ed25519 verifying key (public).
#[derive(Clone, PartialEq, Eq)]
pub struct VerifyingKey(ed25519_dalek::VerifyingKey);

/// Ed25519 signature.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(#[serde(with = "signature_serde")] ed25519_dalek::Signature);

impl SigningKey {
    /// Generate a new random signing key.
    pub fn generate() -> Self {
        let mut csprng = rand::thread_rng();
        Self(ed25519_dalek::SigningKey::generate(&mut csprng))
    }

    /// Create from raw 32-byte secret.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(ed25519_dalek::SigningKey::from_bytes(&bytes))
    }

    /// Parse a hex-encoded 32-byte secret, as stored in key files.
    pub fn from_hex(s: &str) -> Result<Self, SignatureError> {
        Ok(Self::from_bytes(decode_key_hex(s)?))
    }

    /// The corresponding public verifying key.
    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey(self.0.verifying_key())
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Signature {
        use ed25519_dalek::Signer;
        Signature(self.0.sign(message))
    }

    /// Raw secret key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0.as_bytes())
    }
}

impl VerifyingKey {
    /// Verify a signature on a message.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), SignatureError> {
        use ed25519_dalek::Verifier;
        self.0
            .verify(message, &signature.0)
            .map_err(|_| SignatureError::InvalidSignature)
    }

    /// Short key identifier: first 8 bytes of the BLAKE3 digest of the
    /// public key, hex encoded. Used as the default JWS `kid` fragment.
    pub fn key_id(&self) -> String {
        hex::encode(&blake3::hash(&self.0.to_bytes()).as_bytes()[..8])
    }

    /// Raw public key bytes.
    pub fn as_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Create from raw 32-byte public key.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, SignatureError> {
        let key = ed25519_dalek::VerifyingKey::from_bytes(&bytes)
            .map_err(|_| SignatureError::InvalidKey)?;
        Ok(Self(key))
    }

    pub fn from_hex(s: &str) -> Result<Self, SignatureError> {
        Self::from_bytes(decode_key_hex(s)?)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_bytes())
    }
}

impl Signature {
    pub fn to_bytes(&self) -> [u8; 64] {
        self.0.to_bytes()
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, SignatureError> {
        let arr: [u8; 64] = bytes
            .try_into()
            .map_err(|_| SignatureError::InvalidSignature)?;
        Ok(Self(ed25519_dalek::Signature::from_bytes(&arr)))
    }
}

fn decode_key_hex(s: &str) -> Result<[u8; 32], SignatureError> {
    let s = s.trim();
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s).map_err(|_| SignatureError::InvalidKey)?;
    bytes.try_into().map_err(|_| SignatureError::InvalidKey)
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SigningKey(<redacted>)")
    }
}

impl std::fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VerifyingKey({})", hex::encode(self.0.to_bytes()))
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Signature({}...)",
            hex::encode(&self.0.to_bytes()[..8])
        )
    }
}

/// Errors from signing operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid key")]
    InvalidKey,
}

mod signature_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(sig: &ed25519_dalek::Signature, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(&sig.to_bytes())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<ed25519_dalek::Signature, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes: Vec<u8> = Vec::deserialize(deserializer)?;
        let arr: [u8; 64] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 64-byte signature"))?;
        Ok(ed25519_dalek::Signature::from_bytes(&arr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let sk = SigningKey::generate();
        let vk = sk.verifying_key();
        let message = b"hello world";
        let sig = sk.sign(message);
        assert!(vk.verify(message, &sig).is_ok());
    }

    #[test]
    fn verify_fails_on_wrong_message() {
        let sk = SigningKey::generate();
        let vk = sk.verifying_key();
        let sig = sk.sign(b"correct message");
        assert!(vk.verify(b"wrong message", &sig).is_err());
    }

    #[test]
    fn verify_fails_with_wrong_key() {
        let sk1 = SigningKey::generate();
        let sk2 = SigningKey::generate();
        let sig = sk1.sign(b"message");
        assert!(sk2.verifying_key().verify(b"message", &sig).is_err());
    }

    #[test]
    fn hex_roundtrip_preserves_keys() {
        let sk = SigningKey::generate();
        let sk2 = SigningKey::from_hex(&sk.to_hex()).unwrap();
        assert_eq!(sk.verifying_key(), sk2.verifying_key());

        let vk = sk.verifying_key();
        assert_eq!(VerifyingKey::from_hex(&format!("0x{}", vk.to_hex())).unwrap(), vk);
    }

    #[test]
    fn from_hex_rejects_short_input() {
        assert_eq!(SigningKey::from_hex("abcd").unwrap_err(), SignatureError::InvalidKey);
        assert_eq!(VerifyingKey::from_hex("zz").unwrap_err(), SignatureError::InvalidKey);
    }

    #[test]
    fn key_id_is_stable_and_distinct() {
        let sk1 = SigningKey::from_bytes([1; 32]);
        let sk2 = SigningKey::from_bytes([2; 32]);
        assert_eq!(sk1.verifying_key().key_id(), sk1.verifying_key().key_id());
        assert_eq!(sk1.verifying_key().key_id().len(), 16);
        assert_ne!(sk1.verifying_key().key_id(), sk2.verifying_key().key_id());
    }

    #[test]
    fn signature_slice_roundtrip() {
        let sk = SigningKey::generate();
        let sig = sk.sign(b"test");
        assert_eq!(Signature::from_slice(&sig.to_bytes()).unwrap(), sig);
        assert!(Signature::from_slice(&[0u8; 10]).is_err());
    }

    #[test]
    fn signature_serde_roundtrip() {
        let sk = SigningKey::generate();
        let sig = sk.sign(b"test");
        let json = serde_json::to_string(&sig).unwrap();
        let parsed: Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(sig, parsed);
    }

    #[test]
    fn debug_redacts_signing_key() {
        let sk = SigningKey::generate();
        let debug = format!("{sk:?}");
        assert!(debug.contains("redacted"));
    }
}
