//! Compact JWS serialization with the `EdDSA` algorithm (RFC 7515 / RFC 8037).
//!
//! Tokens are `base64url(header) "." base64url(payload) "." base64url(sig)`,
//! all segments unpadded. The signature covers the ASCII bytes of the first
//! two segments joined by `.`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::signer::{Signature, SigningKey, VerifyingKey};

pub const ALG_EDDSA: &str = "EdDSA";

/// Protected JWS header.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwsHeader {
    pub alg: String,
    pub kid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

impl JwsHeader {
    pub fn eddsa(kid: impl Into<String>) -> Self {
        Self {
            alg: ALG_EDDSA.to_string(),
            kid: kid.into(),
            typ: Some("JWT".to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum JwsError {
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("signature verification failed")]
    BadSignature,
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Sign `claims` and return the compact token.
pub fn sign<T: Serialize>(
    header: &JwsHeader,
    claims: &T,
    key: &SigningKey,
) -> Result<String, JwsError> {
    if header.alg != ALG_EDDSA {
        return Err(JwsError::UnsupportedAlgorithm(header.alg.clone()));
    }
    let header_json =
        serde_json::to_vec(header).map_err(|e| JwsError::Serialization(e.to_string()))?;
    let claims_json =
        serde_json::to_vec(claims).map_err(|e| JwsError::Serialization(e.to_string()))?;

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header_json),
        URL_SAFE_NO_PAD.encode(claims_json)
    );
    let signature = key.sign(signing_input.as_bytes());
    Ok(format!(
        "{signing_input}.{}",
        URL_SAFE_NO_PAD.encode(signature.to_bytes())
    ))
}

/// Verify a compact token against `key` and decode its header and claims.
pub fn verify<T: DeserializeOwned>(
    token: &str,
    key: &VerifyingKey,
) -> Result<(JwsHeader, T), JwsError> {
    let mut parts = token.split('.');
    let (Some(h), Some(p), Some(s), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(JwsError::Malformed("expected three segments".into()));
    };

    let header: JwsHeader = decode_segment(h)?;
    if header.alg != ALG_EDDSA {
        return Err(JwsError::UnsupportedAlgorithm(header.alg));
    }

    let sig_bytes = URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|e| JwsError::Malformed(format!("signature: {e}")))?;
    let signature =
        Signature::from_slice(&sig_bytes).map_err(|_| JwsError::Malformed("signature length".into()))?;

    let signing_input_len = h.len() + 1 + p.len();
    key.verify(token[..signing_input_len].as_bytes(), &signature)
        .map_err(|_| JwsError::BadSignature)?;

    let claims = decode_segment(p)?;
    Ok((header, claims))
}

fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T, JwsError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| JwsError::Malformed(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| JwsError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn sign_then_verify() {
        let sk = SigningKey::from_bytes([7; 32]);
        let header = JwsHeader::eddsa("did:example:issuer#key-1");
        let token = sign(&header, &json!({"iss": "did:example:issuer"}), &sk).unwrap();

        assert_eq!(token.split('.').count(), 3);
        assert!(!token.contains('='));

        let (h, claims): (JwsHeader, Value) = verify(&token, &sk.verifying_key()).unwrap();
        assert_eq!(h, header);
        assert_eq!(claims["iss"], "did:example:issuer");
    }

    #[test]
    fn signing_is_deterministic() {
        let sk = SigningKey::from_bytes([3; 32]);
        let header = JwsHeader::eddsa("k");
        let a = sign(&header, &json!({"n": 1}), &sk).unwrap();
        let b = sign(&header, &json!({"n": 1}), &sk).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn tampered_payload_fails() {
        let sk = SigningKey::from_bytes([9; 32]);
        let token = sign(&JwsHeader::eddsa("k"), &json!({"bit": 0}), &sk).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let forged_payload = URL_SAFE_NO_PAD.encode(br#"{"bit":1}"#);
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);
        assert_eq!(
            verify::<Value>(&forged, &sk.verifying_key()).unwrap_err(),
            JwsError::BadSignature
        );
    }

    #[test]
    fn wrong_key_fails() {
        let sk = SigningKey::from_bytes([1; 32]);
        let other = SigningKey::from_bytes([2; 32]);
        let token = sign(&JwsHeader::eddsa("k"), &json!({}), &sk).unwrap();
        assert!(verify::<Value>(&token, &other.verifying_key()).is_err());
    }

    #[test]
    fn rejects_other_algorithms_and_shapes() {
        let sk = SigningKey::from_bytes([1; 32]);
        let mut header = JwsHeader::eddsa("k");
        header.alg = "HS256".into();
        assert!(matches!(
            sign(&header, &json!({}), &sk),
            Err(JwsError::UnsupportedAlgorithm(_))
        ));
        assert!(matches!(
            verify::<Value>("a.b", &sk.verifying_key()),
            Err(JwsError::Malformed(_))
        ));
        assert!(matches!(
            verify::<Value>("a.b.c.d", &sk.verifying_key()),
            Err(JwsError::Malformed(_))
        ));
    }
}
