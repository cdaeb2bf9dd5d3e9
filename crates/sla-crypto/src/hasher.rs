use sla_types::Digest;

/// Content hasher for anchored payloads.
///
/// Digests produced here are compared against digests computed by
/// third-party tools over the bytes a verifier downloads, so no domain tag is
/// prepended: the digest is plain BLAKE2b-256 of the bytes.
pub struct ContentHasher;

impl ContentHasher {
    /// Digest raw bytes.
    pub fn hash(data: &[u8]) -> Digest {
        Digest::of(data)
    }

    /// Digest the compact JSON serialization of a value.
    ///
    /// Field order follows the value's `Serialize` impl, so callers that need
    /// a canonical form must serialize a struct with a fixed field order.
    pub fn hash_json<T: serde::Serialize>(value: &T) -> Result<Digest, HasherError> {
        let data =
            serde_json::to_vec(value).map_err(|e| HasherError::Serialization(e.to_string()))?;
        Ok(Self::hash(&data))
    }

    /// Verify that data produces the expected digest.
    pub fn verify(data: &[u8], expected: &Digest) -> bool {
        Self::hash(data) == *expected
    }
}

/// Errors from hashing operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HasherError {
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let data = b"hello world";
        assert_eq!(ContentHasher::hash(data), ContentHasher::hash(data));
    }

    #[test]
    fn verify_correct_and_tampered() {
        let id = ContentHasher::hash(b"original");
        assert!(ContentHasher::verify(b"original", &id));
        assert!(!ContentHasher::verify(b"tampered", &id));
    }

    #[test]
    fn hash_json_follows_struct_field_order() {
        #[derive(serde::Serialize)]
        struct Ordered {
            b: u8,
            a: u8,
        }
        let digest = ContentHasher::hash_json(&Ordered { b: 1, a: 2 }).unwrap();
        assert_eq!(digest, ContentHasher::hash(br#"{"b":1,"a":2}"#));
    }

    #[test]
    fn hash_matches_digest_of() {
        assert_eq!(ContentHasher::hash(b"status-list"), Digest::of(b"status-list"));
    }
}
