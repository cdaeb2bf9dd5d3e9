use std::fmt;
use std::str::FromStr;

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

type Blake2b256 = Blake2b<U32>;

/// 256-bit BLAKE2b content digest.
///
/// This is the value compared between the off-chain status list and its
/// on-chain anchor, so it is plain unkeyed BLAKE2b with a 32-byte output and
/// no domain prefix: any BLAKE2b-256 tool hashing the published bytes must
/// arrive at the same digest.
///
/// Serialized as lowercase hex. Parsing accepts an optional `0x` prefix and
/// either case.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; 32]);

impl Digest {
    /// Digest raw bytes.
    pub fn of(data: &[u8]) -> Self {
        Self(Blake2b256::digest(data).into())
    }

    /// Wrap a pre-computed 32-byte hash.
    pub const fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    /// The all-zero digest.
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex, no prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// `0x`-prefixed hex, the `bytes32` rendering used by ledger tooling.
    pub fn to_prefixed_hex(&self) -> String {
        format!("0x{}", self.to_hex())
    }

    /// First 8 hex characters.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from hex, tolerating a `0x` prefix and uppercase digits.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let s = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Case-insensitive comparison of two hex renderings, ignoring `0x`.
    ///
    /// Returns `false` if either side is not a valid digest.
    pub fn hex_eq(a: &str, b: &str) -> bool {
        match (Self::from_hex(a), Self::from_hex(b)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.short_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; 32]> for Digest {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
