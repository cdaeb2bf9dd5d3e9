use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::error::{StatusListError, StatusListResult};

/// Fixed-capacity bit array backing a status list.
///
/// Bit `i` lives in byte `i / 8` at position `i % 8`, least-significant bit
/// first. The capacity never changes after construction.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Bitset {
    capacity: usize,
    bytes: Vec<u8>,
}

impl Bitset {
    /// All-zero bitset of `capacity` bits.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            bytes: vec![0; byte_len_for(capacity)],
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Length of the backing buffer, `ceil(capacity / 8)`.
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn get(&self, index: usize) -> StatusListResult<bool> {
        self.check(index)?;
        Ok(self.bytes[index / 8] & (1 << (index % 8)) != 0)
    }

    pub fn set(&mut self, index: usize, value: bool) -> StatusListResult<()> {
        self.check(index)?;
        let mask = 1u8 << (index % 8);
        if value {
            self.bytes[index / 8] |= mask;
        } else {
            self.bytes[index / 8] &= !mask;
        }
        Ok(())
    }

    /// Number of set bits.
    pub fn count_set(&self) -> usize {
        self.bytes.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Indices of set bits in ascending order.
    pub fn iter_set(&self) -> impl Iterator<Item = usize> + '_ {
        self.bytes.iter().enumerate().flat_map(|(byte_idx, &byte)| {
            (0..8)
                .filter(move |bit| byte & (1 << bit) != 0)
                .map(move |bit| byte_idx * 8 + bit)
        })
    }

    /// Unpadded URL-safe base64 of the backing buffer.
    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(&self.bytes)
    }

    /// Decode an encoded list for a list of `capacity` bits.
    ///
    /// Strict: the decoded length must be exactly `ceil(capacity / 8)` and no
    /// bit at or beyond `capacity` may be set.
    pub fn decode(encoded: &str, capacity: usize) -> StatusListResult<Self> {
        if encoded.contains('=') {
            return Err(StatusListError::MalformedEncoding(
                "padding characters are not allowed".into(),
            ));
        }
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|e| StatusListError::MalformedEncoding(e.to_string()))?;

        let expected = byte_len_for(capacity);
        if bytes.len() != expected {
            return Err(StatusListError::MalformedEncoding(format!(
                "expected {expected} bytes for capacity {capacity}, got {}",
                bytes.len()
            )));
        }

        let tail_bits = capacity % 8;
        if tail_bits != 0 {
            let last = bytes[expected - 1];
            if last >> tail_bits != 0 {
                return Err(StatusListError::MalformedEncoding(format!(
                    "bits set beyond capacity {capacity}"
                )));
            }
        }

        Ok(Self { capacity, bytes })
    }

    fn check(&self, index: usize) -> StatusListResult<()> {
        if index >= self.capacity {
            return Err(StatusListError::IndexOutOfBounds {
                index,
                capacity: self.capacity,
            });
        }
        Ok(())
    }
}

fn byte_len_for(capacity: usize) -> usize {
    capacity.div_ceil(8)
}

impl fmt::Debug for Bitset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bitset(capacity={}, set={})",
            self.capacity,
            self.count_set()
        )
    }
}
