use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sla_crypto::ContentHasher;
use sla_types::{Clock, Digest, StatusPurpose};

use crate::bitset::Bitset;
use crate::error::{StatusListError, StatusListResult};
use crate::version::DocumentVersion;

/// A published status list: the bitmap plus the metadata a verifier needs to
/// check it against its ledger anchor.
///
/// `hash` is the BLAKE2b-256 digest of [`canonical_bytes`](Self::canonical_bytes),
/// which is also the exact payload published at `id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusListDocument {
    /// Stable URI the list is published at.
    pub id: String,
    /// Issuer DID.
    pub issuer: String,
    pub status_purpose: StatusPurpose,
    /// Bit capacity, fixed for the lifetime of the list.
    pub size: usize,
    pub encoded_list: String,
    pub version: DocumentVersion,
    pub hash: Digest,
    #[serde(with = "sla_types::temporal::canonical")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "sla_types::temporal::canonical")]
    pub updated_at: DateTime<Utc>,
}

/// Every document field except `hash`, in canonical order.
///
/// Serializing this struct with `serde_json::to_vec` yields the canonical
/// bytes: compact JSON, keys in declaration order, timestamps in canonical
/// millisecond form.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalFields<'a> {
    pub id: &'a str,
    pub issuer: &'a str,
    pub status_purpose: StatusPurpose,
    pub size: usize,
    pub encoded_list: &'a str,
    pub version: &'a DocumentVersion,
    #[serde(with = "sla_types::temporal::canonical")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "sla_types::temporal::canonical")]
    pub updated_at: DateTime<Utc>,
}

impl CanonicalFields<'_> {
    pub fn to_bytes(&self) -> StatusListResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| StatusListError::Serialization(e.to_string()))
    }
}

/// Digest of a canonical field set.
pub fn compute_hash(fields: &CanonicalFields<'_>) -> StatusListResult<Digest> {
    ContentHasher::hash_json(fields).map_err(|e| StatusListError::Serialization(e.to_string()))
}

impl StatusListDocument {
    /// New list with every bit unset. Creation and update time are both
    /// `clock.now()`.
    pub fn create(
        id: impl Into<String>,
        issuer: impl Into<String>,
        purpose: StatusPurpose,
        capacity: usize,
        clock: &dyn Clock,
    ) -> StatusListResult<Self> {
        if capacity == 0 {
            return Err(StatusListError::InvalidCapacity(capacity));
        }
        let now = clock.now();
        let version = DocumentVersion::genesis(now);
        let mut doc = Self {
            id: id.into(),
            issuer: issuer.into(),
            status_purpose: purpose,
            size: capacity,
            encoded_list: Bitset::new(capacity).encode(),
            updated_at: version.timestamp(),
            created_at: version.timestamp(),
            version,
            hash: Digest::zero(),
        };
        doc.hash = doc.compute_hash()?;
        Ok(doc)
    }

    /// Return a new document with bit `index` set to `value`.
    ///
    /// The successor version and `updatedAt` come from the same
    /// hybrid-logical-clock step, so `updatedAt` never moves backwards even
    /// if the clock does. The result always carries a new version, even when
    /// the bit already had the requested value.
    pub fn apply_update(
        &self,
        index: usize,
        value: bool,
        clock: &dyn Clock,
    ) -> StatusListResult<Self> {
        let mut bits = self.bitset()?;
        bits.set(index, value)?;

        let version = self.version.successor(clock.now(), &self.hash)?;
        let mut next = Self {
            encoded_list: bits.encode(),
            updated_at: version.timestamp(),
            version,
            hash: Digest::zero(),
            ..self.clone()
        };
        next.hash = next.compute_hash()?;
        Ok(next)
    }

    /// Borrow the hashed fields.
    pub fn canonical_fields(&self) -> CanonicalFields<'_> {
        CanonicalFields {
            id: &self.id,
            issuer: &self.issuer,
            status_purpose: self.status_purpose,
            size: self.size,
            encoded_list: &self.encoded_list,
            version: &self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// The published payload: canonical serialization of every field except
    /// `hash`. `Digest::of(canonical_bytes) == hash` for a valid document.
    pub fn canonical_bytes(&self) -> StatusListResult<Vec<u8>> {
        self.canonical_fields().to_bytes()
    }

    /// Recompute the digest from the current fields.
    pub fn compute_hash(&self) -> StatusListResult<Digest> {
        compute_hash(&self.canonical_fields())
    }

    /// Whether the stored `hash` matches the fields.
    pub fn verify_hash(&self) -> StatusListResult<bool> {
        Ok(ContentHasher::verify(&self.canonical_bytes()?, &self.hash))
    }

    /// Decode the bitmap using the document's own capacity.
    pub fn bitset(&self) -> StatusListResult<Bitset> {
        Bitset::decode(&self.encoded_list, self.size)
    }

    /// Read one status bit.
    pub fn status(&self, index: usize) -> StatusListResult<bool> {
        self.bitset()?.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;
    use sla_types::FixedClock;

    const ID: &str = "https://status.example.org/lists/main.json";
    const ISSUER: &str = "did:example:issuer";

    fn clock() -> FixedClock {
        FixedClock::at_millis(1_736_935_200_000)
    }

    fn doc(clock: &FixedClock) -> StatusListDocument {
        StatusListDocument::create(ID, ISSUER, StatusPurpose::Revocation, 64, clock).unwrap()
    }

    #[test]
    fn create_is_deterministic() {
        let a = doc(&clock());
        let b = doc(&clock());
        assert_eq!(a, b);
        assert_eq!(a.created_at, a.updated_at);
        assert!(a.version.is_genesis());
        assert!(a.verify_hash().unwrap());
        assert_eq!(a.bitset().unwrap().count_set(), 0);
    }

    #[test]
    fn create_rejects_zero_capacity() {
        assert_eq!(
            StatusListDocument::create(ID, ISSUER, StatusPurpose::Revocation, 0, &clock()),
            Err(StatusListError::InvalidCapacity(0))
        );
    }

    #[test]
    fn canonical_bytes_have_fixed_key_order() {
        let d = StatusListDocument::create(ID, ISSUER, StatusPurpose::Suspension, 8, &clock())
            .unwrap();
        let text = String::from_utf8(d.canonical_bytes().unwrap()).unwrap();
        assert_eq!(
            text,
            format!(
                r#"{{"id":"{ID}","issuer":"{ISSUER}","statusPurpose":"suspension","size":8,"encodedList":"AA","version":"2025-01-15T10:00:00.000Z","createdAt":"2025-01-15T10:00:00.000Z","updatedAt":"2025-01-15T10:00:00.000Z"}}"#
            )
        );
        assert_eq!(Digest::of(text.as_bytes()), d.hash);
        // Any BLAKE2b-256 implementation over the published bytes agrees.
        assert_eq!(
            d.hash.to_hex(),
            "50c6c8f6e0672b63f50bfe96df1f6a83479f0b06dc32ae73c8330962eb8100ed"
        );
    }

    #[test]
    fn every_field_feeds_the_hash() {
        let base = doc(&clock());
        let h = base.compute_hash().unwrap();

        let mut variants = Vec::new();
        let mut d = base.clone();
        d.id.push('x');
        variants.push(d);
        let mut d = base.clone();
        d.issuer.push('x');
        variants.push(d);
        let mut d = base.clone();
        d.status_purpose = StatusPurpose::Suspension;
        variants.push(d);
        let mut d = base.clone();
        d.size = 72;
        variants.push(d);
        let mut d = base.clone();
        d.encoded_list = base.apply_update(0, true, &clock()).unwrap().encoded_list;
        variants.push(d);
        let mut d = base.clone();
        d.version = base.version.successor(base.updated_at, &base.hash).unwrap();
        variants.push(d);
        let mut d = base.clone();
        d.created_at += Duration::milliseconds(1);
        variants.push(d);
        let mut d = base.clone();
        d.updated_at += Duration::milliseconds(1);
        variants.push(d);

        for v in variants {
            assert_ne!(v.compute_hash().unwrap(), h, "{v:?}");
        }
    }

    #[test]
    fn hash_ignores_stored_hash_field() {
        let mut d = doc(&clock());
        let h = d.compute_hash().unwrap();
        d.hash = Digest::zero();
        assert_eq!(d.compute_hash().unwrap(), h);
        assert!(!d.verify_hash().unwrap());
    }

    #[test]
    fn apply_update_sets_bit_and_rehashes() {
        let clock = clock();
        let d0 = doc(&clock);
        clock.advance(Duration::seconds(1));
        let d1 = d0.apply_update(42, true, &clock).unwrap();

        assert!(d1.status(42).unwrap());
        assert!(!d0.status(42).unwrap());
        assert!(d1.version > d0.version);
        assert_eq!(d1.version.parent(), Some(d0.hash.short_hex().as_str()));
        assert_eq!(d1.updated_at, clock.now());
        assert_eq!(d1.created_at, d0.created_at);
        assert_ne!(d1.hash, d0.hash);
        assert!(d1.verify_hash().unwrap());
    }

    #[test]
    fn apply_update_out_of_bounds() {
        let d = doc(&clock());
        assert_eq!(
            d.apply_update(64, true, &clock()),
            Err(StatusListError::IndexOutOfBounds { index: 64, capacity: 64 })
        );
    }

    #[test]
    fn apply_update_propagates_malformed_encoding() {
        let mut d = doc(&clock());
        d.encoded_list = "not base64!".into();
        assert!(matches!(
            d.apply_update(0, true, &clock()),
            Err(StatusListError::MalformedEncoding(_))
        ));
    }

    #[test]
    fn regressing_clock_keeps_updated_at_monotonic() {
        let clock = clock();
        let d0 = doc(&clock);
        clock.advance(Duration::minutes(-5));
        let d1 = d0.apply_update(1, true, &clock).unwrap();
        assert_eq!(d1.updated_at, d0.updated_at);
        assert_eq!(d1.version.counter(), 1);
        assert!(d1.version > d0.version);
    }

    #[test]
    fn serde_roundtrip_preserves_hash() {
        let d = doc(&clock()).apply_update(3, true, &clock()).unwrap();
        let json = serde_json::to_string(&d).unwrap();
        assert!(json.contains("\"statusPurpose\":\"revocation\""));
        assert!(json.contains("\"encodedList\""));
        let back: StatusListDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
        assert!(back.verify_hash().unwrap());
    }

    proptest! {
        #[test]
        fn update_sequences_are_strictly_versioned(
            ops in proptest::collection::vec((0usize..64, any::<bool>(), -2_000i64..2_000), 1..40),
        ) {
            let clock = clock();
            let mut d = doc(&clock);
            for (index, value, step) in ops {
                clock.advance(Duration::milliseconds(step));
                let next = d.apply_update(index, value, &clock).unwrap();
                prop_assert!(next.version > d.version);
                prop_assert!(next.updated_at >= d.updated_at);
                prop_assert_eq!(next.status(index).unwrap(), value);
                prop_assert!(next.verify_hash().unwrap());
                d = next;
            }
        }
    }
}
