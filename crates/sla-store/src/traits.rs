use sla_statuslist::{DocumentVersion, StatusListDocument};

use crate::error::{StoreError, StoreResult};

/// Persistent home of status list documents, keyed by list name.
///
/// All implementations must satisfy these invariants:
/// - Writes are atomic: a reader sees either the previous document or the
///   new one, never a partial write.
/// - Stored versions only move forward. `write` and `replace` never install a
///   document whose version is not strictly greater than the stored one.
/// - Check-and-set in `write` and `replace` is atomic with respect to other
///   writers on the same store.
/// - List names are validated before any I/O.
pub trait DocumentStore: Send + Sync {
    /// Read the current document for `list`.
    ///
    /// Returns `Ok(None)` if the list does not exist.
    /// Returns `Err` on I/O failure or corruption.
    fn read(&self, list: &str) -> StoreResult<Option<StatusListDocument>>;

    /// Store the first document of a new list. Fails with `AlreadyExists`
    /// if the list exists.
    fn create(&self, list: &str, doc: &StatusListDocument) -> StoreResult<()>;

    /// Store `doc`, rejecting it with `StaleWrite` unless its version is
    /// strictly greater than the stored version. Creates the list if absent.
    fn write(&self, list: &str, doc: &StatusListDocument) -> StoreResult<()>;

    /// Compare-and-swap: store `doc` only if the stored version still equals
    /// `expected`. Fails with `NotFound` if the list is absent and
    /// `StaleWrite` if another writer got there first.
    fn replace(
        &self,
        list: &str,
        expected: &DocumentVersion,
        doc: &StatusListDocument,
    ) -> StoreResult<()>;

    /// Check whether a list exists.
    fn exists(&self, list: &str) -> StoreResult<bool> {
        Ok(self.read(list)?.is_some())
    }

    /// Names of all stored lists, sorted.
    fn list_names(&self) -> StoreResult<Vec<String>>;
}

/// Shared `write` precondition: `doc` must be newer than what is stored.
pub(crate) fn check_forward(
    list: &str,
    stored: Option<&StatusListDocument>,
    doc: &StatusListDocument,
) -> StoreResult<()> {
    match stored {
        Some(current) if doc.version <= current.version => Err(StoreError::StaleWrite {
            list: list.to_string(),
            stored: current.version.to_string(),
            attempted: doc.version.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Shared `replace` precondition: the stored version is still `expected` and
/// `doc` moves it forward.
pub(crate) fn check_swap(
    list: &str,
    stored: Option<&StatusListDocument>,
    expected: &DocumentVersion,
    doc: &StatusListDocument,
) -> StoreResult<()> {
    let current = stored.ok_or_else(|| StoreError::NotFound(list.to_string()))?;
    if current.version != *expected {
        return Err(StoreError::StaleWrite {
            list: list.to_string(),
            stored: current.version.to_string(),
            attempted: expected.to_string(),
        });
    }
    check_forward(list, stored, doc)
}
