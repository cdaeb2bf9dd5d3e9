//! List name validation.
//!
//! List names become file names under the storage root and path segments of
//! published URLs, so they are restricted to a conservative alphabet:
//! - Must be non-empty and at most 128 characters
//! - Only ASCII letters, digits, `.`, `_`, `-`
//! - Must not start with `.`
//! - Must not contain `..`

use crate::error::{StoreError, StoreResult};

pub const MAX_LIST_NAME_LEN: usize = 128;

/// Validate a list name, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use sla_store::names::validate_list_name;
///
/// assert!(validate_list_name("main").is_ok());
/// assert!(validate_list_name("tenant-a.revocation").is_ok());
/// assert!(validate_list_name("../etc").is_err());
/// ```
pub fn validate_list_name(name: &str) -> StoreResult<()> {
    let invalid = |reason: &str| {
        Err(StoreError::InvalidListName {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };

    if name.is_empty() {
        return invalid("list name must not be empty");
    }
    if name.len() > MAX_LIST_NAME_LEN {
        return invalid("list name is longer than 128 characters");
    }
    if let Some(ch) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return invalid(&format!("contains forbidden character: {ch:?}"));
    }
    if name.starts_with('.') {
        return invalid("must not start with '.'");
    }
    if name.contains("..") {
        return invalid("must not contain '..'");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_simple_names() {
        for name in ["main", "list-1", "tenant_a.v2", "A", &"x".repeat(128)] {
            assert!(validate_list_name(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn rejects_traversal_and_separators() {
        for name in [
            "",
            ".hidden",
            "a..b",
            "../x",
            "a/b",
            "a\\b",
            "with space",
            "emoji\u{1F600}",
            &"x".repeat(129),
        ] {
            assert!(
                matches!(validate_list_name(name), Err(StoreError::InvalidListName { .. })),
                "{name:?} should be rejected"
            );
        }
    }
}
