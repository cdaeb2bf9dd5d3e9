use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// What a set bit in a status list means.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusPurpose {
    /// A set bit permanently revokes the credential at that index.
    Revocation,
    /// A set bit temporarily suspends the credential at that index.
    Suspension,
}

impl StatusPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Revocation => "revocation",
            Self::Suspension => "suspension",
        }
    }
}

impl Default for StatusPurpose {
    fn default() -> Self {
        Self::Revocation
    }
}

impl fmt::Display for StatusPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusPurpose {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "revocation" => Ok(Self::Revocation),
            "suspension" => Ok(Self::Suspension),
            other => Err(TypeError::UnknownPurpose(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_is_lowercase() {
        assert_eq!(
            serde_json::to_string(&StatusPurpose::Suspension).unwrap(),
            "\"suspension\""
        );
        let p: StatusPurpose = serde_json::from_str("\"revocation\"").unwrap();
        assert_eq!(p, StatusPurpose::Revocation);
    }

    #[test]
    fn from_str_rejects_unknown() {
        assert_eq!("suspension".parse::<StatusPurpose>().unwrap(), StatusPurpose::Suspension);
        assert!("message".parse::<StatusPurpose>().is_err());
    }
}
