//! Credential identities.

use std::fmt;

use crate::error::{CxkError, Result};

/// Longest identity accepted as a credential key.
const MAX_IDENTITY_LEN: usize = 100;

/// Validated key naming the server or account a credential belongs to.
///
/// Identities are case-sensitive and safe to embed in file paths.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identity(String);

impl Identity {
    /// Validates and wraps an identity.
    ///
    /// # Errors
    ///
    /// Returns [`CxkError::InvalidIdentity`] if the identity is empty, too long,
    /// contains path separators, `..`, or control characters.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(CxkError::invalid_identity(raw, "identity cannot be empty"));
        }

        if raw.chars().count() > MAX_IDENTITY_LEN {
            return Err(CxkError::invalid_identity(
                raw,
                format!("identity too long (max {MAX_IDENTITY_LEN} characters)"),
            ));
        }

        // Check for path traversal or invalid chars
        if raw.contains('/') || raw.contains('\\') || raw.contains("..") {
            return Err(CxkError::invalid_identity(
                raw,
                "identity cannot contain path separators or '..'",
            ));
        }

        if raw.chars().any(char::is_control) {
            return Err(CxkError::invalid_identity(
                raw,
                "identity cannot contain control characters",
            ));
        }

        Ok(Self(raw.to_string()))
    }

    /// The identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_server_names() {
        for name in ["jira", "GitHub", "my-server_01", "linear.app", "ünïcode"] {
            assert_eq!(Identity::parse(name).unwrap().as_str(), name);
        }
    }

    #[test]
    fn identities_are_case_sensitive() {
        assert_ne!(Identity::parse("Jira").unwrap(), Identity::parse("jira").unwrap());
    }

    #[test]
    fn rejects_empty() {
        assert!(matches!(
            Identity::parse(""),
            Err(CxkError::InvalidIdentity { .. })
        ));
    }

    #[test]
    fn rejects_path_traversal() {
        assert!(Identity::parse("../escape").is_err());
        assert!(Identity::parse("..").is_err());
        assert!(Identity::parse("foo/bar").is_err());
        assert!(Identity::parse("foo\\bar").is_err());
    }

    #[test]
    fn rejects_control_characters() {
        assert!(Identity::parse("a\0b").is_err());
        assert!(Identity::parse("line\nbreak").is_err());
    }

    #[test]
    fn rejects_long_identity() {
        assert!(Identity::parse(&"a".repeat(MAX_IDENTITY_LEN)).is_ok());
        assert!(Identity::parse(&"a".repeat(MAX_IDENTITY_LEN + 1)).is_err());
    }
}
