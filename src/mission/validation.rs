//! Identifier validation for anything that ends up inside a storage key.
//!
//! Store keys are `:`-separated (`progress:<user>:<requirement>`), so every id
//! that lands in one is checked here before the write.

use std::collections::HashSet;

/// Identifier validation errors with helpful messages
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    #[error("{kind} is empty")]
    Empty { kind: &'static str },

    #[error("{kind} is too long (maximum {max} characters)")]
    TooLong { kind: &'static str, max: usize },

    #[error("{kind} cannot start or end with whitespace")]
    InvalidWhitespace { kind: &'static str },

    #[error("{kind} contains invalid characters: {chars}")]
    InvalidCharacters { kind: &'static str, chars: String },
}

/// Maximum length of any identifier used in a store key.
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Validate an identifier of the given kind (`"username"`, `"mission id"`, ...).
///
/// Allowed: ASCII alphanumerics plus `_`, `-` and `.`. Returns the identifier
/// unchanged on success.
pub fn validate_identifier<'a>(kind: &'static str, id: &'a str) -> Result<&'a str, IdentifierError> {
    if id.is_empty() {
        return Err(IdentifierError::Empty { kind });
    }
    if id.trim() != id {
        return Err(IdentifierError::InvalidWhitespace { kind });
    }
    if id.chars().count() > MAX_IDENTIFIER_LEN {
        return Err(IdentifierError::TooLong {
            kind,
            max: MAX_IDENTIFIER_LEN,
        });
    }

    let invalid: HashSet<char> = id
        .chars()
        .filter(|ch| !(ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.')))
        .collect();
    if !invalid.is_empty() {
        let mut chars: Vec<char> = invalid.into_iter().collect();
        chars.sort_unstable();
        let chars = chars
            .into_iter()
            .map(|c| {
                if c.is_control() {
                    format!("\\u{{{:04x}}}", c as u32)
                } else {
                    c.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("");
        return Err(IdentifierError::InvalidCharacters { kind, chars });
    }

    Ok(id)
}

pub fn validate_username(username: &str) -> Result<&str, IdentifierError> {
    validate_identifier("username", username)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_identifiers() {
        for id in ["alice", "first_post", "m-01", "v1.2", "A"] {
            assert_eq!(validate_identifier("id", id), Ok(id));
        }
    }

    #[test]
    fn rejects_key_separator_and_spaces() {
        let err = validate_identifier("mission id", "a:b").unwrap_err();
        assert_eq!(
            err,
            IdentifierError::InvalidCharacters {
                kind: "mission id",
                chars: ":".to_string()
            }
        );
        assert!(matches!(
            validate_username(" bob"),
            Err(IdentifierError::InvalidWhitespace { .. })
        ));
        assert!(matches!(
            validate_username("bob smith"),
            Err(IdentifierError::InvalidCharacters { .. })
        ));
    }

    #[test]
    fn rejects_empty_and_overlong() {
        assert!(matches!(
            validate_username(""),
            Err(IdentifierError::Empty { .. })
        ));
        let long = "x".repeat(MAX_IDENTIFIER_LEN + 1);
        assert!(matches!(
            validate_username(&long),
            Err(IdentifierError::TooLong { max: MAX_IDENTIFIER_LEN, .. })
        ));
    }
}
