//! Identifier validation. Table, schema, and column names are interpolated into SQL text,
//! so only plain identifiers are accepted.

use crate::error::ConfigError;
use regex::Regex;
use std::sync::LazyLock;

/// PostgreSQL's unquoted-identifier limit is 63 bytes (NAMEDATALEN - 1).
const MAX_IDENTIFIER_LEN: usize = 63;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern"));

pub fn is_valid_identifier(name: &str) -> bool {
    name.len() <= MAX_IDENTIFIER_LEN && IDENTIFIER.is_match(name)
}

pub fn validate_identifier(name: &str) -> Result<(), ConfigError> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_mixed_case_names() {
        for name in ["Identity", "LoginLogs", "UserXYZ", "_private", "WhoReportedId"] {
            assert!(is_valid_identifier(name), "{name}");
        }
    }

    #[test]
    fn rejects_quotes_spaces_and_punctuation() {
        for name in ["", "1abc", "Iden tity", "a\"b", "Identity; DROP TABLE x", "a.b", "a-b"] {
            assert!(validate_identifier(name).is_err(), "{name}");
        }
    }

    #[test]
    fn rejects_overlong_names() {
        let name = "a".repeat(64);
        assert!(!is_valid_identifier(&name));
        assert!(is_valid_identifier(&name[..63]));
    }
}
