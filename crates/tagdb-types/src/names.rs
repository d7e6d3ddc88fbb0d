//! Identifier rules shared by tag names, compound type names, and member names.
//!
//! A valid name:
//! - is between 1 and [`MAX_NAME_LEN`] bytes long
//! - starts with an ASCII letter or `_`
//! - continues with ASCII letters, digits, or `_`

use crate::error::{TypeError, TypeResult};

/// Longest accepted identifier, in bytes.
pub const MAX_NAME_LEN: usize = 32;

/// Validate an identifier, returning `Ok(())` if it may be used as a tag,
/// type, or member name.
///
/// # Examples
///
/// ```
/// use tagdb_types::names::validate_name;
///
/// assert!(validate_name("Motor_1").is_ok());
/// assert!(validate_name("_status").is_ok());
/// assert!(validate_name("1st").is_err());
/// assert!(validate_name("has space").is_err());
/// ```
pub fn validate_name(name: &str) -> TypeResult<()> {
    let invalid = |reason: String| TypeError::InvalidName {
        name: name.to_string(),
        reason,
    };

    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(invalid("name must not be empty".into()));
    };
    if name.len() > MAX_NAME_LEN {
        return Err(invalid(format!(
            "longer than {MAX_NAME_LEN} characters"
        )));
    }
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(invalid(format!(
            "must start with a letter or '_', found {first:?}"
        )));
    }
    if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
        return Err(invalid(format!("contains forbidden character {bad:?}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_identifiers() {
        assert!(validate_name("a").is_ok());
        assert!(validate_name("_").is_ok());
        assert!(validate_name("Pump_Speed").is_ok());
        assert!(validate_name("tag42").is_ok());
        assert!(validate_name(&"x".repeat(MAX_NAME_LEN)).is_ok());
    }

    #[test]
    fn rejects_empty() {
        assert!(validate_name("").is_err());
    }

    #[test]
    fn rejects_leading_digit() {
        let err = validate_name("9lives").unwrap_err();
        assert!(matches!(err, TypeError::InvalidName { .. }));
    }

    #[test]
    fn rejects_punctuation() {
        assert!(validate_name("a.b").is_err());
        assert!(validate_name("a-b").is_err());
        assert!(validate_name("a[1]").is_err());
        assert!(validate_name("tag name").is_err());
    }

    #[test]
    fn rejects_non_ascii() {
        assert!(validate_name("température").is_err());
    }

    #[test]
    fn rejects_too_long() {
        assert!(validate_name(&"x".repeat(MAX_NAME_LEN + 1)).is_err());
    }
}
