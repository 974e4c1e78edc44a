//! Recipient list parsing
//!
//! Recipients are configured as a single string such as
//! `"ops@example.com, On Call <oncall@example.com>; dba@example.com"`.
//! Entries may be separated by commas or semicolons; display names are
//! dropped and only the bare addresses are kept.

use crate::error::{EmailSinkError, Result};

/// Split a delimited recipient string into bare addresses
///
/// Separators inside double quotes or angle brackets are not treated as
/// delimiters, so `"Doe, Jane" <jane@example.com>` stays one entry. Blank
/// entries are removed.
pub fn split_addresses(input: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut in_angle = false;

    for c in input.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            '<' if !in_quotes => {
                in_angle = true;
                current.push(c);
            }
            '>' if !in_quotes => {
                in_angle = false;
                current.push(c);
            }
            ',' | ';' if !in_quotes && !in_angle => {
                entries.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    entries.push(current);

    entries
        .iter()
        .map(|entry| bare_address(entry))
        .filter(|address| !address.is_empty())
        .map(str::to_string)
        .collect()
}

/// Extract the address part of `Display Name <address>`, or the trimmed
/// input when there is no angle-bracket form
pub fn bare_address(entry: &str) -> &str {
    let entry = entry.trim();
    match (entry.rfind('<'), entry.rfind('>')) {
        (Some(start), Some(end)) if start < end => entry[start + 1..end].trim(),
        _ => entry,
    }
}

/// Minimal structural check of a bare address: one `@` with a non-empty
/// local part and domain and no whitespace
///
/// Full RFC 5322 parsing is left to the mail library at send time.
pub fn validate_address(address: &str) -> Result<()> {
    let valid = match address.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !address.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(EmailSinkError::invalid_argument(format!(
            "'{}' is not a valid email address",
            address
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_mixed_delimiters_and_display_names() {
        assert_eq!(
            split_addresses("to@a, Name <to@b>; to@c"),
            vec!["to@a", "to@b", "to@c"]
        );
    }

    #[test]
    fn test_split_drops_empty_entries() {
        assert_eq!(
            split_addresses(";; a@example.com ,, ; b@example.com;"),
            vec!["a@example.com", "b@example.com"]
        );
        assert!(split_addresses("").is_empty());
        assert!(split_addresses(" ; , ").is_empty());
    }

    #[test]
    fn test_split_respects_quoted_display_names() {
        assert_eq!(
            split_addresses("\"Doe, Jane\" <jane@example.com>; ops@example.com"),
            vec!["jane@example.com", "ops@example.com"]
        );
    }

    #[test]
    fn test_bare_address() {
        assert_eq!(bare_address("  plain@example.com "), "plain@example.com");
        assert_eq!(bare_address("Ops Team < ops@example.com >"), "ops@example.com");
        assert_eq!(bare_address("broken > order <"), "broken > order <");
    }

    #[test]
    fn test_validate_address() {
        assert!(validate_address("ops@example.com").is_ok());
        assert!(validate_address("to@localhost").is_ok());
        assert!(validate_address("no-at-sign").is_err());
        assert!(validate_address("@example.com").is_err());
        assert!(validate_address("ops@").is_err());
        assert!(validate_address("a b@example.com").is_err());
        assert!(validate_address("a@b@c").is_err());
    }
}
