//! Shared utility functions used across the codebase.

use std::str::FromStr;

/// Current UTC time as an RFC 3339 string.
pub fn now_string() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Short random identifier (first 8 hex chars of a v4 UUID).
pub fn short_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// Parse an environment variable, returning `default` when it is unset or blank.
///
/// The error carries the raw value and the parser message.
pub fn env_var_parse<T>(name: &str, default: T) -> Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| format!("{:?}: {}", raw, e)),
        _ => Ok(default),
    }
}

/// First `max_chars` characters of `s`, never splitting a code point.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_id_is_eight_hex_chars() {
        let id = short_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(short_id(), short_id());
    }

    #[test]
    fn now_string_is_rfc3339() {
        let now = now_string();
        assert!(chrono::DateTime::parse_from_rfc3339(&now).is_ok());
    }

    #[test]
    fn truncate_chars_respects_multibyte() {
        assert_eq!(truncate_chars("héllo wörld", 7), "héllo w");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn env_var_parse_defaults_and_errors() {
        std::env::remove_var("AGENT_STUDIO_TEST_PARSE_UNSET");
        assert_eq!(env_var_parse("AGENT_STUDIO_TEST_PARSE_UNSET", 7u32), Ok(7));

        std::env::set_var("AGENT_STUDIO_TEST_PARSE_BAD", "seven");
        assert!(env_var_parse::<u32>("AGENT_STUDIO_TEST_PARSE_BAD", 7).is_err());

        std::env::set_var("AGENT_STUDIO_TEST_PARSE_OK", " 42 ");
        assert_eq!(env_var_parse("AGENT_STUDIO_TEST_PARSE_OK", 7u32), Ok(42));
    }
}
