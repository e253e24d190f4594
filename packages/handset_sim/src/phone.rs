//! Phone-number canonicalization.
//!
//! Every subsystem (registry, conversation, outbox) identifies a handset by
//! its canonical key, so user input has to collapse to one stable form
//! before it touches the wire. Normalization is total and deterministic:
//! every input produces exactly one key, with no error path.

use crate::types::DeviceKey;

/// Country calling code assumed for local-format numbers (Sudan).
pub const DEFAULT_COUNTRY_CODE: &str = "249";

/// Canonicalizes a user-entered phone string with the default country code.
pub fn normalize(raw: &str) -> DeviceKey {
    normalize_with(raw, DEFAULT_COUNTRY_CODE)
}

/// Canonicalizes a user-entered phone string.
///
/// Rules, in order:
/// 1. strip whitespace and hyphens;
/// 2. digits-only input already starting with the country code gets a `+`;
/// 3. digits-only input of at least 10 digits is taken as local format:
///    drop one leading zero, prepend `+` and the country code;
/// 4. anything else passes through stripped but otherwise unchanged.
///
/// Idempotent: a canonical key (leading `+`) is never all-digits, so it
/// falls through rule 4 on a second pass.
pub fn normalize_with(raw: &str, country_code: &str) -> DeviceKey {
    let stripped: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();

    let all_digits = !stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_digit());

    if all_digits && stripped.len() > country_code.len() && stripped.starts_with(country_code) {
        return DeviceKey::from(format!("+{stripped}"));
    }

    if all_digits && stripped.len() >= 10 {
        let local = stripped.strip_prefix('0').unwrap_or(&stripped);
        return DeviceKey::from(format!("+{country_code}{local}"));
    }

    DeviceKey::from(stripped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_format_with_leading_zero() {
        assert_eq!(normalize("0912345678").as_str(), "+249912345678");
    }

    #[test]
    fn test_country_code_without_plus() {
        assert_eq!(normalize("249912345678").as_str(), "+249912345678");
    }

    #[test]
    fn test_already_canonical_unchanged() {
        assert_eq!(normalize("+249912345678").as_str(), "+249912345678");
    }

    #[test]
    fn test_short_input_passes_through() {
        // Too short to be a local number; only stripping applies
        assert_eq!(normalize("12-34").as_str(), "1234");
    }

    #[test]
    fn test_strips_whitespace_and_hyphens() {
        assert_eq!(normalize("091 234-5678").as_str(), "+249912345678");
        assert_eq!(normalize(" +249 91 234 5678 ").as_str(), "+249912345678");
    }

    #[test]
    fn test_local_format_without_leading_zero() {
        assert_eq!(normalize("9123456789").as_str(), "+2499123456789");
    }

    #[test]
    fn test_idempotent() {
        for raw in [
            "0912345678",
            "249912345678",
            "+249912345678",
            "12-34",
            "",
            "not a number",
            "9123456789",
        ] {
            let once = normalize(raw);
            let twice = normalize(once.as_str());
            assert_eq!(once, twice, "normalize not idempotent for {raw:?}");
        }
    }

    #[test]
    fn test_custom_country_code() {
        assert_eq!(normalize_with("0712345678", "254").as_str(), "+254712345678");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize("").as_str(), "");
    }
}
