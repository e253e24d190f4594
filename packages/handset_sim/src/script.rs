//! Script classification for rendering direction.

/// Fraction of Arabic-range characters above which a text renders
/// right-to-left.
const RTL_THRESHOLD: f64 = 0.2;

/// Returns true when more than 20% of the text's characters fall in the
/// Arabic Unicode block (U+0600..=U+06FF).
///
/// Purely a rendering hint; message semantics never depend on it.
pub fn is_rtl(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }

    let total = text.chars().count();
    let arabic = text
        .chars()
        .filter(|c| matches!(c, '\u{0600}'..='\u{06FF}'))
        .count();

    (arabic as f64) > (total as f64) * RTL_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arabic_text_is_rtl() {
        assert!(is_rtl("مساعدة"));
    }

    #[test]
    fn test_latin_text_is_not_rtl() {
        assert!(!is_rtl("HELP"));
        assert!(!is_rtl("REG MOTHER CAMP A ZONE 3"));
    }

    #[test]
    fn test_empty_text_is_not_rtl() {
        assert!(!is_rtl(""));
    }

    #[test]
    fn test_mixed_text_over_threshold() {
        // 2 Arabic chars out of 7 total = 29%
        assert!(is_rtl("abcd مس"));
    }

    #[test]
    fn test_mixed_text_under_threshold() {
        // 1 Arabic char out of 11 total = 9%
        assert!(!is_rtl("abcdefghi م"));
    }
}
