use regex::Regex;
use std::sync::LazyLock;

use crate::constants::URGENCY_TOKENS;

static URGENCY: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = URGENCY_TOKENS
        .iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?i){alternation}")).unwrap()
});

/// Local urgency gate: true if any urgency token occurs anywhere in `text`,
/// ignoring case. Total and side-effect free; runs before (and independently
/// of) any remote classification.
pub fn is_urgent(text: &str) -> bool {
    URGENCY.is_match(text)
}

/// The urgency tokens found in `text`, in token-table order.
pub fn urgency_hits(text: &str) -> Vec<&'static str> {
    let lower = text.to_lowercase();
    URGENCY_TOKENS
        .iter()
        .copied()
        .filter(|t| lower.contains(t))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shouting_is_urgent() {
        assert!(is_urgent("HELP!!"));
    }

    #[test]
    fn test_quiet_is_not_urgent() {
        assert!(!is_urgent("all quiet"));
    }

    #[test]
    fn test_empty_is_not_urgent() {
        assert!(!is_urgent(""));
    }

    #[test]
    fn test_substring_anywhere() {
        // No word boundaries: "helpful" and "firewood" still trip the gate.
        assert!(is_urgent("that was helpful"));
        assert!(is_urgent("collect firewood"));
        assert!(is_urgent("we are TrApPeD"));
    }

    #[test]
    fn test_every_token() {
        for token in URGENCY_TOKENS {
            assert!(is_urgent(token), "{token} should be urgent");
            assert!(is_urgent(&token.to_uppercase()));
        }
    }

    #[test]
    fn test_non_ascii_text() {
        assert!(is_urgent("🚨 trapped in basement, need help"));
        assert!(!is_urgent("🌊 water is calm"));
    }

    #[test]
    fn test_hits_in_table_order() {
        assert_eq!(urgency_hits("Fire! send rescue, please help"), vec![
            "help", "fire", "rescue"
        ]);
        assert!(urgency_hits("all quiet").is_empty());
    }
}
