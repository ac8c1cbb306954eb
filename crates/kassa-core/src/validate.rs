//! Input validation for the collection and withdrawal flows.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

static PLAYER_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").unwrap());

/// Player ids are 3–20 characters of letters, digits and `._-`.
pub fn valid_player_id(player_id: &str) -> bool {
    let trimmed = player_id.trim();
    (3..=20).contains(&trimmed.len()) && PLAYER_ID.is_match(trimmed)
}

/// Parse a user-entered amount. Spaces, commas and dots are treated as
/// grouping noise (amounts are whole so'm); the result must fall inside
/// the configured range.
pub fn parse_amount(text: &str, min: Decimal, max: Decimal) -> Option<Decimal> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | ',' | '.'))
        .collect();
    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let amount = Decimal::from_str(&cleaned).ok()?;
    (min..=max).contains(&amount).then_some(amount)
}

/// 16 digits after stripping spaces and dashes.
pub fn valid_card_number(card_number: &str) -> bool {
    let cleaned: String = card_number
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-'))
        .collect();
    cleaned.len() == 16 && cleaned.chars().all(|c| c.is_ascii_digit())
}

/// Providers hand out codes in assorted formats; require only that one
/// is present and of sane length.
pub fn valid_code(code: &str) -> bool {
    (1..=64).contains(&code.trim().len())
}

pub fn valid_phone(phone: &str) -> bool {
    let cleaned: String = phone
        .trim()
        .chars()
        .filter(|c| !matches!(c, '+' | ' ' | '-' | '(' | ')'))
        .collect();
    (9..=15).contains(&cleaned.len()) && cleaned.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn player_ids() {
        assert!(valid_player_id("123456789"));
        assert!(valid_player_id("ab_c.d-1"));
        assert!(valid_player_id("  123456  "));
        assert!(!valid_player_id("ab"));
        assert!(!valid_player_id("x".repeat(21).as_str()));
        assert!(!valid_player_id("has space"));
        assert!(!valid_player_id("semi;colon"));
    }

    #[test]
    fn amounts() {
        let (min, max) = (dec!(1000), dec!(50000000));
        assert_eq!(parse_amount("50000", min, max), Some(dec!(50000)));
        assert_eq!(parse_amount("50 000", min, max), Some(dec!(50000)));
        assert_eq!(parse_amount("50.000", min, max), Some(dec!(50000)));
        assert_eq!(parse_amount("50,000", min, max), Some(dec!(50000)));
        assert_eq!(parse_amount("999", min, max), None);
        assert_eq!(parse_amount("60000001", min, dec!(60000000)), None);
        assert_eq!(parse_amount("-50", min, max), None);
        assert_eq!(parse_amount("fifty", min, max), None);
        assert_eq!(parse_amount("", min, max), None);
    }

    #[test]
    fn cards_codes_phones() {
        assert!(valid_card_number("8600123412348012"));
        assert!(valid_card_number("8600 1234 1234 8012"));
        assert!(!valid_card_number("8600123412348"));
        assert!(!valid_card_number("8600-x234-1234-8012"));

        assert!(valid_code("4821"));
        assert!(!valid_code("   "));

        assert!(valid_phone("+998 90 123-45-67"));
        assert!(!valid_phone("12345"));
    }
}
