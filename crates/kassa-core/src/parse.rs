//! Notification text extraction. The relay channel carries free text the
//! system does not control; three grammars run in order of decreasing
//! precision and the first that yields both an amount and a card suffix
//! wins. A miss is not an error — most traffic in the channel is not a
//! payment at all.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

use kassa_types::models::ParsedNotification;

/// `PAYMENT|amount|trailing` — the format the rail's statement relay is
/// supposed to emit. The card suffix comes out of the trailing segment.
static CANONICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)PAYMENT\|\s*(\d+(?:[.,]\d+)?)\s*\|(.*)").unwrap());

/// Digit runs inside the canonical trailing segment; the card suffix is
/// the tail of the last run of at least four digits.
static DIGIT_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4,}").unwrap());

/// Human-formatted statements: an amount after a "sum" label and four
/// digits after a "card" label, anywhere, in any order.
static LABELED_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:summa|сумма|amount)[:\s]*([\d\s.,]+)").unwrap());
static LABELED_CARD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\b(?:karta|kartasi|карта|карты|card|cardno|cardnr)|№)[:\s-]*\D*(\d{4})\b")
        .unwrap()
});

/// Last-resort grammar: the first currency-like token plus the first
/// standalone four-digit run.
static GENERIC_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{1,3}(?:[ .,]\d{3})+(?:[.,]\d+)?\b|\b\d+(?:[.,]\d+)?\b").unwrap()
});
static GENERIC_CARD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{4})\b").unwrap());

/// Upstream relays substitute look-alike glyphs for the pipe; fold them
/// back before matching.
fn normalize(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{00A0}' => ' ',
            '\u{00A6}' | '\u{FF5C}' | '\u{2016}' => '|',
            other => other,
        })
        .collect()
}

pub fn parse_notification(text: &str) -> Option<ParsedNotification> {
    let cleaned = normalize(text);
    let cleaned = cleaned.trim();

    canonical(cleaned)
        .or_else(|| labeled(cleaned))
        .or_else(|| generic(cleaned))
        .map(|(amount, card_last4)| ParsedNotification {
            amount,
            card_last4,
            raw_message: text.to_string(),
        })
}

fn canonical(text: &str) -> Option<(Decimal, String)> {
    let caps = CANONICAL.captures(text)?;
    let amount = Decimal::from_str(&caps[1].replace(',', ".")).ok()?;
    let trailing = &caps[2];
    let run = DIGIT_RUN.find_iter(trailing).last()?;
    let digits = run.as_str();
    let card_last4 = digits[digits.len() - 4..].to_string();
    Some((amount, card_last4))
}

fn labeled(text: &str) -> Option<(Decimal, String)> {
    let amount_caps = LABELED_AMOUNT.captures(text)?;
    let card_caps = LABELED_CARD.captures(text)?;
    let amount = parse_grouped_amount(&amount_caps[1])?;
    Some((amount, card_caps[1].to_string()))
}

fn generic(text: &str) -> Option<(Decimal, String)> {
    let amount_token = GENERIC_AMOUNT.find(text)?;
    let card_caps = GENERIC_CARD.captures(text)?;
    let amount = parse_grouped_amount(amount_token.as_str())?;
    Some((amount, card_caps[1].to_string()))
}

/// "50 125", "50,125.75" and plain "50125" all reduce to the same
/// decimal: whitespace and commas are grouping, the dot is the decimal
/// separator.
fn parse_grouped_amount(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn parsed(text: &str) -> ParsedNotification {
        parse_notification(text).unwrap_or_else(|| panic!("should parse: {text}"))
    }

    #[test]
    fn canonical_form() {
        let p = parsed("PAYMENT|50125|8012");
        assert_eq!(p.amount, dec!(50125));
        assert_eq!(p.card_last4, "8012");
        assert_eq!(p.raw_message, "PAYMENT|50125|8012");
    }

    #[test]
    fn canonical_exactness_over_variants() {
        let amounts = [
            ("50125", dec!(50125)),
            ("1", dec!(1)),
            ("3613.50", dec!(3613.50)),
            ("3613,50", dec!(3613.50)),
            ("999999", dec!(999999)),
        ];
        let suffixes = ["8012", "0000", "1234", "0007"];
        for (raw, want) in amounts {
            for last4 in suffixes {
                let p = parsed(&format!("PAYMENT|{raw}|{last4}"));
                assert_eq!(p.amount, want, "amount of {raw}");
                assert_eq!(p.card_last4, last4);
            }
        }
    }

    #[test]
    fn canonical_with_unicode_pipes() {
        for text in [
            "PAYMENT¦50125¦8012",
            "PAYMENT｜50125｜8012",
            "PAYMENT‖50125‖8012",
            "To'lov keldi: PAYMENT|50125|8012",
        ] {
            let p = parsed(text);
            assert_eq!(p.amount, dec!(50125));
            assert_eq!(p.card_last4, "8012");
        }
    }

    #[test]
    fn canonical_takes_the_last_run_in_the_trailing_segment() {
        // Full card number: the suffix is its tail.
        let p = parsed("PAYMENT|50125|8600123412348012");
        assert_eq!(p.card_last4, "8012");

        // Masked statement with a reference number before the card.
        let p = parsed("PAYMENT|50125|ref 123456 card **** 8012");
        assert_eq!(p.card_last4, "8012");
    }

    #[test]
    fn labeled_form() {
        let p = parsed("Summa: 50 125 so'm, Karta: **** 8012");
        assert_eq!(p.amount, dec!(50125));
        assert_eq!(p.card_last4, "8012");
    }

    #[test]
    fn labeled_form_in_any_order() {
        let p = parsed("Карта: **** **** **** 8012\nСумма: 3,630 so'm");
        assert_eq!(p.amount, dec!(3630));
        assert_eq!(p.card_last4, "8012");
    }

    #[test]
    fn labeled_needs_both_fields() {
        assert!(parse_notification("Summa: 50 125 so'm, hech narsa").is_none());
    }

    #[test]
    fn generic_fallback() {
        let p = parsed("Received 50,125 to card ending 8012 today");
        assert_eq!(p.amount, dec!(50125));
        assert_eq!(p.card_last4, "8012");
    }

    #[test]
    fn non_payments_are_ignored() {
        for text in ["", "salom", "PAYMENT without digits", "paid a lot, thanks"] {
            assert!(parse_notification(text).is_none(), "should not parse: {text}");
        }
    }
}
