//! Price extraction from free-form text
//!
//! Turns a block of human-readable text (a product card, a price tag, a
//! sentence mentioning a price) into a single best-guess numeric price.
//! Several pattern families run independently over the same normalized
//! text; every match becomes a [`PriceCandidate`], and when more than one
//! distinct value survives, the candidates are scored and the best wins.
//!
//! `0.0` means "no price identified". The result is never negative.

use once_cell::sync::Lazy;
use regex::Regex;

/// Parsed values must fall strictly inside `(0, MAX_PRICE)`.
pub const MAX_PRICE: f64 = 10_000_000.0;

/// Symbol- or unit-prefixed/suffixed numbers first, then the bare number
/// families. The order decides which match of a duplicated value keeps
/// its metadata.
static PATTERNS: Lazy<[Regex; 5]> = Lazy::new(|| {
    [
        // $1,234.56  NT$1,234  ￥1234  USD 99
        Regex::new(
            r"(?i)(?:NT\$?|USD?\$?|\$|￥|¥|€|£|₩|₪|₹|R\$?|₽|₦|₨|₱|₫|₡|₲|₴|₵|₸|₼|₾|₿|＄)\s*([0-9,]+(?:\.[0-9]{1,2})?)",
        )
        .expect("currency prefix pattern"),
        // 1,234元  1234円  5000원
        Regex::new(r"([0-9,]+(?:\.[0-9]{1,2})?)\s*(?:元|円|圓|块|塊|원|₩)")
            .expect("currency unit pattern"),
        // 1,234  1,234,567.89
        Regex::new(r"(?-u:\b)([0-9]{1,3}(?:,[0-9]{3})+(?:\.[0-9]{1,2})?)(?-u:\b)")
            .expect("grouped number pattern"),
        // 1234.5  1234.56
        Regex::new(r"(?-u:\b)([0-9]+\.[0-9]{1,2})(?-u:\b)").expect("decimal pattern"),
        // 999  123456
        Regex::new(r"(?-u:\b)([0-9]{3,})(?-u:\b)").expect("integer pattern"),
    ]
});

static CURRENCY_MARK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[$￥¥€£₩₪₹R₽₦₨₱₫₡₲₴₵₸₼₾₿＄元円圓块塊원]").expect("currency mark pattern")
});

/// A number found in the text, with enough context to score it.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceCandidate {
    pub value: f64,
    pub raw_match: String,
    /// Character offset of the match in the normalized text.
    pub position: usize,
    pub has_currency_symbol: bool,
}

impl PriceCandidate {
    fn score(&self, text_len: usize) -> i32 {
        let mut score = 0;

        if self.has_currency_symbol {
            score += 10;
        }
        if (10.0..=100_000.0).contains(&self.value) {
            score += 5;
        }
        if self.value.fract() != 0.0 {
            score += 3;
        }
        if (self.position as f64) < text_len as f64 / 2.0 {
            score += 1;
        }
        if self.value < 1.0 {
            score -= 10;
        }
        if self.value > 1_000_000.0 {
            score -= 5;
        }
        // Probably a calendar year.
        if (1900.0..=2100.0).contains(&self.value) {
            score -= 3;
        }

        score
    }
}

/// Collapses every whitespace run to a single space and trims the ends.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Every in-range number the pattern families find, deduplicated by value.
///
/// The first candidate seen for a value keeps its position and symbol
/// flag. Candidates are returned in encounter order (pattern family, then
/// position in text).
pub fn find_candidates(text: &str) -> Vec<PriceCandidate> {
    let clean = normalize_text(text);
    let mut candidates: Vec<PriceCandidate> = Vec::new();

    for pattern in PATTERNS.iter() {
        for caps in pattern.captures_iter(&clean) {
            let (Some(whole), Some(number)) = (caps.get(0), caps.get(1)) else {
                continue;
            };

            let Ok(value) = number.as_str().replace(',', "").parse::<f64>() else {
                continue;
            };
            if !(value > 0.0 && value < MAX_PRICE) {
                continue;
            }
            if candidates.iter().any(|c| c.value == value) {
                continue;
            }

            candidates.push(PriceCandidate {
                value,
                raw_match: whole.as_str().to_string(),
                position: clean[..whole.start()].chars().count(),
                has_currency_symbol: CURRENCY_MARK.is_match(whole.as_str()),
            });
        }
    }

    candidates
}

/// Best-guess price in `text`, or `0.0` when nothing price-like is found.
///
/// Pure and deterministic: the same input always yields the same value.
pub fn extract_price(text: &str) -> f64 {
    let clean = normalize_text(text);
    let mut candidates = find_candidates(&clean);

    match candidates.len() {
        0 => 0.0,
        1 => candidates[0].value,
        _ => {
            let text_len = clean.chars().count();
            // Stable sort keeps encounter order among equal scores.
            candidates.sort_by_key(|c| std::cmp::Reverse(c.score(text_len)));
            candidates[0].value
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  NT$ \n 1,234\t元  "), "NT$ 1,234 元");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn test_grouped_decimal_with_symbol() {
        assert_eq!(extract_price("$1,234.56"), 1234.56);
    }

    #[test]
    fn test_taiwan_dollar_prefix() {
        assert_eq!(extract_price("NT$999"), 999.0);
    }

    #[test]
    fn test_year_loses_to_currency_unit() {
        assert_eq!(extract_price("Released in 1999, price 1,234 元"), 1234.0);
    }

    #[test]
    fn test_no_price() {
        assert_eq!(extract_price(""), 0.0);
        assert_eq!(extract_price("no numbers here"), 0.0);
        assert_eq!(extract_price("   \n\t "), 0.0);
    }

    #[test]
    fn test_single_bare_number() {
        assert_eq!(extract_price("Only 4599 left"), 4599.0);
        assert_eq!(extract_price("costs 12.5 today"), 12.5);
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        assert_eq!(extract_price("SKU 0000"), 0.0);
        assert_eq!(extract_price("12345678"), 0.0);
    }

    #[test]
    fn test_same_value_collapses_into_one_candidate() {
        let candidates = find_candidates("$1,234 or 1,234 in cash");
        let values: Vec<f64> = candidates.iter().map(|c| c.value).collect();
        assert_eq!(values.iter().filter(|v| **v == 1234.0).count(), 1);

        let first = &candidates[0];
        assert_eq!(first.value, 1234.0);
        assert_eq!(first.raw_match, "$1,234");
        assert_eq!(first.position, 0);
        assert!(first.has_currency_symbol);
    }

    #[test]
    fn test_candidate_positions_are_char_offsets() {
        let candidates = find_candidates("售價 NT$ 2,990");
        assert_eq!(candidates[0].position, 3);
        assert_eq!(candidates[0].value, 2990.0);
    }

    #[test]
    fn test_cents_beat_integer_id() {
        // 123456 and 19.99 are both plain; the fractional one wins.
        assert_eq!(extract_price("Item 123456 now 19.99"), 19.99);
    }

    #[test]
    fn test_unit_suffix_scripts() {
        assert_eq!(extract_price("特價 3,280円（税込）"), 3280.0);
        assert_eq!(extract_price("판매가 15,000원"), 15000.0);
    }

    #[test]
    fn test_idempotent_on_normalized_text() {
        let raw = "  Was $59.99\n  Now   $44.50   (save 25%) ";
        let first = extract_price(raw);
        assert_eq!(first, extract_price(&normalize_text(raw)));
        assert_eq!(first, extract_price(raw));
    }
}
