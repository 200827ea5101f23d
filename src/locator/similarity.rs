//! Coarse scoring used by the content-similarity fallback

use crate::price::normalize_text;

/// Share of the longer string covered by characters of the shorter one.
///
/// Each character of the shorter (lowercased, whitespace-collapsed) string
/// counts when it appears anywhere in the longer string; the count is
/// divided by the longer string's length. This is an overlap measure, not
/// an edit distance.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let a = normalize_text(a).to_lowercase();
    let b = normalize_text(b).to_lowercase();
    if a == b {
        return 1.0;
    }

    let (shorter, longer) = if a.chars().count() < b.chars().count() {
        (&a, &b)
    } else {
        (&b, &a)
    };

    let matches = shorter.chars().filter(|c| longer.contains(*c)).count();
    matches as f64 / longer.chars().count() as f64
}

/// `1 - |candidate - previous| / max(candidate, previous)`, or 0 when
/// neither price is positive.
pub fn price_proximity(candidate: f64, previous: f64) -> f64 {
    let larger = candidate.max(previous);
    if larger <= 0.0 {
        return 0.0;
    }
    1.0 - (candidate - previous).abs() / larger
}
