//! Data models for tracked prices, element descriptors and Discord webhook payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Version tag written into export bundles.
pub const EXPORT_VERSION: &str = "1.0";

/// Ordered selector strategies generated once for a captured element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorSet {
    pub primary: String,
    pub alternatives: Vec<String>,
    /// `primary` followed by `alternatives`, deduplicated, never empty strings.
    pub all: Vec<String>,
}

/// How to find a tracked value again, plus what it looked like at capture.
///
/// Built once at capture time and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementDescriptor {
    pub primary_selector: String,
    pub alternative_selectors: Vec<String>,
    pub captured_text: String,
    pub captured_price: f64,
}

impl ElementDescriptor {
    pub fn new(selectors: SelectorSet, captured_text: impl Into<String>, captured_price: f64) -> Self {
        Self {
            primary_selector: selectors.primary,
            alternative_selectors: selectors.alternatives,
            captured_text: captured_text.into(),
            captured_price,
        }
    }

    /// Primary first, then alternatives, without duplicates or blanks.
    pub fn all_selectors(&self) -> Vec<String> {
        dedup_selectors(
            std::iter::once(self.primary_selector.as_str())
                .chain(self.alternative_selectors.iter().map(String::as_str)),
        )
    }
}

/// Keeps the first occurrence of each non-blank selector, in order.
pub fn dedup_selectors<'a>(selectors: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for selector in selectors {
        let selector = selector.trim();
        if selector.is_empty() || out.iter().any(|s| s == selector) {
            continue;
        }
        out.push(selector.to_string());
    }
    out
}

/// One observation of a tracked price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSample {
    pub price: f64,
    pub date: DateTime<Utc>,
    pub full_text: String,
}

/// A price the user asked to follow, as persisted and exported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedItem {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub domain: String,
    /// Primary selector.
    pub selector: String,
    #[serde(default)]
    pub alternative_selectors: Vec<String>,
    #[serde(default)]
    pub all_selectors: Vec<String>,
    #[serde(default)]
    pub selected_text: String,
    /// Element text at capture time, used for similarity search.
    #[serde(default)]
    pub captured_text: String,
    /// Element text from the latest successful refresh.
    #[serde(default)]
    pub full_element_text: String,
    pub initial_price: f64,
    #[serde(default)]
    pub current_price: f64,
    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub price_history: Vec<PriceSample>,
}

impl TrackedItem {
    /// The immutable descriptor this item was captured with.
    pub fn descriptor(&self) -> ElementDescriptor {
        let captured_text = if self.captured_text.is_empty() {
            &self.full_element_text
        } else {
            &self.captured_text
        };

        ElementDescriptor {
            primary_selector: self.selector.clone(),
            alternative_selectors: dedup_selectors(
                self.alternative_selectors
                    .iter()
                    .chain(self.all_selectors.iter())
                    .map(String::as_str),
            ),
            captured_text: captured_text.clone(),
            captured_price: self.initial_price,
        }
    }

    /// Last known good price, falling back to the captured one.
    pub fn reference_price(&self) -> f64 {
        if self.current_price > 0.0 {
            self.current_price
        } else {
            self.initial_price
        }
    }

    /// Relative change from the initial price, in percent.
    pub fn change_percent(&self) -> f64 {
        if self.initial_price <= 0.0 {
            return 0.0;
        }
        (self.current_price - self.initial_price) / self.initial_price * 100.0
    }
}

/// Result of re-reading one tracked item.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceUpdate {
    pub price: f64,
    pub text: String,
    pub used_selector: String,
}

/// Counts from a bulk refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub success_count: usize,
    pub error_count: usize,
}

impl RefreshSummary {
    pub fn attempted(&self) -> usize {
        self.success_count + self.error_count
    }
}

/// JSON file layout for export and import.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    #[serde(default)]
    pub version: String,
    #[serde(default = "Utc::now")]
    pub export_date: DateTime<Utc>,
    pub tracking_items: Vec<TrackedItem>,
}

/// Discord embed structure for rich notifications
#[derive(Debug, Serialize)]
pub struct DiscordEmbed {
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub color: u32,
    pub timestamp: String,
    pub fields: Vec<DiscordField>,
}

/// Key-value field for Discord embeds
#[derive(Debug, Serialize)]
pub struct DiscordField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Discord webhook message payload
#[derive(Debug, Serialize)]
pub struct DiscordMessage {
    pub embeds: Vec<DiscordEmbed>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_selectors_dedup() {
        let descriptor = ElementDescriptor {
            primary_selector: "#price".to_string(),
            alternative_selectors: vec![
                "span.price".to_string(),
                "#price".to_string(),
                "".to_string(),
                "span".to_string(),
            ],
            captured_text: "$10.00".to_string(),
            captured_price: 10.0,
        };

        assert_eq!(descriptor.all_selectors(), vec!["#price", "span.price", "span"]);
    }

    #[test]
    fn test_tracked_item_json_shape() {
        let json = r##"{
            "id": "1700000000000",
            "title": "Deck Jacket",
            "url": "https://shop.example/item",
            "domain": "shop.example",
            "selector": "#price",
            "alternativeSelectors": ["span.price"],
            "allSelectors": ["#price", "span.price", "span"],
            "selectedText": "$450",
            "fullElementText": "$450.00",
            "initialPrice": 450,
            "currentPrice": 430.5,
            "lastUpdated": "2024-05-01T10:00:00Z",
            "priceHistory": [{"price": 450, "date": "2024-05-01T10:00:00Z", "fullText": "$450.00"}]
        }"##;

        let item: TrackedItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.initial_price, 450.0);
        assert_eq!(item.price_history.len(), 1);
        assert_eq!(item.reference_price(), 430.5);

        let descriptor = item.descriptor();
        assert_eq!(descriptor.all_selectors(), vec!["#price", "span.price", "span"]);
        // Older exports carry no captured text; the element text stands in.
        assert_eq!(descriptor.captured_text, "$450.00");

        let back = serde_json::to_value(&item).unwrap();
        assert_eq!(back["alternativeSelectors"][0], "span.price");
        assert_eq!(back["priceHistory"][0]["fullText"], "$450.00");
    }

    #[test]
    fn test_change_percent() {
        let mut item: TrackedItem = serde_json::from_str(
            r#"{"id": "a", "url": "https://x.example", "selector": "b", "initialPrice": 200}"#,
        )
        .unwrap();
        item.current_price = 150.0;
        assert_eq!(item.change_percent(), -25.0);
    }
}
