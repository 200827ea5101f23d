//! # Resilient element re-identification
//!
//! Given a freshly fetched page and the [`ElementDescriptor`] recorded when
//! the user picked a price, find "the same" element again.
//!
//! ## Stages
//!
//! 1. **Selector cascade**: every recorded selector in priority order; the
//!    first matching element whose text yields a positive price wins. A
//!    selector the document cannot parse is skipped.
//! 2. **Price-semantic search**: generic "looks like a price container"
//!    selectors; the first element whose price is within the configured
//!    window of the previous price wins.
//! 3. **Content similarity**: every element with short enough text is
//!    scored on text overlap and price proximity; the best one is accepted
//!    above a threshold.
//!
//! All weights and thresholds live in [`MatchingConfig`].

mod selectors;
mod similarity;

pub use selectors::{PRICE_ATTRIBUTES, generate_descriptor, generate_selectors};
pub use similarity::{price_proximity, text_similarity};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dom::{Document, Element};
use crate::error::LocateError;
use crate::models::ElementDescriptor;
use crate::price::extract_price;

/// Generic selectors for elements that tend to hold a price.
pub const PRICE_CONTAINER_SELECTORS: [&str; 19] = [
    r#"[class*="price"]"#,
    r#"[class*="cost"]"#,
    r#"[class*="amount"]"#,
    r#"[class*="value"]"#,
    r#"[id*="price"]"#,
    r#"[id*="cost"]"#,
    "[data-price]",
    "[data-cost]",
    ".price",
    ".cost",
    ".amount",
    ".value",
    r#"span[class*="price"]"#,
    r#"div[class*="price"]"#,
    r#"p[class*="price"]"#,
    "strong",
    "b",
    ".money",
    ".currency",
];

/// Reported as the used selector when content similarity picked the element.
pub const CONTENT_SIMILARITY: &str = "content-similarity";

/// Heuristic constants for the fallback stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Weight of text overlap in the similarity score.
    pub text_weight: f64,
    /// Weight of price proximity in the similarity score.
    pub price_weight: f64,
    /// Similarity score an element must exceed to be accepted.
    pub min_score: f64,
    /// Maximum relative difference from the previous price accepted by the
    /// price-semantic search.
    pub price_window: f64,
    /// Elements with longer text are skipped by the similarity scan.
    pub max_text_len: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            text_weight: 0.3,
            price_weight: 0.7,
            min_score: 0.3,
            price_window: 0.5,
            max_text_len: 200,
        }
    }
}

/// Which stage produced a match.
#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    /// One of the descriptor's own selectors.
    Selector(String),
    /// A generic price-container selector.
    PriceSemantic(String),
    ContentSimilarity { score: f64 },
}

impl Strategy {
    pub fn used_selector(&self) -> &str {
        match self {
            Self::Selector(selector) | Self::PriceSemantic(selector) => selector,
            Self::ContentSimilarity { .. } => CONTENT_SIMILARITY,
        }
    }
}

/// An element found by the locator and how it was found.
#[derive(Debug, Clone)]
pub struct Located<E> {
    pub element: E,
    pub strategy: Strategy,
}

impl<E: Element> Located<E> {
    pub fn used_selector(&self) -> &str {
        self.strategy.used_selector()
    }

    /// Element text and the price read from it.
    pub fn read_price(&self) -> (String, f64) {
        let text = self.element.text_content();
        let price = extract_price(&text);
        (text.trim().to_string(), price)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Locator {
    config: MatchingConfig,
}

impl Locator {
    pub fn new(config: MatchingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Finds the element `descriptor` points at in `document`.
    ///
    /// `previous_price` is the last known good price; the fallback stages
    /// use it to judge candidates.
    pub fn locate<'d, D: Document>(
        &self,
        document: &'d D,
        descriptor: &ElementDescriptor,
        previous_price: f64,
    ) -> Result<Located<D::Element<'d>>, LocateError> {
        let selectors = descriptor.all_selectors();

        if let Some(found) = self.cascade(document, &selectors) {
            return Ok(found);
        }

        info!(
            "All {} selectors failed, falling back to content search",
            selectors.len()
        );

        self.find_by_content(document, previous_price, &descriptor.captured_text)
            .ok_or(LocateError::NotFound {
                tried: selectors.len(),
            })
    }

    /// First element, in selector then document order, holding a price.
    pub fn cascade<'d, D: Document>(
        &self,
        document: &'d D,
        selectors: &[String],
    ) -> Option<Located<D::Element<'d>>> {
        for selector in selectors {
            let elements = match document.query_selector_all(selector) {
                Ok(elements) => elements,
                Err(e) => {
                    debug!("Skipping selector: {}", e);
                    continue;
                }
            };

            debug!("Selector '{}' matched {} elements", selector, elements.len());

            for element in elements {
                let price = extract_price(&element.text_content());
                if price > 0.0 {
                    info!("Selector '{}' found price {}", selector, price);
                    return Some(Located {
                        element,
                        strategy: Strategy::Selector(selector.clone()),
                    });
                }
            }
        }

        None
    }

    /// Price-semantic search, then whole-tree similarity search.
    pub fn find_by_content<'d, D: Document>(
        &self,
        document: &'d D,
        previous_price: f64,
        captured_text: &str,
    ) -> Option<Located<D::Element<'d>>> {
        self.price_semantic_search(document, previous_price)
            .or_else(|| self.similarity_search(document, previous_price, captured_text))
    }

    fn price_semantic_search<'d, D: Document>(
        &self,
        document: &'d D,
        previous_price: f64,
    ) -> Option<Located<D::Element<'d>>> {
        if previous_price <= 0.0 {
            return None;
        }

        for selector in PRICE_CONTAINER_SELECTORS {
            let Ok(elements) = document.query_selector_all(selector) else {
                continue;
            };

            for element in elements {
                let price = extract_price(&element.text_content());
                if price > 0.0
                    && (price - previous_price).abs() / previous_price < self.config.price_window
                {
                    info!("Price container '{}' matched price {}", selector, price);
                    return Some(Located {
                        element,
                        strategy: Strategy::PriceSemantic(selector.to_string()),
                    });
                }
            }
        }

        None
    }

    fn similarity_search<'d, D: Document>(
        &self,
        document: &'d D,
        previous_price: f64,
        captured_text: &str,
    ) -> Option<Located<D::Element<'d>>> {
        let mut best: Option<(D::Element<'d>, f64)> = None;

        for element in document.all_elements() {
            let text = element.text_content();
            if text.chars().count() > self.config.max_text_len {
                continue;
            }

            let price = extract_price(&text);
            if price <= 0.0 {
                continue;
            }

            let score = self.config.text_weight * text_similarity(&text, captured_text)
                + self.config.price_weight * price_proximity(price, previous_price);

            let best_score = best.as_ref().map_or(0.0, |(_, s)| *s);
            if score > best_score && score > self.config.min_score {
                best = Some((element, score));
            }
        }

        best.map(|(element, score)| {
            info!("Content similarity matched with score {:.3}", score);
            Located {
                element,
                strategy: Strategy::ContentSimilarity { score },
            }
        })
    }
}

/// [`Locator::locate`] with the default heuristics.
pub fn locate<'d, D: Document>(
    document: &'d D,
    descriptor: &ElementDescriptor,
    previous_price: f64,
) -> Result<Located<D::Element<'d>>, LocateError> {
    Locator::default().locate(document, descriptor, previous_price)
}
