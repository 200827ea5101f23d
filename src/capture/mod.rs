//! Capture workflow: turning a user's selection into a tracked item

use chrono::{DateTime, Utc};
use url::Url;

use crate::dom::{Document, Element};
use crate::error::{TrackerError, TrackerResult};
use crate::locator::generate_selectors;
use crate::models::{ElementDescriptor, PriceSample, SelectorSet, TrackedItem};
use crate::price::{extract_price, normalize_text};

/// How the user pointed at the value to track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Text the user highlighted on the page.
    Text(String),
    /// A CSS selector for the element.
    Selector(String),
}

/// Everything read from the captured element.
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    pub selectors: SelectorSet,
    pub descriptor: ElementDescriptor,
    pub selected_text: String,
    pub full_text: String,
    pub price: f64,
}

/// The deepest element whose text contains `selected_text`.
///
/// Descends from the first containing element through the first child
/// that still contains the text, which is the common ancestor of a
/// selection that may span several inline elements.
pub fn find_selection_element<'d, D: Document>(
    document: &'d D,
    selected_text: &str,
) -> Option<D::Element<'d>> {
    let needle = normalize_text(selected_text);
    if needle.is_empty() {
        return None;
    }
    let contains = |el: &D::Element<'d>| normalize_text(&el.text_content()).contains(&needle);

    let mut current = document.all_elements().into_iter().find(|el| contains(el))?;
    while let Some(child) = current.element_children().into_iter().find(|el| contains(el)) {
        current = child;
    }

    Some(current)
}

/// Resolves `selection` to a single element of `document`.
pub fn select_element<'d, D: Document>(
    document: &'d D,
    selection: &Selection,
) -> TrackerResult<D::Element<'d>> {
    match selection {
        Selection::Text(text) => find_selection_element(document, text)
            .ok_or_else(|| TrackerError::SelectionNotFound(text.clone())),
        Selection::Selector(selector) => document
            .query_selector_all(selector)?
            .into_iter()
            .next()
            .ok_or_else(|| TrackerError::SelectionNotFound(selector.clone())),
    }
}

/// Reads selectors, text and price from `element`.
///
/// The price comes from the element's full text, falling back to the
/// selected text. Fails when neither holds a price.
pub fn capture_element<E: Element>(element: &E, selected_text: &str) -> TrackerResult<Capture> {
    let selectors = generate_selectors(element);
    let full_text = element.text_content().trim().to_string();

    let price = match extract_price(&full_text) {
        p if p > 0.0 => p,
        _ => extract_price(selected_text),
    };
    if price <= 0.0 {
        let shown = if selected_text.is_empty() { &full_text } else { selected_text };
        return Err(TrackerError::NoPriceFound(shown.to_string()));
    }

    Ok(Capture {
        descriptor: ElementDescriptor::new(selectors.clone(), full_text.clone(), price),
        selectors,
        selected_text: selected_text.to_string(),
        full_text,
        price,
    })
}

/// Builds the persisted item for a capture, with a one-sample history.
pub fn new_tracked_item(
    url: &str,
    title: &str,
    capture: Capture,
    now: DateTime<Utc>,
) -> TrackerResult<TrackedItem> {
    let domain = Url::parse(url)?.host_str().unwrap_or_default().to_string();
    let id = format!(
        "{:x}",
        md5::compute(format!(
            "{}:{}:{}",
            url,
            capture.selectors.primary,
            now.timestamp_millis()
        ))
    );

    Ok(TrackedItem {
        id,
        title: title.to_string(),
        url: url.to_string(),
        domain,
        selector: capture.selectors.primary,
        alternative_selectors: capture.selectors.alternatives,
        all_selectors: capture.selectors.all,
        selected_text: capture.selected_text,
        captured_text: capture.full_text.clone(),
        full_element_text: capture.full_text.clone(),
        initial_price: capture.price,
        current_price: capture.price,
        last_updated: now,
        price_history: vec![PriceSample {
            price: capture.price,
            date: now,
            full_text: capture.full_text,
        }],
    })
}
