//! Capture-time selector generation

use once_cell::sync::Lazy;
use regex::Regex;

use crate::dom::Element;
use crate::models::{ElementDescriptor, SelectorSet, dedup_selectors};
use crate::price::{extract_price, normalize_text};

/// Attributes that usually carry a price on product pages.
pub const PRICE_ATTRIBUTES: [&str; 5] = [
    "data-price",
    "data-value",
    "data-cost",
    "data-amount",
    "itemprop",
];

const MAX_ELEMENT_CLASSES: usize = 3;
const MAX_PARENT_CLASSES: usize = 2;

/// Presentation-state classes that come and go with user interaction.
static TRANSIENT_CLASS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(active|selected|hover|focus|loading|animate|transition)")
        .expect("transient class pattern")
});

static TRANSIENT_PARENT_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(active|selected|hover|focus)").expect("transient parent class pattern"));

fn stable_classes<'a>(classes: Vec<&'a str>, transient: &Regex, limit: usize) -> Vec<&'a str> {
    classes
        .into_iter()
        .filter(|class| !class.trim().is_empty() && !transient.is_match(class))
        .take(limit)
        .collect()
}

fn quote_attr_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn parent_selector<E: Element>(parent: &E) -> String {
    let mut selector = parent.tag_name();

    if let Some(id) = parent.id() {
        selector.push('#');
        selector.push_str(id);
    } else {
        let classes = stable_classes(parent.class_names(), &TRANSIENT_PARENT_CLASS, MAX_PARENT_CLASSES);
        if !classes.is_empty() {
            selector.push('.');
            selector.push_str(&classes.join("."));
        }
    }

    selector
}

/// Builds the ordered selector strategies for `element`, most specific first.
///
/// 1. `#id`
/// 2. `tag.class1.class2.class3` (transient state classes skipped)
/// 3. `tag`
/// 4. `[attr="value"]` for each price attribute present
/// 5. `parent > tag` and `parent tag`
/// 6. `parent-tag > :nth-child(n)`
pub fn generate_selectors<E: Element>(element: &E) -> SelectorSet {
    let tag = element.tag_name();
    let mut selectors: Vec<String> = Vec::new();

    if let Some(id) = element.id() {
        selectors.push(format!("#{id}"));
    }

    let classes = stable_classes(element.class_names(), &TRANSIENT_CLASS, MAX_ELEMENT_CLASSES);
    if !classes.is_empty() {
        selectors.push(format!("{tag}.{}", classes.join(".")));
    }

    selectors.push(tag.clone());

    for attr in PRICE_ATTRIBUTES {
        if let Some(value) = element.attr(attr) {
            selectors.push(format!("[{attr}=\"{}\"]", quote_attr_value(value)));
        }
    }

    if let Some(parent) = element.parent_element() {
        let parent_sel = parent_selector(&parent);
        selectors.push(format!("{parent_sel} > {tag}"));
        selectors.push(format!("{parent_sel} {tag}"));

        if let Some(index) = element.element_index() {
            selectors.push(format!("{} > :nth-child({})", parent.tag_name(), index + 1));
        }
    }

    let all = dedup_selectors(selectors.iter().map(String::as_str));
    let primary = all.first().cloned().unwrap_or(tag);
    let alternatives = all.iter().skip(1).cloned().collect();

    SelectorSet {
        primary,
        alternatives,
        all,
    }
}

/// Selectors plus the element's text and price as seen right now.
pub fn generate_descriptor<E: Element>(element: &E) -> ElementDescriptor {
    let text = normalize_text(&element.text_content());
    let price = extract_price(&text);
    ElementDescriptor::new(generate_selectors(element), text, price)
}
