//! Minimal DOM capabilities the locator needs
//!
//! Selector generation and re-identification only ever ask a tree for
//! "all elements matching this selector", "every element", and a handful
//! of per-element facts (tag, id, classes, attributes, parent, text).
//! [`Document`] and [`Element`] capture exactly that, so the locator runs
//! against any tree-like structure. The `scraper` implementation below is
//! the one used for fetched pages and test fixtures.

use scraper::{ElementRef, Html, Selector};

use crate::error::LocateError;

/// A node that can describe itself for selector generation and matching.
pub trait Element: Sized + Clone {
    /// Lowercase tag name.
    fn tag_name(&self) -> String;

    /// The `id` attribute, `None` when absent or empty.
    fn id(&self) -> Option<&str>;

    /// Class tokens in attribute order.
    fn class_names(&self) -> Vec<&str>;

    fn attr(&self, name: &str) -> Option<&str>;

    fn parent_element(&self) -> Option<Self>;

    fn element_children(&self) -> Vec<Self>;

    /// 0-based position among the parent's element children.
    fn element_index(&self) -> Option<usize>;

    /// Concatenated text of every descendant text node.
    fn text_content(&self) -> String;
}

/// A queryable tree of [`Element`]s.
pub trait Document {
    type Element<'a>: Element
    where
        Self: 'a;

    /// All elements matching `selector` in document order.
    ///
    /// Returns [`LocateError::InvalidSelector`] when the selector cannot be
    /// parsed; callers treat that as "this strategy failed".
    fn query_selector_all(&self, selector: &str) -> Result<Vec<Self::Element<'_>>, LocateError>;

    /// Every element in document order.
    fn all_elements(&self) -> Vec<Self::Element<'_>>;
}

impl Document for Html {
    type Element<'a> = ElementRef<'a>;

    fn query_selector_all(&self, selector: &str) -> Result<Vec<ElementRef<'_>>, LocateError> {
        let parsed = Selector::parse(selector).map_err(|e| LocateError::InvalidSelector {
            selector: selector.to_string(),
            reason: format!("{e:?}"),
        })?;

        Ok(self.select(&parsed).collect())
    }

    fn all_elements(&self) -> Vec<ElementRef<'_>> {
        self.root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .collect()
    }
}

impl Element for ElementRef<'_> {
    fn tag_name(&self) -> String {
        self.value().name().to_lowercase()
    }

    fn id(&self) -> Option<&str> {
        self.value().id().filter(|id| !id.trim().is_empty())
    }

    fn class_names(&self) -> Vec<&str> {
        // Read the raw attribute so the author's class order is preserved.
        self.value()
            .attr("class")
            .map(|classes| classes.split_whitespace().collect())
            .unwrap_or_default()
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.value().attr(name)
    }

    fn parent_element(&self) -> Option<Self> {
        self.parent().and_then(ElementRef::wrap)
    }

    fn element_children(&self) -> Vec<Self> {
        self.children().filter_map(ElementRef::wrap).collect()
    }

    fn element_index(&self) -> Option<usize> {
        self.parent_element()?;
        Some(
            self.prev_siblings()
                .filter(|node| node.value().is_element())
                .count(),
        )
    }

    fn text_content(&self) -> String {
        self.text().collect()
    }
}

/// Text of the page's `<title>`, trimmed; empty when missing.
pub fn page_title(document: &Html) -> String {
    document
        .query_selector_all("title")
        .ok()
        .and_then(|titles| titles.into_iter().next())
        .map(|title| title.text_content().trim().to_string())
        .unwrap_or_default()
}
