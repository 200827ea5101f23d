//! Track a price on a web page across markup changes.
//!
//! The two core pieces are pure and synchronous:
//!
//! - [`extract_price`] reads a single best-guess price out of noisy text.
//! - [`generate_descriptor`] records how to find an element again, and
//!   [`locate`] re-finds it in a later version of the page.
//!
//! Around them, [`tracker::PriceTracker`] fetches pages, persists tracked
//! items with their history, and [`scheduler::AutoRefresh`] refreshes them
//! periodically.

pub mod capture;
pub mod config;
pub mod database;
pub mod discord;
pub mod dom;
pub mod error;
pub mod fetcher;
pub mod locator;
pub mod models;
pub mod price;
pub mod scheduler;
pub mod tracker;

pub use error::{LocateError, TrackerError, TrackerResult};
pub use locator::{Located, Locator, MatchingConfig, Strategy, generate_descriptor, generate_selectors, locate};
pub use models::{ElementDescriptor, SelectorSet, TrackedItem};
pub use price::extract_price;
