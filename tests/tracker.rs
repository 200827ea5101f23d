// tests/tracker.rs
//
// Capture, refresh and persistence against an in-memory store and canned pages.
//
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use price_tracker::capture::Selection;
use price_tracker::config::Config;
use price_tracker::database::Database;
use price_tracker::discord::DiscordNotifier;
use price_tracker::fetcher::PageFetcher;
use price_tracker::scheduler::{AutoRefresh, MAX_INTERVAL_HOURS};
use price_tracker::tracker::PriceTracker;
use price_tracker::{TrackerError, TrackerResult};

const SHOP_URL: &str = "https://shop.example/kettle";

#[derive(Default)]
struct StubFetcher {
    pages: Mutex<HashMap<String, String>>,
}

impl StubFetcher {
    fn set(&self, url: &str, html: impl Into<String>) {
        self.pages.lock().unwrap().insert(url.to_string(), html.into());
    }

    fn remove(&self, url: &str) {
        self.pages.lock().unwrap().remove(url);
    }
}

#[async_trait]
impl PageFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> TrackerResult<String> {
        self.pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| TrackerError::Fetch {
                url: url.to_string(),
                reason: "404 Not Found".to_string(),
            })
    }
}

fn page_v1(price: &str) -> String {
    format!(
        r#"<html><head><title>Kettle</title></head><body>
            <div class="buy-box"><h1>Electric Kettle</h1><span id="price-1" class="amount">{price}</span></div>
        </body></html>"#
    )
}

fn page_v2(price: &str) -> String {
    format!(
        r#"<html><head><title>Kettle</title></head><body>
            <section class="checkout"><span class="amount sale">{price}</span></section>
        </body></html>"#
    )
}

async fn setup(history_limit: usize) -> (PriceTracker, Arc<StubFetcher>) {
    let mut config = Config::default();
    config.fetch.delay_ms = 0;
    config.history.limit = history_limit;

    let fetcher = Arc::new(StubFetcher::default());
    let database = Database::new("sqlite::memory:").await.unwrap();
    let tracker = PriceTracker::with_parts(
        fetcher.clone(),
        database,
        DiscordNotifier::new(None),
        &config,
    );

    (tracker, fetcher)
}

#[tokio::test]
async fn track_then_refresh_after_redesign() {
    let (tracker, fetcher) = setup(50).await;
    fetcher.set(SHOP_URL, page_v1("NT$1,290"));

    let item = tracker
        .track(SHOP_URL, Selection::Text("NT$1,290".to_string()))
        .await
        .unwrap();
    assert_eq!(item.title, "Kettle");
    assert_eq!(item.domain, "shop.example");
    assert_eq!(item.selector, "#price-1");
    assert_eq!(item.initial_price, 1290.0);
    assert_eq!(item.price_history.len(), 1);

    fetcher.set(SHOP_URL, page_v2("NT$1,090"));
    let update = tracker.refresh_item(&item.id).await.unwrap();
    assert_eq!(update.price, 1090.0);
    assert_eq!(update.used_selector, "span.amount");

    let items = tracker.list().await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].current_price, 1090.0);
    assert_eq!(items[0].initial_price, 1290.0);
    assert_eq!(items[0].full_element_text, "NT$1,090");
    let prices: Vec<f64> = items[0].price_history.iter().map(|s| s.price).collect();
    assert_eq!(prices, vec![1290.0, 1090.0]);
}

#[tokio::test]
async fn track_by_selector() {
    let (tracker, fetcher) = setup(50).await;
    fetcher.set(SHOP_URL, page_v1("$45.00"));

    let item = tracker
        .track(SHOP_URL, Selection::Selector("span.amount".to_string()))
        .await
        .unwrap();
    assert_eq!(item.current_price, 45.0);
    assert_eq!(item.captured_text, "$45.00");
}

#[tokio::test]
async fn track_fails_without_price() {
    let (tracker, fetcher) = setup(50).await;
    fetcher.set(SHOP_URL, "<html><body><p>Coming soon</p></body></html>");

    let err = tracker
        .track(SHOP_URL, Selection::Text("Coming soon".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, TrackerError::NoPriceFound(_)));

    let err = tracker
        .track(SHOP_URL, Selection::Text("not on the page".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, TrackerError::SelectionNotFound(_)));

    assert!(tracker.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_refresh_leaves_item_untouched() {
    let (tracker, fetcher) = setup(50).await;
    fetcher.set(SHOP_URL, page_v1("NT$1,290"));
    let item = tracker
        .track(SHOP_URL, Selection::Text("NT$1,290".to_string()))
        .await
        .unwrap();

    fetcher.set(SHOP_URL, "<html><body><p>Sold out</p></body></html>");
    let err = tracker.refresh_item(&item.id).await.unwrap_err();
    assert!(matches!(err, TrackerError::Locate(_)));

    let stored = tracker.database().get_item(&item.id).await.unwrap().unwrap();
    assert_eq!(stored.current_price, 1290.0);
    assert_eq!(stored.price_history.len(), 1);
}

#[tokio::test]
async fn refresh_all_counts_failures() {
    let (tracker, fetcher) = setup(50).await;
    let other_url = "https://other.example/item";
    fetcher.set(SHOP_URL, page_v1("NT$1,290"));
    fetcher.set(other_url, page_v1("$20.00"));

    tracker
        .track(SHOP_URL, Selection::Text("NT$1,290".to_string()))
        .await
        .unwrap();
    tracker
        .track(other_url, Selection::Selector("#price-1".to_string()))
        .await
        .unwrap();

    fetcher.remove(other_url);
    let summary = tracker.refresh_all().await.unwrap();
    assert_eq!(summary.success_count, 1);
    assert_eq!(summary.error_count, 1);
    assert_eq!(summary.attempted(), 2);
}

#[tokio::test]
async fn refresh_all_without_items() {
    let (tracker, _fetcher) = setup(50).await;
    let summary = tracker.refresh_all().await.unwrap();
    assert_eq!(summary.attempted(), 0);
}

#[tokio::test]
async fn history_keeps_newest_samples() {
    let (tracker, fetcher) = setup(3).await;
    fetcher.set(SHOP_URL, page_v1("$900"));
    let item = tracker
        .track(SHOP_URL, Selection::Selector("#price-1".to_string()))
        .await
        .unwrap();

    for price in ["$1,000", "$1,100", "$1,200", "$1,300"] {
        fetcher.set(SHOP_URL, page_v1(price));
        tracker.refresh_item(&item.id).await.unwrap();
    }

    let history = tracker.database().history(&item.id).await.unwrap();
    let prices: Vec<f64> = history.iter().map(|s| s.price).collect();
    assert_eq!(prices, vec![1100.0, 1200.0, 1300.0]);
}

#[tokio::test]
async fn remove_and_clear() {
    let (tracker, fetcher) = setup(50).await;
    fetcher.set(SHOP_URL, page_v1("$30.00"));
    let item = tracker
        .track(SHOP_URL, Selection::Selector("#price-1".to_string()))
        .await
        .unwrap();

    let err = tracker.remove("missing").await.unwrap_err();
    assert!(matches!(err, TrackerError::ItemNotFound(id) if id == "missing"));

    let err = tracker.refresh_item("missing").await.unwrap_err();
    assert!(matches!(err, TrackerError::ItemNotFound(_)));

    tracker.remove(&item.id).await.unwrap();
    assert!(tracker.list().await.unwrap().is_empty());
    assert!(tracker.database().history(&item.id).await.unwrap().is_empty());

    tracker
        .track(SHOP_URL, Selection::Selector("#price-1".to_string()))
        .await
        .unwrap();
    tracker.clear().await.unwrap();
    assert!(tracker.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn export_then_import_restores_items() {
    let (tracker, fetcher) = setup(50).await;
    fetcher.set(SHOP_URL, page_v1("NT$1,290"));
    let item = tracker
        .track(SHOP_URL, Selection::Text("NT$1,290".to_string()))
        .await
        .unwrap();
    fetcher.set(SHOP_URL, page_v1("NT$1,250"));
    tracker.refresh_item(&item.id).await.unwrap();

    let json = tracker.export_json().await.unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["version"], "1.0");
    assert!(value["exportDate"].is_string());
    assert_eq!(value["trackingItems"][0]["selector"], "#price-1");

    tracker.clear().await.unwrap();
    assert_eq!(tracker.import_json(&json).await.unwrap(), 1);

    let items = tracker.list().await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, item.id);
    assert_eq!(items[0].current_price, 1250.0);
    assert_eq!(items[0].price_history.len(), 2);
}

#[tokio::test]
async fn invalid_import_keeps_existing_items() {
    let (tracker, fetcher) = setup(50).await;
    fetcher.set(SHOP_URL, page_v1("$30.00"));
    tracker
        .track(SHOP_URL, Selection::Selector("#price-1".to_string()))
        .await
        .unwrap();

    let err = tracker.import_json("not json").await.unwrap_err();
    assert!(matches!(err, TrackerError::InvalidImport(_)));

    let missing_selector = r##"{"version": "1.0", "trackingItems": [
        {"id": "a", "url": "https://shop.example/a", "selector": "#a", "initialPrice": 10},
        {"id": "b", "url": "https://shop.example/b", "selector": "", "initialPrice": 10}
    ]}"##;
    let err = tracker.import_json(missing_selector).await.unwrap_err();
    assert!(matches!(err, TrackerError::InvalidImport(_)));

    assert_eq!(tracker.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn import_rejects_repeated_ids() {
    let (tracker, fetcher) = setup(50).await;
    fetcher.set(SHOP_URL, page_v1("$30.00"));
    tracker
        .track(SHOP_URL, Selection::Selector("#price-1".to_string()))
        .await
        .unwrap();

    let repeated = r##"{"version": "1.0", "trackingItems": [
        {"id": "a", "url": "https://shop.example/a", "selector": "#a", "initialPrice": 10},
        {"id": "a", "url": "https://shop.example/b", "selector": "#b", "initialPrice": 12}
    ]}"##;
    let err = tracker.import_json(repeated).await.unwrap_err();
    assert!(matches!(err, TrackerError::InvalidImport(msg) if msg.contains("'a'")));

    let items = tracker.list().await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].url, SHOP_URL);
}

#[tokio::test(flavor = "multi_thread")]
async fn auto_refresh_lifecycle() {
    let (tracker, _fetcher) = setup(50).await;
    let mut auto = AutoRefresh::new(tracker);
    assert!(!auto.is_running());

    auto.start(1).await.unwrap();
    assert!(auto.is_running());
    assert_eq!(auto.interval_hours(), Some(1));

    auto.start(6).await.unwrap();
    assert_eq!(auto.interval_hours(), Some(6));

    auto.start(0).await.unwrap();
    assert!(!auto.is_running());

    auto.start(2).await.unwrap();
    auto.stop().await.unwrap();
    assert!(!auto.is_running());
    assert_eq!(auto.interval_hours(), None);
}

#[tokio::test(flavor = "multi_thread")]
async fn auto_refresh_rejects_oversized_interval() {
    let (tracker, _fetcher) = setup(50).await;
    let mut auto = AutoRefresh::new(tracker);

    auto.start(3).await.unwrap();
    assert!(auto.start(u64::MAX / 1000).await.is_err());
    assert!(!auto.is_running());
    assert!(auto.start(MAX_INTERVAL_HOURS + 1).await.is_err());

    auto.start(MAX_INTERVAL_HOURS).await.unwrap();
    assert_eq!(auto.interval_hours(), Some(MAX_INTERVAL_HOURS));
    auto.stop().await.unwrap();
}
