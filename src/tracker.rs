use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use scraper::Html;
use tracing::{info, warn};
use url::Url;

use crate::capture::{Capture, Selection, capture_element, new_tracked_item, select_element};
use crate::config::Config;
use crate::database::Database;
use crate::discord::DiscordNotifier;
use crate::dom::page_title;
use crate::error::{TrackerError, TrackerResult};
use crate::fetcher::{HttpFetcher, PageFetcher};
use crate::locator::Locator;
use crate::models::{
    EXPORT_VERSION, ElementDescriptor, ExportBundle, PriceUpdate, RefreshSummary, TrackedItem,
    dedup_selectors,
};

/// Characters of element text quoted in "no price" errors.
const ERROR_TEXT_PREVIEW: usize = 100;

#[derive(Clone)]
pub struct PriceTracker {
    fetcher: Arc<dyn PageFetcher>,
    database: Database,
    discord: DiscordNotifier,
    locator: Locator,
    delay: Duration,
    history_limit: usize,
}

impl PriceTracker {
    pub async fn new(config: &Config) -> TrackerResult<Self> {
        let fetcher = HttpFetcher::new(&config.fetch)?;
        let database = Database::new(&config.database_url).await?;
        let discord = DiscordNotifier::new(config.discord_webhook_url.clone());

        Ok(Self::with_parts(Arc::new(fetcher), database, discord, config))
    }

    pub fn with_parts(
        fetcher: Arc<dyn PageFetcher>,
        database: Database,
        discord: DiscordNotifier,
        config: &Config,
    ) -> Self {
        Self {
            fetcher,
            database,
            discord,
            locator: Locator::new(config.matching.clone()),
            delay: Duration::from_millis(config.fetch.delay_ms),
            history_limit: config.history.limit,
        }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn notifier(&self) -> &DiscordNotifier {
        &self.discord
    }

    /// Starts tracking the value `selection` points at on `url`.
    pub async fn track(&self, url: &str, selection: Selection) -> TrackerResult<TrackedItem> {
        let html = self.fetcher.fetch(url).await?;
        let (title, capture) = capture_page(&html, &selection)?;
        let title = if title.is_empty() { url.to_string() } else { title };

        let item = new_tracked_item(url, &title, capture, Utc::now())?;
        self.database.insert_item(&item).await?;

        info!(
            "Tracking '{}' at {} (primary selector '{}', {} alternatives)",
            item.title,
            item.current_price,
            item.selector,
            item.alternative_selectors.len()
        );
        Ok(item)
    }

    pub async fn list(&self) -> TrackerResult<Vec<TrackedItem>> {
        self.database.list_items().await
    }

    /// Re-reads the price of one item and stores it.
    pub async fn refresh_item(&self, id: &str) -> TrackerResult<PriceUpdate> {
        let item = self
            .database
            .get_item(id)
            .await?
            .ok_or_else(|| TrackerError::ItemNotFound(id.to_string()))?;

        self.refresh_tracked(&item).await
    }

    /// Refreshes every item one after another, pausing between fetches.
    ///
    /// Individual failures are logged and counted; they never stop the loop.
    pub async fn refresh_all(&self) -> TrackerResult<RefreshSummary> {
        let items = self.database.list_items().await?;
        let mut summary = RefreshSummary::default();

        if items.is_empty() {
            info!("No items to refresh");
            return Ok(summary);
        }

        for (i, item) in items.iter().enumerate() {
            match self.refresh_tracked(item).await {
                Ok(_) => summary.success_count += 1,
                Err(e) => {
                    warn!("Refresh failed for '{}': {}", item.title, e);
                    summary.error_count += 1;
                }
            }

            if i + 1 < items.len() && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        info!(
            "Refresh finished: {} succeeded, {} failed",
            summary.success_count, summary.error_count
        );
        Ok(summary)
    }

    pub async fn remove(&self, id: &str) -> TrackerResult<()> {
        if self.database.delete_item(id).await? {
            Ok(())
        } else {
            Err(TrackerError::ItemNotFound(id.to_string()))
        }
    }

    pub async fn clear(&self) -> TrackerResult<()> {
        self.database.clear().await
    }

    /// Pretty JSON of every tracked item.
    pub async fn export_json(&self) -> TrackerResult<String> {
        let bundle = ExportBundle {
            version: EXPORT_VERSION.to_string(),
            export_date: Utc::now(),
            tracking_items: self.database.list_items().await?,
        };
        Ok(serde_json::to_string_pretty(&bundle)?)
    }

    /// Replaces all tracked items with the ones in `json`.
    ///
    /// Nothing is written unless every item validates.
    pub async fn import_json(&self, json: &str) -> TrackerResult<usize> {
        let bundle: ExportBundle =
            serde_json::from_str(json).map_err(|e| TrackerError::InvalidImport(e.to_string()))?;

        let items = bundle
            .tracking_items
            .into_iter()
            .map(normalize_imported)
            .collect::<TrackerResult<Vec<_>>>()?;

        let mut ids = HashSet::new();
        if let Some(dup) = items.iter().find(|item| !ids.insert(item.id.as_str())) {
            return Err(TrackerError::InvalidImport(format!(
                "item id '{}' appears more than once",
                dup.id
            )));
        }

        self.database.replace_all(&items, self.history_limit).await?;
        info!("Imported {} tracked items", items.len());
        Ok(items.len())
    }

    async fn refresh_tracked(&self, item: &TrackedItem) -> TrackerResult<PriceUpdate> {
        let html = self.fetcher.fetch(&item.url).await?;
        let update = read_price(&self.locator, &html, &item.descriptor(), item.reference_price())?;

        let now = Utc::now();
        self.database
            .record_price(&item.id, &update, now, self.history_limit)
            .await?;

        info!(
            "'{}' is now {} (selector '{}')",
            item.title, update.price, update.used_selector
        );

        if item.current_price > 0.0 && update.price != item.current_price {
            let mut changed = item.clone();
            changed.current_price = update.price;
            changed.last_updated = now;
            if let Err(e) = self.discord.send_price_change(&changed, item.current_price).await {
                warn!("Price change notification failed: {}", e);
            }
        }

        Ok(update)
    }
}

// `Html` is not `Send`; parse and drop it without crossing an await.
fn capture_page(html: &str, selection: &Selection) -> TrackerResult<(String, Capture)> {
    let document = Html::parse_document(html);
    let title = page_title(&document);
    let element = select_element(&document, selection)?;

    let selected_text = match selection {
        Selection::Text(text) => text.as_str(),
        Selection::Selector(_) => "",
    };
    Ok((title, capture_element(&element, selected_text)?))
}

/// Locates the tracked element in `html` and reads its price.
pub fn read_price(
    locator: &Locator,
    html: &str,
    descriptor: &ElementDescriptor,
    previous_price: f64,
) -> TrackerResult<PriceUpdate> {
    let document = Html::parse_document(html);
    let located = locator.locate(&document, descriptor, previous_price)?;
    let (text, price) = located.read_price();

    if price <= 0.0 {
        let preview: String = text.chars().take(ERROR_TEXT_PREVIEW).collect();
        return Err(TrackerError::NoPriceFound(preview));
    }

    Ok(PriceUpdate {
        price,
        text,
        used_selector: located.used_selector().to_string(),
    })
}

fn normalize_imported(mut item: TrackedItem) -> TrackerResult<TrackedItem> {
    if item.id.trim().is_empty() || item.url.trim().is_empty() || item.selector.trim().is_empty() {
        return Err(TrackerError::InvalidImport(format!(
            "item '{}' is missing id, url or selector",
            item.id
        )));
    }
    if !item.initial_price.is_finite() {
        return Err(TrackerError::InvalidImport(format!(
            "item '{}' has no numeric initialPrice",
            item.id
        )));
    }

    if item.current_price <= 0.0 {
        item.current_price = item.initial_price;
    }
    if item.all_selectors.is_empty() {
        item.all_selectors = dedup_selectors(
            std::iter::once(item.selector.as_str())
                .chain(item.alternative_selectors.iter().map(String::as_str)),
        );
    }
    if item.domain.is_empty()
        && let Ok(url) = Url::parse(&item.url)
    {
        item.domain = url.host_str().unwrap_or_default().to_string();
    }

    Ok(item)
}
