use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool, Transaction, migrate::MigrateDatabase};
use tracing::info;

use crate::error::TrackerResult;
use crate::models::{PriceSample, PriceUpdate, TrackedItem};

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> TrackerResult<Self> {
        let in_memory = db_url.contains(":memory:");

        if !in_memory {
            let file = db_url
                .trim_start_matches("sqlite://")
                .trim_start_matches("sqlite:")
                .split('?')
                .next()
                .unwrap_or_default();
            if let Some(dir) = Path::new(file).parent()
                && !dir.as_os_str().is_empty()
            {
                std::fs::create_dir_all(dir).map_err(sqlx::Error::Io)?;
            }

            // Create database file if it doesn't exist
            if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
                info!("Creating database file");
                Sqlite::create_database(db_url).await?;
            }
        }

        // Every in-memory connection is its own database, so keep one open
        // for the life of the pool.
        let mut options = SqlitePoolOptions::new().max_connections(if in_memory { 1 } else { 5 });
        if in_memory {
            options = options.idle_timeout(None).max_lifetime(None);
        }
        let pool = options.connect(db_url).await?;

        info!("Running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("Database initialized successfully");
        Ok(Self { pool })
    }

    pub async fn insert_item(&self, item: &TrackedItem) -> TrackerResult<()> {
        let mut tx = self.pool.begin().await?;
        insert_item_tx(&mut tx, item).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn get_item(&self, id: &str) -> TrackerResult<Option<TrackedItem>> {
        let Some(row) = sqlx::query("SELECT * FROM tracked_items WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let mut item = item_from_row(&row)?;
        item.price_history = self.history(id).await?;
        Ok(Some(item))
    }

    /// All items in insertion order, each with its history.
    pub async fn list_items(&self) -> TrackerResult<Vec<TrackedItem>> {
        let rows = sqlx::query("SELECT * FROM tracked_items ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;

        let mut histories: HashMap<String, Vec<PriceSample>> = HashMap::new();
        let history_rows = sqlx::query(
            "SELECT item_id, price, recorded_at, full_text FROM price_history ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        for row in history_rows {
            histories
                .entry(row.get::<String, _>("item_id"))
                .or_default()
                .push(sample_from_row(&row));
        }

        rows.iter()
            .map(|row| {
                let mut item = item_from_row(row)?;
                item.price_history = histories.remove(&item.id).unwrap_or_default();
                Ok(item)
            })
            .collect()
    }

    /// History of one item, oldest first.
    pub async fn history(&self, id: &str) -> TrackerResult<Vec<PriceSample>> {
        let rows = sqlx::query(
            "SELECT price, recorded_at, full_text FROM price_history WHERE item_id = ? ORDER BY id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(sample_from_row).collect())
    }

    /// Stores a refreshed price and keeps only the newest `limit` samples.
    pub async fn record_price(
        &self,
        id: &str,
        update: &PriceUpdate,
        at: DateTime<Utc>,
        limit: usize,
    ) -> TrackerResult<bool> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r"
            UPDATE tracked_items
            SET current_price = ?, full_element_text = ?, last_updated = ?
            WHERE id = ?
            ",
        )
        .bind(update.price)
        .bind(&update.text)
        .bind(at)
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO price_history (item_id, price, recorded_at, full_text) VALUES (?, ?, ?, ?)",
        )
        .bind(id)
        .bind(update.price)
        .bind(at)
        .bind(&update.text)
        .execute(&mut *tx)
        .await?;

        trim_history(&mut tx, id, limit).await?;

        tx.commit().await?;
        Ok(true)
    }

    pub async fn delete_item(&self, id: &str) -> TrackerResult<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM price_history WHERE item_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM tracked_items WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;

        Ok(deleted > 0)
    }

    pub async fn clear(&self) -> TrackerResult<()> {
        self.replace_all(&[], 0).await
    }

    /// Swaps the whole tracked set for `items`, trimming each history.
    pub async fn replace_all(&self, items: &[TrackedItem], limit: usize) -> TrackerResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM price_history").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM tracked_items").execute(&mut *tx).await?;

        for item in items {
            insert_item_tx(&mut tx, item).await?;
            trim_history(&mut tx, &item.id, limit).await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

async fn insert_item_tx(tx: &mut Transaction<'_, Sqlite>, item: &TrackedItem) -> TrackerResult<()> {
    sqlx::query(
        r"
        INSERT INTO tracked_items (
            id, title, url, domain, selector, alternative_selectors, all_selectors,
            selected_text, captured_text, full_element_text,
            initial_price, current_price, last_updated
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(&item.id)
    .bind(&item.title)
    .bind(&item.url)
    .bind(&item.domain)
    .bind(&item.selector)
    .bind(serde_json::to_string(&item.alternative_selectors)?)
    .bind(serde_json::to_string(&item.all_selectors)?)
    .bind(&item.selected_text)
    .bind(&item.captured_text)
    .bind(&item.full_element_text)
    .bind(item.initial_price)
    .bind(item.current_price)
    .bind(item.last_updated)
    .execute(&mut **tx)
    .await?;

    for sample in &item.price_history {
        sqlx::query(
            "INSERT INTO price_history (item_id, price, recorded_at, full_text) VALUES (?, ?, ?, ?)",
        )
        .bind(&item.id)
        .bind(sample.price)
        .bind(sample.date)
        .bind(&sample.full_text)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

// A limit of 0 leaves the history alone; `clear` relies on it.
async fn trim_history(tx: &mut Transaction<'_, Sqlite>, id: &str, limit: usize) -> TrackerResult<()> {
    if limit == 0 {
        return Ok(());
    }

    sqlx::query(
        r"
        DELETE FROM price_history
        WHERE item_id = ?
          AND id NOT IN (
              SELECT id FROM price_history WHERE item_id = ? ORDER BY id DESC LIMIT ?
          )
        ",
    )
    .bind(id)
    .bind(id)
    .bind(i64::try_from(limit).unwrap_or(i64::MAX))
    .execute(&mut **tx)
    .await?;

    Ok(())
}

fn item_from_row(row: &SqliteRow) -> TrackerResult<TrackedItem> {
    Ok(TrackedItem {
        id: row.get("id"),
        title: row.get("title"),
        url: row.get("url"),
        domain: row.get("domain"),
        selector: row.get("selector"),
        alternative_selectors: serde_json::from_str(row.get::<&str, _>("alternative_selectors"))?,
        all_selectors: serde_json::from_str(row.get::<&str, _>("all_selectors"))?,
        selected_text: row.get("selected_text"),
        captured_text: row.get("captured_text"),
        full_element_text: row.get("full_element_text"),
        initial_price: row.get("initial_price"),
        current_price: row.get("current_price"),
        last_updated: row.get("last_updated"),
        price_history: Vec::new(),
    })
}

fn sample_from_row(row: &SqliteRow) -> PriceSample {
    PriceSample {
        price: row.get("price"),
        date: row.get("recorded_at"),
        full_text: row.get("full_text"),
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}
