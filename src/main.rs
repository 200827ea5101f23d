use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use price_tracker::capture::Selection;
use price_tracker::config::Config;
use price_tracker::scheduler::AutoRefresh;
use price_tracker::tracker::PriceTracker;

#[derive(Parser)]
#[command(name = "price-tracker", version, about = "Track prices on web pages across layout changes")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start tracking a price on a page
    Track {
        url: String,
        /// Text of the price as shown on the page
        #[arg(long, conflicts_with = "selector", required_unless_present = "selector")]
        text: Option<String>,
        /// CSS selector of the price element
        #[arg(long)]
        selector: Option<String>,
    },
    /// List tracked items
    List,
    /// Refresh one item, or all of them
    Refresh { id: Option<String> },
    /// Stop tracking an item
    Remove { id: String },
    /// Stop tracking everything
    Clear,
    /// Write all tracked items to a JSON file
    Export { path: Option<String> },
    /// Replace tracked items with the ones in a JSON file
    Import { path: String },
    /// Refresh periodically until interrupted
    Watch {
        /// Hours between refreshes (defaults to the configured interval)
        #[arg(long)]
        hours: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    let tracker = PriceTracker::new(&config).await?;

    match cli.command {
        Command::Track {
            url,
            text,
            selector,
        } => {
            let selection = match (text, selector) {
                (Some(text), _) => Selection::Text(text),
                (None, Some(selector)) => Selection::Selector(selector),
                (None, None) => bail!("either --text or --selector is required"),
            };
            let item = tracker.track(&url, selection).await?;
            println!("Tracking {} [{}]", item.title, item.id);
            println!("  price:     {:.2}", item.current_price);
            println!("  selector:  {}", item.selector);
            println!("  fallbacks: {}", item.alternative_selectors.len());
        }
        Command::List => {
            let items = tracker.list().await?;
            if items.is_empty() {
                println!("No tracked items");
            }
            for item in items {
                println!(
                    "{}  {:>12.2}  {:+6.1}%  {}  {}",
                    item.id,
                    item.current_price,
                    item.change_percent(),
                    item.last_updated.format("%Y-%m-%d %H:%M"),
                    item.title
                );
            }
        }
        Command::Refresh { id: Some(id) } => {
            let update = tracker.refresh_item(&id).await?;
            println!("{:.2} (via {})", update.price, update.used_selector);
        }
        Command::Refresh { id: None } => {
            let summary = tracker.refresh_all().await?;
            println!(
                "Done! Succeeded: {}, failed: {}",
                summary.success_count, summary.error_count
            );
        }
        Command::Remove { id } => {
            tracker.remove(&id).await?;
            println!("Removed {id}");
        }
        Command::Clear => {
            tracker.clear().await?;
            println!("Cleared all tracked items");
        }
        Command::Export { path } => {
            let path = path.unwrap_or_else(|| {
                format!("price-tracker-{}.json", Utc::now().format("%Y-%m-%d"))
            });
            let json = tracker.export_json().await?;
            std::fs::write(&path, json).with_context(|| format!("write {path}"))?;
            println!("Exported to {path}");
        }
        Command::Import { path } => {
            let json = std::fs::read_to_string(&path).with_context(|| format!("read {path}"))?;
            let count = tracker.import_json(&json).await?;
            println!("Imported {count} items");
        }
        Command::Watch { hours } => {
            if hours.is_none() && !config.refresh.auto_refresh {
                bail!("auto refresh is disabled; set refresh.auto_refresh = true or pass --hours");
            }
            let hours = hours.unwrap_or(config.refresh.interval_hours);
            info!("Starting price tracker watch mode");

            // Run once immediately
            if let Err(e) = tracker.refresh_all().await {
                error!("Error during initial refresh: {}", e);
            }

            let mut auto = AutoRefresh::new(tracker.clone());
            auto.start(hours).await?;

            tokio::signal::ctrl_c().await?;
            auto.stop().await?;
        }
    }

    Ok(())
}
