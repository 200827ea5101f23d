//! # Discord Webhook Integration
//!
//! Optional webhook notifications for the refresh loop. Two kinds of
//! message are sent:
//!
//! - **Price change**: one embed per tracked item whose refreshed price
//!   differs from the previous one, coloured green for drops and red for
//!   rises, with old/new price and change-since-capture fields.
//! - **Refresh summary**: one embed after a scheduled bulk refresh with
//!   success and failure counts.
//!
//! ## Configuration
//!
//! Set `DISCORD_WEBHOOK_URL` (or `discord_webhook_url` in the config file).
//! If not set, notifications are disabled and only logged.

use anyhow::Result;
use chrono::Utc;
use reqwest::Client;
use tracing::{error, info, warn};

use crate::models::{DiscordEmbed, DiscordField, DiscordMessage, RefreshSummary, TrackedItem};

const COLOR_DROP: u32 = 0x0057_F287;
const COLOR_RISE: u32 = 0x00ED_4245;
const COLOR_INFO: u32 = 0x0058_65F2; // Discord blue

/// Discord webhook client for price notifications.
///
/// Works with or without a webhook URL; without one every send is a
/// logged no-op. Cloning is cheap since `reqwest::Client` is shared.
pub struct DiscordNotifier {
    client: Client,
    webhook_url: Option<String>,
}

impl DiscordNotifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        if webhook_url.is_none() {
            warn!("DISCORD_WEBHOOK_URL not set - Discord notifications will be disabled");
        }

        Self {
            client: Client::new(),
            webhook_url,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    /// Notifies that `item` moved from `old_price` to its current price.
    pub async fn send_price_change(&self, item: &TrackedItem, old_price: f64) -> Result<()> {
        let embed = price_change_embed(item, old_price);
        self.send(embed, &item.title).await
    }

    /// Posts the counts from a bulk refresh.
    pub async fn send_refresh_summary(&self, summary: &RefreshSummary) -> Result<()> {
        let embed = DiscordEmbed {
            title: "Price tracker refresh finished".to_string(),
            description: format!(
                "Succeeded: {}, failed: {}",
                summary.success_count, summary.error_count
            ),
            url: None,
            color: COLOR_INFO,
            timestamp: Utc::now().to_rfc3339(),
            fields: Vec::new(),
        };
        self.send(embed, "refresh summary").await
    }

    async fn send(&self, embed: DiscordEmbed, subject: &str) -> Result<()> {
        let Some(webhook_url) = &self.webhook_url else {
            info!("Discord disabled, skipping notification for: {}", subject);
            return Ok(());
        };

        let message = DiscordMessage {
            embeds: vec![embed],
        };

        let response = self.client.post(webhook_url).json(&message).send().await?;

        if response.status().is_success() {
            info!("Discord notification sent for: {}", subject);
        } else {
            error!("Failed to send Discord notification: {}", response.status());
        }

        Ok(())
    }
}

fn price_change_embed(item: &TrackedItem, old_price: f64) -> DiscordEmbed {
    let dropped = item.current_price < old_price;
    let title = if dropped {
        "📉 Price dropped"
    } else {
        "📈 Price went up"
    };

    DiscordEmbed {
        title: title.to_string(),
        description: item.title.clone(),
        url: Some(item.url.clone()),
        color: if dropped { COLOR_DROP } else { COLOR_RISE },
        timestamp: item.last_updated.to_rfc3339(),
        fields: vec![
            DiscordField {
                name: "Was".to_string(),
                value: format!("{old_price:.2}"),
                inline: true,
            },
            DiscordField {
                name: "Now".to_string(),
                value: format!("{:.2}", item.current_price),
                inline: true,
            },
            DiscordField {
                name: "Since capture".to_string(),
                value: format!("{:+.1}%", item.change_percent()),
                inline: true,
            },
        ],
    }
}

impl Clone for DiscordNotifier {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            webhook_url: self.webhook_url.clone(),
        }
    }
}
