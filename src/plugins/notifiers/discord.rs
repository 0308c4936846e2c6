use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::config::DiscordConfig;
use crate::plugins::traits::{NotificationResult, NotifierPlugin};
use crate::utils::error::AppError;

// Discord rejects embed descriptions longer than this.
const MAX_DESCRIPTION: usize = 4096;

pub struct DiscordNotifier {
    client: Client,
    webhook_url: String,
    username: String,
    avatar_url: Option<String>,
}

impl DiscordNotifier {
    /// `None` when no webhook is configured.
    pub fn from_config(config: &DiscordConfig) -> Option<Self> {
        let webhook_url = config.webhook_url.as_deref().filter(|u| !u.is_empty())?;
        Some(Self {
            client: Client::new(),
            webhook_url: webhook_url.to_string(),
            username: config.username.clone(),
            avatar_url: config.avatar_url.clone(),
        })
    }

    fn create_embed(&self, message: &str) -> serde_json::Value {
        let mut lines = message.lines();
        let title = lines.next().unwrap_or_default().trim();
        let description: String = lines
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .chars()
            .take(MAX_DESCRIPTION)
            .collect();

        let mut embed = json!({
            "title": title,
            "description": description,
            "color": 0x0099ff,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "footer": { "text": "Listing Watcher" }
        });

        // A trailing URL line links the embed title to the listing.
        if let Some(url) = message.lines().rev().map(str::trim).find(|l| l.starts_with("http")) {
            embed["url"] = json!(url);
        }

        embed
    }

    fn create_webhook_payload(&self, message: &str) -> serde_json::Value {
        let mut payload = json!({
            "username": self.username,
            "embeds": [self.create_embed(message)]
        });

        if let Some(avatar_url) = &self.avatar_url {
            payload["avatar_url"] = json!(avatar_url);
        }

        payload
    }
}

#[async_trait]
impl NotifierPlugin for DiscordNotifier {
    fn name(&self) -> &str {
        "Discord Notifier"
    }

    fn plugin_type(&self) -> &str {
        "discord"
    }

    async fn notify(&self, message: &str) -> Result<NotificationResult, AppError> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&self.create_webhook_payload(message))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(NotificationResult::sent(None))
        } else {
            let body = response.text().await.unwrap_or_default();
            Ok(NotificationResult::failed(format!("Discord returned {}: {}", status, body)))
        }
    }

    async fn test_connection(&self) -> Result<bool, AppError> {
        // GET on a webhook URL returns its metadata without posting anything.
        let response = self.client.get(&self.webhook_url).send().await?;
        Ok(response.status().is_success())
    }
}
