use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::config::TelegramConfig;
use crate::plugins::traits::{NotificationResult, NotifierPlugin};
use crate::utils::error::AppError;

/// Sends messages through the Telegram Bot API `sendMessage` method.
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
    result: Option<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

impl TelegramNotifier {
    /// `None` when the bot token or chat id is not configured.
    pub fn from_config(config: &TelegramConfig) -> Option<Self> {
        let bot_token = config.bot_token.as_deref().filter(|t| !t.is_empty())?;
        let chat_id = config.chat_id.as_deref().filter(|c| !c.is_empty())?;
        Some(Self::new(&config.api_base, bot_token, chat_id))
    }

    pub fn new(api_base: &str, bot_token: &str, chat_id: &str) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }
}

/// Telegram mis-parses double quotes in plain messages, so they are dropped.
fn sanitize(message: &str) -> String {
    message.replace('"', "")
}

#[async_trait]
impl NotifierPlugin for TelegramNotifier {
    fn name(&self) -> &str {
        "Telegram Notifier"
    }

    fn plugin_type(&self) -> &str {
        "telegram"
    }

    async fn notify(&self, message: &str) -> Result<NotificationResult, AppError> {
        let payload = json!({
            "chat_id": self.chat_id,
            "text": sanitize(message),
        });

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body: ApiResponse = match response.json().await {
            Ok(body) => body,
            Err(_) => return Ok(NotificationResult::failed(format!("Telegram returned {}", status))),
        };

        if body.ok {
            Ok(NotificationResult::sent(
                body.result.map(|sent| sent.message_id.to_string()),
            ))
        } else {
            Ok(NotificationResult::failed(
                body.description.unwrap_or_else(|| format!("Telegram returned {}", status)),
            ))
        }
    }

    async fn test_connection(&self) -> Result<bool, AppError> {
        let response = self.client.get(self.method_url("getMe")).send().await?;
        Ok(response.status().is_success())
    }
}
