use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::utils::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationResult {
    pub success: bool,
    pub message_id: Option<String>,
    pub error: Option<String>,
}

impl NotificationResult {
    pub fn sent(message_id: Option<String>) -> Self {
        Self {
            success: true,
            message_id,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error.into()),
        }
    }
}

/// A delivery channel for rendered listing messages (Telegram, Discord, email).
///
/// `Err` means the request could not be made at all; a request the channel
/// rejected comes back as an unsuccessful [`NotificationResult`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotifierPlugin: Send + Sync {
    fn name(&self) -> &str;
    fn plugin_type(&self) -> &str;

    async fn notify(&self, message: &str) -> Result<NotificationResult, AppError>;
    async fn test_connection(&self) -> Result<bool, AppError>;

    async fn shutdown(&self) -> Result<(), AppError> {
        Ok(())
    }
}
