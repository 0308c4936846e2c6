use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_retry::strategy::FixedInterval;
use tokio_retry::Retry;

use super::notifiers::{DiscordNotifier, EmailNotifier, TelegramNotifier};
use super::traits::{NotificationResult, NotifierPlugin};
use crate::config::NotificationsConfig;
use crate::utils::error::AppError;

pub type NotifierPluginBox = Box<dyn NotifierPlugin>;

/// Per-notifier outcome of one broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub plugin_type: String,
    pub result: NotificationResult,
}

#[derive(Clone)]
pub struct PluginManager {
    notifiers: Arc<RwLock<Vec<NotifierPluginBox>>>,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl PluginManager {
    pub fn new() -> Self {
        Self {
            notifiers: Arc::new(RwLock::new(Vec::new())),
            retry_attempts: 0,
            retry_delay: Duration::ZERO,
        }
    }

    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.retry_attempts = attempts;
        self.retry_delay = delay;
        self
    }

    /// Registers every notifier that has enough configuration to run.
    pub async fn from_config(config: &NotificationsConfig) -> Result<Self, AppError> {
        let manager = Self::new().with_retry(config.retry_attempts, Duration::from_millis(config.retry_delay_ms));

        if let Some(telegram) = TelegramNotifier::from_config(&config.telegram) {
            manager.register_notifier(Box::new(telegram)).await?;
        }
        if let Some(discord) = DiscordNotifier::from_config(&config.discord) {
            manager.register_notifier(Box::new(discord)).await?;
        }
        if let Some(email) = EmailNotifier::from_config(&config.smtp)? {
            manager.register_notifier(Box::new(email)).await?;
        }

        if manager.is_empty().await {
            tracing::warn!("No notifier configured, new listings will only be logged");
        }
        Ok(manager)
    }

    /// Register a notifier plugin. A second plugin of the same type is rejected.
    pub async fn register_notifier(&self, plugin: NotifierPluginBox) -> Result<(), AppError> {
        let mut notifiers = self.notifiers.write().await;
        if notifiers.iter().any(|n| n.plugin_type() == plugin.plugin_type()) {
            return Err(AppError::PluginError(format!(
                "Notifier '{}' is already registered",
                plugin.plugin_type()
            )));
        }
        tracing::info!("Registered notifier: {}", plugin.name());
        notifiers.push(plugin);
        Ok(())
    }

    /// Notifier types in registration order.
    pub async fn list_notifier_types(&self) -> Vec<String> {
        let notifiers = self.notifiers.read().await;
        notifiers.iter().map(|n| n.plugin_type().to_string()).collect()
    }

    pub async fn is_empty(&self) -> bool {
        self.notifiers.read().await.is_empty()
    }

    /// Sends `message` to every registered notifier. Failures are logged and
    /// reported, never returned as errors.
    pub async fn broadcast(&self, message: &str) -> Vec<DeliveryReport> {
        let notifiers = self.notifiers.read().await;
        let mut reports = Vec::with_capacity(notifiers.len());

        for notifier in notifiers.iter() {
            let result = self.deliver(notifier.as_ref(), message).await;
            if result.success {
                counter!("watcher_notifications_sent_total").increment(1);
            } else {
                counter!("watcher_notifications_failed_total").increment(1);
                tracing::error!(
                    "Notifier {} failed: {}",
                    notifier.plugin_type(),
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
            reports.push(DeliveryReport {
                plugin_type: notifier.plugin_type().to_string(),
                result,
            });
        }

        reports
    }

    async fn deliver(&self, notifier: &dyn NotifierPlugin, message: &str) -> NotificationResult {
        let strategy = FixedInterval::new(self.retry_delay).take(self.retry_attempts as usize);

        let attempt = Retry::spawn(strategy, || async move {
            match notifier.notify(message).await {
                Ok(result) if result.success => Ok(result),
                Ok(result) => Err(result.error.unwrap_or_else(|| "rejected".to_string())),
                Err(e) => Err(e.to_string()),
            }
        })
        .await;

        attempt.unwrap_or_else(NotificationResult::failed)
    }

    /// Checks every notifier's connection, returning `(plugin_type, reachable)`.
    pub async fn test_connections(&self) -> Vec<(String, bool)> {
        let notifiers = self.notifiers.read().await;
        let mut results = Vec::with_capacity(notifiers.len());
        for notifier in notifiers.iter() {
            let reachable = notifier.test_connection().await.unwrap_or_else(|e| {
                tracing::warn!("Connection test for {} failed: {}", notifier.plugin_type(), e);
                false
            });
            results.push((notifier.plugin_type().to_string(), reachable));
        }
        results
    }

    /// Shutdown all plugins
    pub async fn shutdown(&self) -> Result<(), AppError> {
        let mut notifiers = self.notifiers.write().await;
        for plugin in notifiers.drain(..) {
            if let Err(e) = plugin.shutdown().await {
                tracing::warn!("Error shutting down notifier plugin: {}", e);
            }
        }
        Ok(())
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}
