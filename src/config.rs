use config::{Config, ConfigError, Environment, File};
use scraper::Selector;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use validator::Validate;

use crate::core::locale;
use crate::models::SearchTarget;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub searches: Vec<SearchConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SearchConfig {
    #[validate(url(message = "search url must be an absolute URL"))]
    pub url: String,
    #[serde(default)]
    pub domains: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub user_agent: String,
    /// Seconds before a page request is abandoned.
    pub request_timeout: u64,
    /// Pause between two consecutive mirror requests.
    pub mirror_delay_ms: u64,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            // The marketplace serves a different layout to non-desktop agents.
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_3) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/80.0.3987.149 Safari/537.36".to_string(),
            request_timeout: 5,
            mirror_delay_ms: 2000,
        }
    }
}

/// CSS selectors and clean-up rules for one search results page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub item: String,
    pub title: String,
    pub subtitle: String,
    pub price: String,
    pub date: String,
    /// Used when the item's first child element carries no href.
    pub link: String,
    /// Everything from the first marker on is dropped from listing URLs.
    pub tracking_markers: Vec<String>,
    pub title_prefixes: Vec<String>,
    pub min_children: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            item: "div.s-item__info".to_string(),
            title: ".s-item__title".to_string(),
            subtitle: ".s-item__subtitle".to_string(),
            price: ".s-item__details .s-item__price".to_string(),
            date: ".s-item__details .s-item__listingDate".to_string(),
            link: "a[href]".to_string(),
            tracking_markers: vec!["&amdata".to_string()],
            title_prefixes: vec!["New listing".to_string()],
            min_children: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub interval_secs: u64,
    pub run_on_start: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            run_on_start: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    Json,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackendKind,
    pub path: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::Json,
            path: "scraped.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub telegram: TelegramConfig,
    pub discord: DiscordConfig,
    pub smtp: SmtpConfig,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    pub api_base: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base: "https://api.telegram.org".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    pub webhook_url: Option<String>,
    pub username: String,
    pub avatar_url: Option<String>,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            username: "Listing Watcher".to_string(),
            avatar_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: Option<String>,
    pub to_address: Option<String>,
    pub from_name: String,
    pub use_tls: bool,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 587,
            username: None,
            password: None,
            from_address: None,
            to_address: None,
            from_name: "Listing Watcher".to_string(),
            use_tls: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9001,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// When set, logs are also written to a daily rolling file here.
    pub directory: Option<String>,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            file_prefix: "listing-watcher.log".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_dir(Path::new("config"))
    }

    pub fn from_dir(dir: &Path) -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        let source = |name: &str| dir.join(name).to_string_lossy().to_string();

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name(&source("default")))
            // Add environment-specific config
            .add_source(File::with_name(&source(&run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name(&source("local")).required(false))
            // Add environment variables with prefix "WATCHER_"
            .add_source(Environment::with_prefix("WATCHER").separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        // Telegram credentials conventionally live in .env
        if config.notifications.telegram.bot_token.is_none() {
            config.notifications.telegram.bot_token = env::var("TELEGRAM_TOKEN").ok();
        }
        if config.notifications.telegram.chat_id.is_none() {
            config.notifications.telegram.chat_id = env::var("TELEGRAM_CHAT_ID").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.searches.is_empty() {
            return Err(ConfigError::Message("At least one search must be configured".into()));
        }

        for search in &self.searches {
            search
                .validate()
                .map_err(|e| ConfigError::Message(format!("Invalid search '{}': {}", search.url, e)))?;

            let target = SearchTarget::new(&search.url, search.domains.clone())
                .map_err(|e| ConfigError::Message(e.to_string()))?;
            for domain in target.domains() {
                locale::resolve(domain).map_err(|e| {
                    ConfigError::Message(format!("Search '{}': {}", search.url, e))
                })?;
            }
        }

        if self.scraper.request_timeout == 0 {
            return Err(ConfigError::Message("Scraper request_timeout must be greater than 0".into()));
        }

        if self.scheduler.interval_secs == 0 {
            return Err(ConfigError::Message("Scheduler interval_secs must be greater than 0".into()));
        }

        let selectors = [
            ("item", &self.extraction.item),
            ("title", &self.extraction.title),
            ("subtitle", &self.extraction.subtitle),
            ("price", &self.extraction.price),
            ("date", &self.extraction.date),
            ("link", &self.extraction.link),
        ];
        for (name, selector) in selectors {
            if Selector::parse(selector).is_err() {
                return Err(ConfigError::Message(format!(
                    "Invalid CSS selector for extraction.{}: '{}'",
                    name, selector
                )));
            }
        }

        if self.notifications.smtp.port == 0 {
            return Err(ConfigError::Message("SMTP port must be greater than 0".into()));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(ConfigError::Message("Metrics port must be greater than 0".into()));
        }

        Ok(())
    }

    /// Search targets in configured order.
    pub fn search_targets(&self) -> crate::Result<Vec<SearchTarget>> {
        self.searches
            .iter()
            .map(|search| SearchTarget::new(&search.url, search.domains.clone()))
            .collect()
    }
}
