use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plugin error: {plugin_type}: {message}")]
    Plugin { plugin_type: String, message: String },

    #[error("Plugin error: {0}")]
    PluginError(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(format!("{}", err))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Failures of the date normalizer. Both carry enough to reproduce the problem.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DateError {
    #[error("malformed date '{fragment}': {reason}")]
    MalformedDate { fragment: String, reason: String },

    #[error("unsupported locale domain '{domain}'")]
    UnsupportedLocale { domain: String },
}

impl DateError {
    pub fn malformed(fragment: &str, reason: impl Into<String>) -> Self {
        DateError::MalformedDate {
            fragment: fragment.to_string(),
            reason: reason.into(),
        }
    }
}

/// A listing that could not be extracted. Always names the mirror it came from.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{mirror_url}: {source}")]
pub struct ExtractError {
    pub mirror_url: String,
    pub listing_url: String,
    #[source]
    pub source: DateError,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("unexpected status {status}")]
    Status { status: u16 },
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => FetchError::Status {
                status: status.as_u16(),
            },
            None => FetchError::Request(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorErrorKind {
    Fetch(FetchError),
    UnsupportedLocale(String),
    InvalidMirrorUrl(String),
    EmptyDocument,
    NoItemsFound,
}

impl MirrorErrorKind {
    /// Stable label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            MirrorErrorKind::Fetch(_) => "fetch",
            MirrorErrorKind::UnsupportedLocale(_) => "unsupported_locale",
            MirrorErrorKind::InvalidMirrorUrl(_) => "invalid_mirror_url",
            MirrorErrorKind::EmptyDocument => "empty_document",
            MirrorErrorKind::NoItemsFound => "no_items_found",
        }
    }
}

impl std::fmt::Display for MirrorErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MirrorErrorKind::Fetch(e) => write!(f, "fetch failed: {}", e),
            MirrorErrorKind::UnsupportedLocale(domain) => {
                write!(f, "unsupported locale domain '{}'", domain)
            }
            MirrorErrorKind::InvalidMirrorUrl(reason) => write!(f, "invalid mirror URL: {}", reason),
            MirrorErrorKind::EmptyDocument => write!(f, "empty document"),
            MirrorErrorKind::NoItemsFound => write!(f, "no items found"),
        }
    }
}

/// A mirror that was skipped for this cycle. Its watermark is left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{mirror_url} ({target}): {kind}")]
pub struct MirrorError {
    pub target: String,
    pub mirror_url: String,
    pub kind: MirrorErrorKind,
}

impl MirrorError {
    pub fn new(target: &str, mirror_url: &str, kind: MirrorErrorKind) -> Self {
        Self {
            target: target.to_string(),
            mirror_url: mirror_url.to_string(),
            kind,
        }
    }

    /// Zero-result pages are expected from time to time and are not worth alerting on.
    pub fn requires_attention(&self) -> bool {
        !matches!(
            self.kind,
            MirrorErrorKind::EmptyDocument | MirrorErrorKind::NoItemsFound
        )
    }
}
