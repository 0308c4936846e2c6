use serde::{Deserialize, Serialize};

use super::Timestamp;

/// One scraped search result. Built fresh every cycle and never persisted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    /// Trailing path segment of the canonical URL (the item number).
    pub identity: String,
    /// Canonical URL with tracking suffixes removed.
    pub url: String,
    pub title: String,
    pub subtitle: String,
    pub price: String,
    pub published_at: Timestamp,
}
