use serde::{Deserialize, Serialize};

use super::{Listing, Timestamp};

/// Most recently seen listing for one mirror URL at the end of a cycle.
///
/// Serialized as `{"url": ..., "date": ...}`, the layout of the cache file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    #[serde(rename = "url")]
    pub last_url: String,
    #[serde(rename = "date")]
    pub last_date: Timestamp,
}

impl Watermark {
    pub fn new(last_url: impl Into<String>, last_date: Timestamp) -> Self {
        Self {
            last_url: last_url.into(),
            last_date,
        }
    }

    pub fn from_listing(listing: &Listing) -> Self {
        Self::new(listing.url.clone(), listing.published_at)
    }
}
