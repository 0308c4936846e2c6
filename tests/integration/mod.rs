// Integration tests for Listing Watcher
// These tests drive whole cycles through the public API against canned pages.

pub mod cache_tests;
pub mod cycle_tests;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use listing_watcher::config::ExtractionConfig;
use listing_watcher::core::{DomainAggregator, ListingExtractor};
use listing_watcher::models::SearchTarget;
use listing_watcher::scraper::{Document, PageFetcher};
use listing_watcher::utils::error::FetchError;

pub const YEAR: i32 = 2024;
pub const SEARCH: &str = "https://www.ebay.com/sch/i.html?_nkw=soccer+ball+puma&_sop=10";
pub const SEARCH_FR: &str = "https://www.ebay.fr/sch/i.html?_nkw=soccer+ball+puma&_sop=10";

/// Serves pages from memory. Pages can be swapped between cycles; unknown
/// URLs answer 503.
#[derive(Default)]
pub struct StaticFetcher {
    pages: Mutex<HashMap<String, String>>,
    requests: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn serve(&self, url: &str, body: String) {
        self.pages.lock().unwrap().insert(url.to_string(), body);
    }

    pub fn remove(&self, url: &str) {
        self.pages.lock().unwrap().remove(url);
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Document, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());
        let pages = self.pages.lock().unwrap();
        match pages.get(url) {
            Some(body) => Ok(Document::new(url, body.clone())),
            None => Err(FetchError::Status { status: 503 }),
        }
    }
}

/// One search result card as the marketplace renders it.
pub fn item(host: &str, id: u64, date: &str) -> String {
    format!(
        r#"<div class="s-item__info">
            <a class="s-item__link" href="https://{host}/itm/{id}?hash=item{id}&amdata=enc%3AAQAF">
                <h3 class="s-item__title"><span>New listing</span>Puma ball {id}</h3>
            </a>
            <div class="s-item__subtitle">Pre-owned</div>
            <div class="s-item__details">
                <span class="s-item__price">$10.00</span>
                <span class="s-item__listingDate">{date}</span>
            </div>
        </div>"#
    )
}

pub fn page(items: &[String]) -> String {
    format!(
        "<html><body><ul class=\"srp-results\">{}</ul></body></html>",
        items.join("\n")
    )
}

/// Canonical listing URL produced for `item(host, id, _)`.
pub fn listing_url(host: &str, id: u64) -> String {
    format!("https://{}/itm/{}?hash=item{}", host, id, id)
}

pub fn aggregator(fetcher: &Arc<StaticFetcher>) -> DomainAggregator {
    let extractor = ListingExtractor::new(&ExtractionConfig::default()).unwrap();
    let fetcher: Arc<dyn PageFetcher> = fetcher.clone();
    DomainAggregator::new(fetcher, extractor, Duration::ZERO).with_reference_year(YEAR)
}

pub fn target(domains: &[&str]) -> SearchTarget {
    SearchTarget::new(SEARCH, domains.iter().map(|d| d.to_string()).collect()).unwrap()
}

/// A wall-clock time in the reference year, as the host timezone reads it.
pub fn local(month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Local
        .with_ymd_and_hms(YEAR, month, day, hour, minute, 0)
        .earliest()
        .unwrap()
        .with_timezone(&Utc)
}
