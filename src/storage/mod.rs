//! Watermark persistence. The core only sees [`WatermarkStore`]; backends load
//! and persist the whole mapping between cycles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::config::{CacheBackendKind, CacheConfig};
use crate::models::Watermark;
use crate::utils::error::AppError;

pub mod json;
pub mod sqlite;

pub use json::JsonFileBackend;
pub use sqlite::SqliteBackend;

pub trait WatermarkStore {
    fn get(&self, mirror_url: &str) -> Option<&Watermark>;

    /// Applies one cycle's updates. Mirrors without an update keep their watermark.
    fn set_all(&mut self, updates: HashMap<String, Watermark>);
}

/// In-memory watermarks keyed by mirror URL. Serializes to the
/// `mirrorURL -> {url, date}` mapping of the cache file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WatermarkCache {
    entries: BTreeMap<String, Watermark>,
}

impl WatermarkCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Watermark)> {
        self.entries.iter()
    }
}

impl FromIterator<(String, Watermark)> for WatermarkCache {
    fn from_iter<I: IntoIterator<Item = (String, Watermark)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl WatermarkStore for WatermarkCache {
    fn get(&self, mirror_url: &str) -> Option<&Watermark> {
        self.entries.get(mirror_url)
    }

    fn set_all(&mut self, updates: HashMap<String, Watermark>) {
        self.entries.extend(updates);
    }
}

#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn load(&self) -> Result<WatermarkCache, AppError>;
    /// Overwrites everything previously persisted.
    async fn persist(&self, cache: &WatermarkCache) -> Result<(), AppError>;
    fn describe(&self) -> String;
}

pub async fn open_backend(config: &CacheConfig) -> Result<Box<dyn CacheBackend>, AppError> {
    let backend: Box<dyn CacheBackend> = match config.backend {
        CacheBackendKind::Json => Box::new(JsonFileBackend::new(&config.path)),
        CacheBackendKind::Sqlite => Box::new(SqliteBackend::connect(&config.path).await?),
    };
    tracing::info!("Using watermark cache {}", backend.describe());
    Ok(backend)
}
