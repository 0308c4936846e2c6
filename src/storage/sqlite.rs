use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::str::FromStr;

use super::{CacheBackend, WatermarkCache};
use crate::models::{Timestamp, Watermark};
use crate::utils::error::AppError;

/// Watermarks in a SQLite table, one row per mirror URL.
pub struct SqliteBackend {
    pool: SqlitePool,
    url: String,
}

#[derive(Debug, FromRow)]
struct WatermarkRow {
    mirror_url: String,
    url: String,
    date: Timestamp,
}

impl SqliteBackend {
    /// Accepts either a `sqlite:` URL or a plain file path.
    pub async fn connect(location: &str) -> Result<Self, AppError> {
        let url = if location.starts_with("sqlite:") {
            location.to_string()
        } else {
            format!("sqlite://{}", location)
        };

        let options = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);
        // A single long-lived connection keeps `sqlite::memory:` databases alive.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let backend = Self { pool, url };
        backend.run_migrations().await?;
        Ok(backend)
    }

    async fn run_migrations(&self) -> Result<(), AppError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS watermarks (
                mirror_url TEXT PRIMARY KEY,
                url TEXT NOT NULL,
                date TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for SqliteBackend {
    async fn load(&self) -> Result<WatermarkCache, AppError> {
        let rows: Vec<WatermarkRow> = sqlx::query_as("SELECT mirror_url, url, date FROM watermarks")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.mirror_url, Watermark::new(row.url, row.date)))
            .collect())
    }

    async fn persist(&self, cache: &WatermarkCache) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM watermarks").execute(&mut *tx).await?;
        for (mirror_url, watermark) in cache.iter() {
            sqlx::query("INSERT INTO watermarks (mirror_url, url, date) VALUES (?, ?, ?)")
                .bind(mirror_url)
                .bind(&watermark.last_url)
                .bind(watermark.last_date)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::WatermarkStore;
    use chrono::{TimeZone, Utc};

    fn cache_with(entries: &[(&str, &str)]) -> WatermarkCache {
        let date = Utc.with_ymd_and_hms(2024, 11, 17, 4, 9, 0).unwrap();
        entries
            .iter()
            .map(|(mirror, url)| (mirror.to_string(), Watermark::new(*url, date)))
            .collect()
    }

    #[tokio::test]
    async fn test_in_memory_persist_then_load() {
        let backend = SqliteBackend::connect("sqlite::memory:").await.unwrap();
        assert!(backend.load().await.unwrap().is_empty());

        let cache = cache_with(&[
            ("https://www.ebay.de/sch?q=rad", "https://www.ebay.de/itm/11"),
            ("https://www.ebay.at/sch?q=rad", "https://www.ebay.at/itm/12"),
        ]);
        backend.persist(&cache).await.unwrap();

        let loaded = backend.load().await.unwrap();
        assert_eq!(loaded, cache);
        assert_eq!(
            loaded.get("https://www.ebay.de/sch?q=rad").unwrap().last_date,
            Utc.with_ymd_and_hms(2024, 11, 17, 4, 9, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_persist_replaces_all_rows() {
        let backend = SqliteBackend::connect("sqlite::memory:").await.unwrap();
        backend
            .persist(&cache_with(&[("a", "https://www.ebay.de/itm/1"), ("b", "https://www.ebay.de/itm/2")]))
            .await
            .unwrap();
        backend
            .persist(&cache_with(&[("b", "https://www.ebay.de/itm/3")]))
            .await
            .unwrap();

        let loaded = backend.load().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get("b").unwrap().last_url, "https://www.ebay.de/itm/3");
    }

    #[tokio::test]
    async fn test_file_database_survives_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watermarks.db");
        let location = path.to_string_lossy().to_string();

        {
            let backend = SqliteBackend::connect(&location).await.unwrap();
            backend
                .persist(&cache_with(&[("a", "https://www.ebay.nl/itm/5")]))
                .await
                .unwrap();
        }

        let backend = SqliteBackend::connect(&location).await.unwrap();
        assert_eq!(backend.load().await.unwrap().len(), 1);
        assert!(backend.describe().contains("watermarks.db"));
    }
}
