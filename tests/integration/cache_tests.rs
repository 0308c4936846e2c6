use super::*;
use listing_watcher::plugins::PluginManager;
use listing_watcher::scheduler::CycleRunner;
use listing_watcher::storage::{CacheBackend, JsonFileBackend, SqliteBackend, WatermarkStore};

const COM: &str = "www.ebay.com";

async fn runner(fetcher: &Arc<StaticFetcher>, backend: Box<dyn CacheBackend>) -> CycleRunner {
    CycleRunner::new(aggregator(fetcher), vec![target(&["com"])], backend, PluginManager::new())
        .await
        .unwrap()
}

fn serve_two(fetcher: &StaticFetcher) {
    fetcher.serve(SEARCH, page(&[item(COM, 2, "Jun-26 10:00"), item(COM, 1, "Jun-26 09:00")]));
}

#[tokio::test]
async fn test_json_cache_survives_restart() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("scraped.json");
    let fetcher = StaticFetcher::new();
    serve_two(&fetcher);

    let mut first = runner(&fetcher, Box::new(JsonFileBackend::new(&path))).await;
    let report = first.run_cycle().await;
    assert_eq!(report.listings.len(), 2);
    assert!(report.persisted);
    drop(first);

    let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(raw[SEARCH]["url"], listing_url(COM, 2));

    // A fresh process picks up where the previous one stopped.
    let mut second = runner(&fetcher, Box::new(JsonFileBackend::new(&path))).await;
    assert_eq!(second.watermarks().len(), 1);
    let report = second.run_cycle().await;
    assert!(report.listings.is_empty());

    fetcher.serve(
        SEARCH,
        page(&[item(COM, 3, "Jun-26 11:00"), item(COM, 2, "Jun-26 10:00")]),
    );
    let report = second.run_cycle().await;
    assert_eq!(report.listings.len(), 1);
    assert_eq!(report.listings[0].identity, "3");

    Ok(())
}

#[tokio::test]
async fn test_corrupt_json_cache_starts_cold() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("scraped.json");
    std::fs::write(&path, "{ not json")?;
    let fetcher = StaticFetcher::new();
    serve_two(&fetcher);

    let mut runner = runner(&fetcher, Box::new(JsonFileBackend::new(&path))).await;
    assert!(runner.watermarks().is_empty());
    assert_eq!(runner.run_cycle().await.listings.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_sqlite_cache_survives_restart() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let location = dir.path().join("watermarks.db").to_string_lossy().to_string();
    let fetcher = StaticFetcher::new();
    serve_two(&fetcher);

    let mut first = runner(&fetcher, Box::new(SqliteBackend::connect(&location).await?)).await;
    assert_eq!(first.run_cycle().await.listings.len(), 2);
    drop(first);

    let mut second = runner(&fetcher, Box::new(SqliteBackend::connect(&location).await?)).await;
    let watermark = second.watermarks().get(SEARCH).cloned().unwrap();
    assert_eq!(watermark.last_url, listing_url(COM, 2));
    assert_eq!(watermark.last_date, local(6, 26, 10, 0));
    assert!(second.run_cycle().await.listings.is_empty());

    Ok(())
}
