use super::*;
use listing_watcher::core::DateNormalizer;
use listing_watcher::models::{domain_code, Watermark};
use listing_watcher::storage::{WatermarkCache, WatermarkStore};
use listing_watcher::utils::error::MirrorErrorKind;

const COM: &str = "www.ebay.com";
const FR: &str = "www.ebay.fr";

#[tokio::test]
async fn test_cold_start_emits_whole_page_and_sets_baseline() {
    let fetcher = StaticFetcher::new();
    fetcher.serve(
        SEARCH,
        page(&[item(COM, 3, "Jun-26 10:00"), item(COM, 2, "Jun-26 09:00"), item(COM, 1, "Jun-26 08:00")]),
    );
    let aggregator = aggregator(&fetcher);
    let mut cache = WatermarkCache::new();

    let outcome = aggregator.process_cycle(&[target(&["com"])], &mut cache).await;

    assert!(outcome.errors.is_empty());
    let urls: Vec<&str> = outcome.listings.iter().map(|l| l.url.as_str()).collect();
    assert_eq!(urls, vec![listing_url(COM, 3), listing_url(COM, 2), listing_url(COM, 1)]);
    assert_eq!(outcome.listings[0].title, "Puma ball 3");
    assert_eq!(outcome.listings[0].identity, "3");

    let watermark = cache.get(SEARCH).unwrap();
    assert_eq!(watermark, &Watermark::new(listing_url(COM, 3), local(6, 26, 10, 0)));
}

#[tokio::test]
async fn test_unchanged_page_is_idempotent() {
    let fetcher = StaticFetcher::new();
    fetcher.serve(SEARCH, page(&[item(COM, 2, "Jun-26 10:00"), item(COM, 1, "Jun-26 09:00")]));
    let aggregator = aggregator(&fetcher);
    let targets = [target(&["com"])];
    let mut cache = WatermarkCache::new();

    let first = aggregator.process_cycle(&targets, &mut cache).await;
    assert_eq!(first.listings.len(), 2);
    let after_first = cache.clone();

    let second = aggregator.process_cycle(&targets, &mut cache).await;
    assert!(second.listings.is_empty());
    assert!(second.errors.is_empty());
    assert_eq!(cache, after_first);
}

#[tokio::test]
async fn test_traversal_stops_at_previous_watermark() {
    let fetcher = StaticFetcher::new();
    let older: Vec<String> = (1..=7)
        .rev()
        .map(|id| item(COM, id, &format!("Jun-26 {:02}:00", id + 2)))
        .collect();
    fetcher.serve(SEARCH, page(&older));
    let aggregator = aggregator(&fetcher);
    let targets = [target(&["com"])];
    let mut cache = WatermarkCache::new();
    aggregator.process_cycle(&targets, &mut cache).await;

    // Three new listings land above the seven already seen.
    let mut newer: Vec<String> = (8..=10)
        .rev()
        .map(|id| item(COM, id, &format!("Jun-26 {:02}:00", id + 2)))
        .collect();
    newer.extend(older);
    assert_eq!(newer.len(), 10);
    fetcher.serve(SEARCH, page(&newer));

    let outcome = aggregator.process_cycle(&targets, &mut cache).await;
    let ids: Vec<&str> = outcome.listings.iter().map(|l| l.identity.as_str()).collect();
    assert_eq!(ids, vec!["10", "9", "8"]);
    assert_eq!(cache.get(SEARCH).unwrap().last_url, listing_url(COM, 10));
}

#[tokio::test]
async fn test_grace_window_around_watermark() {
    let fetcher = StaticFetcher::new();
    fetcher.serve(SEARCH, page(&[item(COM, 1, "Jun-26 10:00")]));
    let aggregator = aggregator(&fetcher);
    let targets = [target(&["com"])];
    let mut cache = WatermarkCache::new();
    aggregator.process_cycle(&targets, &mut cache).await;

    // Published 30 minutes before the watermark but indexed late: still new.
    fetcher.serve(
        SEARCH,
        page(&[item(COM, 2, "Jun-26 09:30"), item(COM, 1, "Jun-26 10:00")]),
    );
    let outcome = aggregator.process_cycle(&targets, &mut cache).await;
    assert_eq!(outcome.listings.len(), 1);
    assert_eq!(outcome.listings[0].identity, "2");

    // 90 minutes before the watermark is outside the window.
    fetcher.serve(
        SEARCH,
        page(&[item(COM, 3, "Jun-26 08:30"), item(COM, 1, "Jun-26 10:00")]),
    );
    let outcome = aggregator.process_cycle(&targets, &mut cache).await;
    assert!(outcome.listings.is_empty());
}

#[tokio::test]
async fn test_watermark_never_moves_backwards() {
    let fetcher = StaticFetcher::new();
    fetcher.serve(SEARCH, page(&[item(COM, 1, "Jun-26 10:00")]));
    let aggregator = aggregator(&fetcher);
    let targets = [target(&["com"])];
    let mut cache = WatermarkCache::new();
    aggregator.process_cycle(&targets, &mut cache).await;

    fetcher.serve(
        SEARCH,
        page(&[item(COM, 2, "Jun-26 09:45"), item(COM, 1, "Jun-26 10:00")]),
    );
    let outcome = aggregator.process_cycle(&targets, &mut cache).await;

    assert_eq!(outcome.listings.len(), 1);
    let watermark = cache.get(SEARCH).unwrap();
    assert_eq!(watermark.last_url, listing_url(COM, 2));
    assert_eq!(watermark.last_date, local(6, 26, 10, 0));

    // The late listing is not reported again while the feed stays the same.
    for _ in 0..3 {
        let outcome = aggregator.process_cycle(&targets, &mut cache).await;
        assert!(outcome.listings.is_empty());
    }
    assert_eq!(cache.get(SEARCH).unwrap().last_date, local(6, 26, 10, 0));
}

#[tokio::test]
async fn test_same_listing_on_two_mirrors_is_emitted_once() {
    let fetcher = StaticFetcher::new();
    fetcher.serve(SEARCH, page(&[item(COM, 3, "Jun-26 10:00"), item(COM, 2, "Jun-26 09:00")]));
    fetcher.serve(
        SEARCH_FR,
        page(&[item(FR, 4, "26 juin 11:00"), item(FR, 3, "26 juin 10:00")]),
    );
    let aggregator = aggregator(&fetcher);
    let mut cache = WatermarkCache::new();

    let outcome = aggregator.process_cycle(&[target(&["com", "fr"])], &mut cache).await;

    let ids: Vec<&str> = outcome.listings.iter().map(|l| l.identity.as_str()).collect();
    assert_eq!(ids, vec!["3", "2", "4"]);
    assert_eq!(fetcher.requests(), vec![SEARCH.to_string(), SEARCH_FR.to_string()]);

    // Each mirror still tracks its own newest listing.
    assert_eq!(cache.get(SEARCH).unwrap().last_url, listing_url(COM, 3));
    assert_eq!(cache.get(SEARCH_FR).unwrap().last_url, listing_url(FR, 4));
}

#[tokio::test]
async fn test_fetch_failure_leaves_watermark_untouched() {
    let fetcher = StaticFetcher::new();
    fetcher.serve(SEARCH, page(&[item(COM, 1, "Jun-26 10:00")]));
    fetcher.serve(SEARCH_FR, page(&[item(FR, 5, "26 juin 10:00")]));
    let aggregator = aggregator(&fetcher);
    let targets = [target(&["com", "fr"])];
    let mut cache = WatermarkCache::new();
    aggregator.process_cycle(&targets, &mut cache).await;
    let com_before = cache.get(SEARCH).cloned();

    fetcher.remove(SEARCH);
    fetcher.serve(
        SEARCH_FR,
        page(&[item(FR, 6, "26 juin 12:00"), item(FR, 5, "26 juin 10:00")]),
    );
    let outcome = aggregator.process_cycle(&targets, &mut cache).await;

    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].mirror_url, SEARCH);
    assert_eq!(
        outcome.errors[0].kind,
        MirrorErrorKind::Fetch(FetchError::Status { status: 503 })
    );
    assert!(outcome.errors[0].requires_attention());

    assert_eq!(outcome.listings.len(), 1);
    assert_eq!(outcome.listings[0].identity, "6");
    assert_eq!(cache.get(SEARCH).cloned(), com_before);
    assert_eq!(cache.get(SEARCH_FR).unwrap().last_url, listing_url(FR, 6));
}

#[tokio::test]
async fn test_run_leaves_store_alone() {
    let fetcher = StaticFetcher::new();
    fetcher.serve(SEARCH, page(&[item(COM, 1, "Jun-26 10:00")]));
    let aggregator = aggregator(&fetcher);
    let cache = WatermarkCache::new();

    let outcome = aggregator.run(&target(&["com"]), &cache).await;

    assert_eq!(outcome.listings.len(), 1);
    assert_eq!(
        outcome.watermark_updates.get(SEARCH),
        Some(&Watermark::new(listing_url(COM, 1), local(6, 26, 10, 0)))
    );
    assert!(cache.is_empty());
}

#[test]
fn test_listing_dates_normalize_through_public_api() {
    let normalizer = DateNormalizer::new();
    let url = listing_url("www.ebay.co.uk", 9);
    let code = domain_code(&url).unwrap();
    assert_eq!(code, "co.uk");

    let date = normalizer.normalize("26-Jun 15:39", &code, YEAR).unwrap();
    assert_eq!(date, local(6, 26, 15, 39));
    assert!(normalizer.normalize("26-Jun", &code, YEAR).is_err());
    assert!(normalizer.normalize("26-Jun 15:39", "co.jp", YEAR).is_err());
}
