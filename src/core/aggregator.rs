//! Runs search targets across their mirrors, one fetch at a time, and folds the
//! per-mirror results into one deduplicated listing sequence plus the
//! watermark updates to commit at the end of the cycle.

use chrono::{Datelike, Local};
use metrics::counter;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

use super::differ::{Decision, MirrorDiff};
use super::extractor::{Extracted, ListingExtractor};
use super::locale;
use crate::models::{Listing, Mirror, SearchTarget, Watermark};
use crate::scraper::{Document, PageFetcher};
use crate::storage::WatermarkStore;
use crate::utils::error::{MirrorError, MirrorErrorKind};

/// Result of running one search target.
#[derive(Debug, Default)]
pub struct TargetOutcome {
    /// New listings in feed order, cross-mirror duplicates removed.
    pub listings: Vec<Listing>,
    /// Keyed by mirror URL. Failed mirrors have no entry.
    pub watermark_updates: HashMap<String, Watermark>,
    pub errors: Vec<MirrorError>,
}

/// Result of a whole cycle. Watermarks have already been handed to the store.
#[derive(Debug, Default)]
pub struct CycleOutcome {
    pub listings: Vec<Listing>,
    pub errors: Vec<MirrorError>,
}

#[derive(Debug, Default)]
struct MirrorTraversal {
    emitted: Vec<Listing>,
    update: Option<Watermark>,
    skipped: usize,
}

// State shared by every mirror of every target within one cycle.
struct CycleState {
    seen: HashSet<String>,
    fetches: usize,
    reference_year: i32,
}

impl CycleState {
    fn new(reference_year: i32) -> Self {
        Self {
            seen: HashSet::new(),
            fetches: 0,
            reference_year,
        }
    }
}

pub struct DomainAggregator {
    fetcher: Arc<dyn PageFetcher>,
    extractor: ListingExtractor,
    mirror_delay: Duration,
    reference_year: Option<i32>,
}

impl DomainAggregator {
    pub fn new(fetcher: Arc<dyn PageFetcher>, extractor: ListingExtractor, mirror_delay: Duration) -> Self {
        Self {
            fetcher,
            extractor,
            mirror_delay,
            reference_year: None,
        }
    }

    /// Pins the year used to complete date fragments. Defaults to the current
    /// local year, read once per cycle.
    pub fn with_reference_year(mut self, year: i32) -> Self {
        self.reference_year = Some(year);
        self
    }

    /// Runs every target in order and commits all watermark updates to `store`
    /// in a single call once the last mirror is done.
    pub async fn process_cycle<S>(&self, targets: &[SearchTarget], store: &mut S) -> CycleOutcome
    where
        S: WatermarkStore + Send + Sync + ?Sized,
    {
        let span = tracing::info_span!("cycle", id = %Uuid::new_v4());
        async move {
            let mut state = CycleState::new(self.current_year());
            let mut outcome = CycleOutcome::default();
            let mut updates = HashMap::new();

            for target in targets {
                let result = self.run_target(target, &*store, &mut state).await;
                outcome.listings.extend(result.listings);
                outcome.errors.extend(result.errors);
                updates.extend(result.watermark_updates);
            }

            let committed = updates.len();
            store.set_all(updates);

            counter!("watcher_cycles_total").increment(1);
            tracing::info!(
                targets = targets.len(),
                fetches = state.fetches,
                new_listings = outcome.listings.len(),
                errors = outcome.errors.len(),
                watermarks = committed,
                "cycle finished"
            );
            outcome
        }
        .instrument(span)
        .await
    }

    /// Runs a single target on its own. Nothing is written to `store`.
    pub async fn run<S>(&self, target: &SearchTarget, store: &S) -> TargetOutcome
    where
        S: WatermarkStore + Sync + ?Sized,
    {
        let mut state = CycleState::new(self.current_year());
        self.run_target(target, store, &mut state).await
    }

    fn current_year(&self) -> i32 {
        self.reference_year.unwrap_or_else(|| Local::now().year())
    }

    async fn run_target<S>(&self, target: &SearchTarget, store: &S, state: &mut CycleState) -> TargetOutcome
    where
        S: WatermarkStore + Sync + ?Sized,
    {
        let mut outcome = TargetOutcome::default();

        for mirror in target.mirrors() {
            let mirror = match mirror {
                Ok(mirror) => mirror,
                Err(err) => {
                    record_error(&mut outcome, err);
                    continue;
                }
            };

            match self.run_mirror(target, &mirror, store.get(&mirror.url), state).await {
                Ok(traversal) => {
                    if let Some(update) = traversal.update {
                        outcome.watermark_updates.insert(mirror.url.clone(), update);
                    }
                    outcome.listings.extend(traversal.emitted);
                }
                Err(kind) => record_error(&mut outcome, MirrorError::new(target.name(), &mirror.url, kind)),
            }
        }

        outcome
    }

    async fn run_mirror(
        &self,
        target: &SearchTarget,
        mirror: &Mirror,
        prior: Option<&Watermark>,
        state: &mut CycleState,
    ) -> Result<MirrorTraversal, MirrorErrorKind> {
        // An unknown locale would fail on every listing, so skip the request entirely.
        locale::resolve(&mirror.domain_code)
            .map_err(|_| MirrorErrorKind::UnsupportedLocale(mirror.domain_code.clone()))?;

        self.pace(state).await;
        let document = self
            .fetcher
            .fetch(&mirror.url)
            .await
            .map_err(MirrorErrorKind::Fetch)?;
        if document.is_empty() {
            return Err(MirrorErrorKind::EmptyDocument);
        }

        let traversal = self.traverse(&document, mirror, prior, state)?;
        tracing::debug!(
            search = target.name(),
            mirror = %mirror.url,
            emitted = traversal.emitted.len(),
            skipped = traversal.skipped,
            advanced = traversal.update.is_some(),
            "mirror traversed"
        );
        Ok(traversal)
    }

    async fn pace(&self, state: &mut CycleState) {
        if state.fetches > 0 && !self.mirror_delay.is_zero() {
            tokio::time::sleep(self.mirror_delay).await;
        }
        state.fetches += 1;
    }

    // Synchronous so the parsed DOM never lives across an await.
    fn traverse(
        &self,
        document: &Document,
        mirror: &Mirror,
        prior: Option<&Watermark>,
        state: &mut CycleState,
    ) -> Result<MirrorTraversal, MirrorErrorKind> {
        let html = document.html();
        let mut diff = MirrorDiff::new(prior);
        let mut traversal = MirrorTraversal::default();
        let mut items = 0usize;

        for item in self.extractor.items(&html) {
            items += 1;

            let listing = match self.extractor.extract(item, mirror, state.reference_year) {
                Ok(Extracted::Listing(listing)) => listing,
                Ok(Extracted::Skip(reason)) => {
                    tracing::debug!(mirror = %mirror.url, ?reason, "skipping item");
                    traversal.skipped += 1;
                    continue;
                }
                Err(err) if diff.is_boundary(&err.listing_url) => {
                    diff.stop();
                    break;
                }
                Err(err) => {
                    tracing::warn!(listing = %err.listing_url, "skipping listing: {}", err);
                    traversal.skipped += 1;
                    continue;
                }
            };

            if diff.observe(&listing) == Decision::Stop {
                break;
            }

            if state.seen.insert(listing.identity.clone()) {
                traversal.emitted.push(listing);
            } else {
                counter!("watcher_listings_duplicate_total").increment(1);
            }
        }

        if items == 0 {
            return Err(MirrorErrorKind::NoItemsFound);
        }

        counter!("watcher_listings_new_total").increment(traversal.emitted.len() as u64);
        counter!("watcher_listings_skipped_total").increment(traversal.skipped as u64);

        traversal.update = diff.into_update();
        Ok(traversal)
    }
}

fn record_error(outcome: &mut TargetOutcome, err: MirrorError) {
    counter!("watcher_mirror_errors_total", "kind" => err.kind.label()).increment(1);
    if err.requires_attention() {
        tracing::warn!("mirror skipped: {}", err);
    } else {
        tracing::info!("mirror returned nothing: {}", err);
    }
    outcome.errors.push(err);
}
