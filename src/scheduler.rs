use anyhow::Result;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::core::DomainAggregator;
use crate::models::{Listing, SearchTarget};
use crate::plugins::{render_listing, PluginManager};
use crate::storage::{CacheBackend, WatermarkCache};
use crate::utils::error::MirrorError;

/// What one cycle produced and what happened to it afterwards.
#[derive(Debug)]
pub struct CycleReport {
    pub listings: Vec<Listing>,
    pub errors: Vec<MirrorError>,
    pub persisted: bool,
    /// Listings at least one notifier accepted.
    pub notified: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleStats {
    pub runs: u64,
    pub successful_runs: u64,
    pub failed_runs: u64,
    pub listings_found: u64,
    pub notifications_sent: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub last_duration_ms: Option<u64>,
    pub last_error: Option<String>,
}

impl CycleStats {
    fn record(&mut self, report: &CycleReport) {
        self.runs += 1;
        self.listings_found += report.listings.len() as u64;
        self.notifications_sent += report.notified as u64;
        self.last_run = Some(Utc::now());
        self.last_duration_ms = Some(report.duration_ms);

        let failure = if !report.persisted {
            Some("watermark cache could not be persisted".to_string())
        } else {
            report
                .errors
                .iter()
                .find(|e| e.requires_attention())
                .map(|e| e.to_string())
        };

        match failure {
            Some(error) => {
                self.failed_runs += 1;
                self.last_error = Some(error);
            }
            None => {
                self.successful_runs += 1;
                self.last_error = None;
            }
        }
    }
}

/// One cycle end to end: aggregate, commit watermarks, persist, notify.
pub struct CycleRunner {
    aggregator: DomainAggregator,
    targets: Vec<SearchTarget>,
    cache: WatermarkCache,
    backend: Box<dyn CacheBackend>,
    plugins: PluginManager,
    stats: CycleStats,
}

impl CycleRunner {
    /// Loads the persisted watermarks once; they stay in memory afterwards.
    pub async fn new(
        aggregator: DomainAggregator,
        targets: Vec<SearchTarget>,
        backend: Box<dyn CacheBackend>,
        plugins: PluginManager,
    ) -> Result<Self> {
        let cache = backend.load().await?;
        tracing::info!(
            "Loaded {} watermark(s) from {}",
            cache.len(),
            backend.describe()
        );

        Ok(Self {
            aggregator,
            targets,
            cache,
            backend,
            plugins,
            stats: CycleStats::default(),
        })
    }

    /// Persists before notifying: a crash in between drops notifications
    /// instead of repeating them on restart.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let start_time = tokio::time::Instant::now();
        let outcome = self.aggregator.process_cycle(&self.targets, &mut self.cache).await;

        let persisted = match self.backend.persist(&self.cache).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to persist watermarks to {}: {}", self.backend.describe(), e);
                false
            }
        };

        let mut notified = 0;
        for listing in &outcome.listings {
            tracing::info!(identity = %listing.identity, url = %listing.url, "new listing: {}", listing.title);
            let reports = self.plugins.broadcast(&render_listing(listing)).await;
            if reports.iter().any(|r| r.result.success) {
                notified += 1;
            }
        }

        let report = CycleReport {
            listings: outcome.listings,
            errors: outcome.errors,
            persisted,
            notified,
            duration_ms: start_time.elapsed().as_millis() as u64,
        };
        self.stats.record(&report);
        report
    }

    /// Runs a cycle against a copy of the watermarks. Nothing is persisted or
    /// sent and the in-memory watermarks are left as they were.
    pub async fn preview(&self) -> Vec<Listing> {
        let mut scratch = self.cache.clone();
        self.aggregator.process_cycle(&self.targets, &mut scratch).await.listings
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    pub fn watermarks(&self) -> &WatermarkCache {
        &self.cache
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.plugins.shutdown().await?;
        Ok(())
    }
}

/// Runs the cycle on a fixed interval. Ticks never overlap: a tick that finds
/// the previous cycle still running is skipped.
pub struct WatchScheduler {
    scheduler: JobScheduler,
    runner: Arc<Mutex<CycleRunner>>,
    config: SchedulerConfig,
    job_id: Option<Uuid>,
}

impl WatchScheduler {
    pub async fn new(runner: CycleRunner, config: SchedulerConfig) -> Result<Self> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler,
            runner: Arc::new(Mutex::new(runner)),
            config,
            job_id: None,
        })
    }

    pub async fn start(&mut self) -> Result<()> {
        let runner = Arc::clone(&self.runner);
        let job = Job::new_repeated_async(Duration::from_secs(self.config.interval_secs), move |_uuid, _l| {
            let runner = Arc::clone(&runner);
            Box::pin(async move {
                Self::tick(runner).await;
            })
        })?;

        self.job_id = Some(self.scheduler.add(job).await?);
        self.scheduler.start().await?;
        tracing::info!("Watch scheduler started, interval {}s", self.config.interval_secs);

        if self.config.run_on_start {
            tokio::spawn(Self::tick(Arc::clone(&self.runner)));
        }
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        if let Some(job_id) = self.job_id.take() {
            self.scheduler.remove(&job_id).await?;
        }
        self.scheduler.shutdown().await?;
        // Waits for an in-flight cycle, including its cache write.
        let runner = self.runner.lock().await;
        runner.shutdown().await?;
        tracing::info!("Watch scheduler shutdown");
        Ok(())
    }

    /// Runs one cycle now, waiting for any in-flight cycle to finish first.
    pub async fn run_once(&self) -> CycleReport {
        let mut runner = self.runner.lock().await;
        runner.run_cycle().await
    }

    pub async fn stats(&self) -> CycleStats {
        self.runner.lock().await.stats().clone()
    }

    pub fn is_running(&self) -> bool {
        self.runner.try_lock().is_err()
    }

    async fn tick(runner: Arc<Mutex<CycleRunner>>) -> Option<CycleReport> {
        let Ok(mut runner) = runner.try_lock() else {
            counter!("watcher_ticks_skipped_total").increment(1);
            tracing::warn!("Previous cycle still running, skipping this tick");
            return None;
        };

        let report = runner.run_cycle().await;
        if report.errors.is_empty() {
            tracing::info!(
                "Cycle done in {}ms: {} new listing(s), {} notified",
                report.duration_ms,
                report.listings.len(),
                report.notified
            );
        } else {
            tracing::warn!(
                "Cycle done in {}ms with {} mirror error(s): {} new listing(s), {} notified",
                report.duration_ms,
                report.errors.len(),
                report.listings.len(),
                report.notified
            );
        }
        Some(report)
    }
}
