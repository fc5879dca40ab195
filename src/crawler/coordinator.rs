//! Mirror coordinator - main orchestration logic
//!
//! This module contains the main loop that coordinates all aspects of
//! the mirroring process, including:
//! - Validating the configuration and preparing the site directory
//! - Owning the frontier and dispatching URLs to a bounded worker pool
//! - Feeding worker outcomes back into the frontier
//! - Handling interrupts
//! - Collecting run statistics

use crate::config::{validate, Config};
use crate::crawler::build_http_client;
use crate::crawler::frontier::{Frontier, RetryDecision};
use crate::crawler::processor::{PageOutcome, PageProcessor};
use crate::output::{ContentWriter, MirrorStats};
use crate::url::SiteScope;
use crate::Result;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::{Id, JoinError, JoinSet};
use url::Url;

/// URLs being processed, keyed by the worker task handling them
type InFlight = HashMap<Id, Url>;

/// Completed URLs between progress log lines
const PROGRESS_INTERVAL: usize = 10;

/// What a finished run leaves behind
#[derive(Debug, Clone)]
pub struct MirrorSummary {
    /// Directory the site was mirrored into
    pub site_root: PathBuf,

    /// Run statistics
    pub stats: MirrorStats,
}

/// Main mirror coordinator structure
///
/// The coordinator is the only owner of the frontier. Workers run the
/// per-URL pipeline and return a `PageOutcome`; all queue, seen-set and
/// retry bookkeeping happens here, one outcome at a time.
pub struct Coordinator {
    config: Config,
    frontier: Frontier,
    processor: Arc<PageProcessor>,
    site_root: PathBuf,
    stats: MirrorStats,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The mirror configuration
    /// * `root_url` - The site root; everything below it is mirrored
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run, with the root URL queued
    /// * `Err(MirrorError)` - Invalid configuration or root URL, HTTP client
    ///   failure, or a site directory that cannot be created
    pub fn new(config: Config, root_url: &str) -> Result<Self> {
        validate(&config)?;

        let scope = SiteScope::new(root_url)?;
        let writer = Arc::new(ContentWriter::new(
            &config.mirror.destination_root,
            &scope,
        )?);
        let site_root = writer.site_root().to_path_buf();

        let client = build_http_client(&config, &scope)?;
        let processor = Arc::new(PageProcessor::new(client, scope.clone(), writer)?);

        let mut frontier = Frontier::new(scope, config.mirror.max_retries);
        frontier.seed();

        Ok(Self {
            config,
            frontier,
            processor,
            site_root,
            stats: MirrorStats::default(),
        })
    }

    /// Returns the directory the site is mirrored into
    pub fn site_root(&self) -> &Path {
        &self.site_root
    }

    /// Runs until the frontier drains or Ctrl-C is pressed
    pub async fn run(self) -> MirrorSummary {
        self.run_until(shutdown_signal()).await
    }

    /// Runs until the frontier drains or `shutdown` completes
    ///
    /// After shutdown no new URL is dispatched; fetches already in flight
    /// are finished and recorded. URLs still queued are reported in the
    /// summary.
    pub async fn run_until<F>(mut self, shutdown: F) -> MirrorSummary
    where
        F: Future<Output = ()>,
    {
        let start_time = Instant::now();
        let limit = self.config.mirror.max_concurrent_fetches.max(1) as usize;
        let mut workers: JoinSet<PageOutcome> = JoinSet::new();
        let mut in_flight = InFlight::new();
        let mut completed = 0usize;
        let mut stopping = false;
        tokio::pin!(shutdown);

        tracing::info!(
            "Mirroring into {} with up to {} concurrent fetches",
            self.site_root.display(),
            limit
        );

        loop {
            if !stopping {
                while workers.len() < limit {
                    let Some(task) = self.frontier.dequeue() else {
                        break;
                    };
                    tracing::debug!("Fetching {} (attempt {})", task.url, task.attempts + 1);
                    let processor = Arc::clone(&self.processor);
                    let url = task.url.clone();
                    let handle = workers.spawn(async move { processor.process(task).await });
                    in_flight.insert(handle.id(), url);
                }
            }

            if workers.is_empty() && (stopping || self.frontier.is_done()) {
                break;
            }

            tokio::select! {
                joined = workers.join_next_with_id() => match joined {
                    Some(joined) => {
                        self.handle_joined(joined, &mut in_flight);
                        completed += 1;

                        if completed % PROGRESS_INTERVAL == 0 {
                            let rate = completed as f64 / start_time.elapsed().as_secs_f64();
                            tracing::info!(
                                "Progress: {} URLs done, {} queued, {} in flight, {:.2} pages/sec",
                                completed,
                                self.frontier.pending_len(),
                                workers.len(),
                                rate
                            );
                        }
                    }
                    None => break,
                },
                _ = &mut shutdown, if !stopping => {
                    tracing::warn!(
                        "Shutdown requested, waiting for {} in-flight fetches",
                        workers.len()
                    );
                    stopping = true;
                }
            }
        }

        self.stats.pages_by_state = self.frontier.state_counts();
        self.stats.pending = self.frontier.pending_urls();
        self.stats.elapsed = start_time.elapsed();

        if self.stats.interrupted() {
            tracing::warn!(
                "Stopped with {} URLs still queued",
                self.stats.pending.len()
            );
        }
        tracing::info!(
            "Mirror finished: {} files ({} bytes) in {:?}",
            self.stats.files_written,
            self.stats.bytes_written,
            self.stats.elapsed
        );

        MirrorSummary {
            site_root: self.site_root,
            stats: self.stats,
        }
    }

    /// Applies a joined worker to the frontier
    ///
    /// A worker that panicked or was cancelled leaves no outcome; its URL is
    /// recorded as failed so it does not stay in `Fetching`.
    fn handle_joined(
        &mut self,
        joined: std::result::Result<(Id, PageOutcome), JoinError>,
        in_flight: &mut InFlight,
    ) {
        match joined {
            Ok((id, outcome)) => {
                in_flight.remove(&id);
                self.handle_outcome(outcome);
            }
            Err(e) => match in_flight.remove(&e.id()) {
                Some(url) => {
                    tracing::error!("Worker for {} failed: {}", url, e);
                    self.frontier.record_failed(&url);
                }
                None => tracing::error!("Worker task failed: {}", e),
            },
        }
    }

    /// Applies one worker outcome to the frontier and the statistics
    fn handle_outcome(&mut self, outcome: PageOutcome) {
        match outcome {
            PageOutcome::Saved {
                url,
                path,
                links,
                bytes,
            } => {
                tracing::debug!("Saved {} to {}", url, path.display());
                self.stats.record_write(bytes);
                self.stats.links_discovered += links.len() as u64;

                let mut accepted = 0;
                for link in links {
                    if self.frontier.enqueue(link) {
                        accepted += 1;
                    }
                }
                if accepted > 0 {
                    tracing::debug!("Queued {} new URLs from {}", accepted, url);
                }

                self.frontier.record_success(&url);
            }

            PageOutcome::Skipped { url, reason } => {
                tracing::debug!("Skipped {}: {}", url, reason);
                self.frontier.record_skipped(&url);
            }

            PageOutcome::Retry { url, error } => match self.frontier.record_failure(&url) {
                RetryDecision::Retry { attempt } => {
                    tracing::warn!(
                        "Fetch of {} failed ({}), retry {}/{}",
                        url,
                        error,
                        attempt,
                        self.config.mirror.max_retries
                    );
                }
                RetryDecision::Abandoned { attempts } => {
                    tracing::error!(
                        "Abandoning {} after {} failed attempts: {}",
                        url,
                        attempts,
                        error
                    );
                }
            },

            PageOutcome::Failed { url, error } => {
                tracing::error!("Failed to mirror {}: {}", url, error);
                self.frontier.record_failed(&url);
            }
        }
    }
}

/// Completes on Ctrl-C; never completes if the signal cannot be watched
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Unable to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
