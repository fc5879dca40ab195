//! Crawler module for fetching and mirroring a site
//!
//! This module contains the core mirroring logic, including:
//! - HTTP fetching and response classification
//! - The frontier of pending URLs with de-duplication and retries
//! - The per-URL fetch, rewrite and write pipeline
//! - Overall coordination of the worker pool

mod coordinator;
mod fetcher;
mod frontier;
mod processor;

pub use coordinator::{Coordinator, MirrorSummary};
pub use fetcher::{
    build_http_client, fetch_url, parse_content_type, parse_http_date, FetchResult,
    RemoteResource,
};
pub use frontier::{CrawlTask, Frontier, RetryDecision};
pub use processor::{PageOutcome, PageProcessor};

use crate::config::Config;
use crate::Result;

/// Mirrors a complete site
///
/// This is the main entry point for a mirror run. It will:
/// 1. Validate the configuration and the root URL
/// 2. Create the site directory under the destination root
/// 3. Fetch, rewrite and write every reachable in-scope resource
/// 4. Stop early on Ctrl-C, finishing the fetches in flight
///
/// # Arguments
///
/// * `config` - The mirror configuration
/// * `root_url` - The site root
///
/// # Returns
///
/// * `Ok(MirrorSummary)` - The run finished or was interrupted
/// * `Err(MirrorError)` - The run could not start
pub async fn mirror(config: Config, root_url: &str) -> Result<MirrorSummary> {
    let coordinator = Coordinator::new(config, root_url)?;
    Ok(coordinator.run().await)
}
