//! Frontier of URLs waiting to be mirrored
//!
//! This module handles:
//! - FIFO ordering of pending URLs
//! - Scope filtering and de-duplication against every URL ever accepted
//! - Retry bookkeeping for transport failures
//! - The lifecycle state of every accepted URL

use crate::state::PageState;
use crate::url::SiteScope;
use std::collections::{HashMap, VecDeque};
use url::Url;

/// A URL handed out for fetching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    /// The URL to fetch
    pub url: Url,

    /// Transport failures recorded for this URL so far
    pub attempts: u32,
}

/// What happens to a URL after a transport failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// The URL was queued again; `attempt` failures so far
    Retry { attempt: u32 },

    /// The retry budget is spent
    Abandoned { attempts: u32 },
}

/// Frontier owns the queue and the seen set
///
/// A URL is accepted at most once. Retries go back to the end of the queue
/// without passing through the seen-set check again.
#[derive(Debug)]
pub struct Frontier {
    /// Scope every accepted URL must lie in
    scope: SiteScope,

    /// URLs waiting to be fetched, oldest first
    pending: VecDeque<Url>,

    /// Transport failures per URL
    attempts: HashMap<String, u32>,

    /// Every URL ever accepted, with its current state
    states: HashMap<String, PageState>,

    /// Failures tolerated before a URL is abandoned
    max_retries: u32,
}

impl Frontier {
    /// Creates an empty frontier
    ///
    /// # Arguments
    ///
    /// * `scope` - The site being mirrored
    /// * `max_retries` - A URL is retried while its failure count is at
    ///   most this value
    pub fn new(scope: SiteScope, max_retries: u32) -> Self {
        Self {
            scope,
            pending: VecDeque::new(),
            attempts: HashMap::new(),
            states: HashMap::new(),
            max_retries,
        }
    }

    /// Queues the site root
    pub fn seed(&mut self) -> bool {
        let root = self.scope.root().clone();
        self.enqueue(root)
    }

    /// Offers a URL to the frontier
    ///
    /// The fragment is dropped first. Returns true if the URL was accepted,
    /// false if it is out of scope or was accepted before.
    pub fn enqueue(&mut self, mut url: Url) -> bool {
        url.set_fragment(None);

        if !self.scope.contains(&url) {
            tracing::trace!("Ignoring out-of-scope URL {}", url);
            return false;
        }

        let key = url.as_str().to_string();
        if self.states.contains_key(&key) {
            return false;
        }

        tracing::trace!("Queued {}", url);
        self.states.insert(key, PageState::Queued);
        self.pending.push_back(url);
        true
    }

    /// Takes the oldest pending URL and marks it as being fetched
    pub fn dequeue(&mut self) -> Option<CrawlTask> {
        let url = self.pending.pop_front()?;
        let key = url.as_str();
        let attempts = self.attempts.get(key).copied().unwrap_or(0);
        self.states.insert(key.to_string(), PageState::Fetching);
        Some(CrawlTask { url, attempts })
    }

    /// Records that a URL was written to disk
    pub fn record_success(&mut self, url: &Url) {
        self.set_state(url, PageState::Mirrored);
    }

    /// Records that a URL was skipped (non-success status, off-site redirect)
    pub fn record_skipped(&mut self, url: &Url) {
        self.set_state(url, PageState::Skipped);
    }

    /// Records that a URL could not be rewritten or written
    pub fn record_failed(&mut self, url: &Url) {
        self.set_state(url, PageState::Failed);
    }

    /// Records a transport failure and decides whether to retry
    ///
    /// The URL is queued again while its failure count is at most
    /// `max_retries`, so it is fetched at most `max_retries + 1` times.
    pub fn record_failure(&mut self, url: &Url) -> RetryDecision {
        let key = url.as_str().to_string();
        let count = self.attempts.entry(key.clone()).or_insert(0);
        *count += 1;
        let count = *count;

        if count <= self.max_retries {
            self.states.insert(key, PageState::Retrying);
            self.pending.push_back(url.clone());
            RetryDecision::Retry { attempt: count }
        } else {
            self.states.insert(key, PageState::Abandoned);
            RetryDecision::Abandoned { attempts: count }
        }
    }

    /// Returns the state of a URL, if it was ever accepted
    pub fn state_of(&self, url: &Url) -> Option<PageState> {
        self.states.get(url.as_str()).copied()
    }

    /// Returns true once nothing is waiting to be fetched
    ///
    /// With workers still in flight the run is not over: their outcomes may
    /// enqueue more URLs.
    pub fn is_done(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of URLs waiting to be fetched
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// URLs waiting to be fetched, oldest first
    pub fn pending_urls(&self) -> Vec<Url> {
        self.pending.iter().cloned().collect()
    }

    /// Number of URLs ever accepted
    pub fn seen_len(&self) -> usize {
        self.states.len()
    }

    /// Number of accepted URLs in each state
    pub fn state_counts(&self) -> HashMap<PageState, usize> {
        let mut counts = HashMap::new();
        for state in self.states.values() {
            *counts.entry(*state).or_insert(0) += 1;
        }
        counts
    }

    fn set_state(&mut self, url: &Url, state: PageState) {
        self.states.insert(url.as_str().to_string(), state);
    }
}
