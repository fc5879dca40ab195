//! Statistics for a mirror run
//!
//! This module collects the counters a run produces and prints them once
//! the run is over.

use crate::state::PageState;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// Mirror run statistics
#[derive(Debug, Clone, Default)]
pub struct MirrorStats {
    /// Count of URLs by final state
    pub pages_by_state: HashMap<PageState, usize>,

    /// Number of files written
    pub files_written: u64,

    /// Total bytes written
    pub bytes_written: u64,

    /// In-scope references found in rewritten documents
    pub links_discovered: u64,

    /// Wall-clock duration of the run
    pub elapsed: Duration,

    /// URLs still queued when the run stopped
    pub pending: Vec<Url>,
}

impl MirrorStats {
    /// Records one written file
    pub fn record_write(&mut self, bytes: u64) {
        self.files_written += 1;
        self.bytes_written += bytes;
    }

    /// Number of URLs the frontier accepted
    pub fn total_pages(&self) -> usize {
        self.pages_by_state.values().sum()
    }

    /// Number of URLs in the given state
    pub fn count(&self, state: PageState) -> usize {
        self.pages_by_state.get(&state).copied().unwrap_or(0)
    }

    /// Number of URLs written to disk
    pub fn mirrored_pages(&self) -> usize {
        self.sum_where(PageState::is_success)
    }

    /// Number of URLs that ended in an error state
    pub fn error_pages(&self) -> usize {
        self.sum_where(PageState::is_error)
    }

    /// Per-state counts in lifecycle order, empty states left out
    pub fn state_table(&self) -> Vec<(PageState, usize)> {
        PageState::all_states()
            .into_iter()
            .map(|state| (state, self.count(state)))
            .filter(|(_, count)| *count > 0)
            .collect()
    }

    fn sum_where(&self, keep: fn(&PageState) -> bool) -> usize {
        self.pages_by_state
            .iter()
            .filter(|(state, _)| keep(state))
            .map(|(_, count)| count)
            .sum()
    }

    /// Returns true if the run stopped before the frontier drained
    pub fn interrupted(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Average pages completed per second
    pub fn pages_per_second(&self) -> f64 {
        let completed = self.sum_where(PageState::is_terminal);
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            completed as f64 / secs
        } else {
            0.0
        }
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &MirrorStats) {
    println!("=== Mirror Statistics ===\n");

    println!("Overview:");
    println!("  Total URLs accepted: {}", stats.total_pages());
    println!("  Files written: {}", stats.files_written);
    println!("  Bytes written: {}", stats.bytes_written);
    println!("  Links discovered: {}", stats.links_discovered);
    println!(
        "  Elapsed: {:.1}s ({:.1} pages/sec)",
        stats.elapsed.as_secs_f64(),
        stats.pages_per_second()
    );
    println!();

    println!("URLs by State:");
    let total = stats.total_pages();
    for (state, count) in stats.state_table() {
        let percentage = if total > 0 {
            (count as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", state, count, percentage);
    }
    println!();

    if stats.interrupted() {
        println!("Interrupted with {} URLs still queued:", stats.pending.len());
        for url in &stats.pending {
            println!("  - {}", url);
        }
        println!();
    }

    let errors = stats.error_pages();
    if errors > 0 {
        println!("Errors: {} URLs failed or abandoned\n", errors);
    }

    let mirrored = stats.mirrored_pages();
    let success_rate = if total > 0 {
        (mirrored as f64 / total as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} URLs mirrored)",
        success_rate, mirrored, total
    );
}
