//! State module for tracking mirror progress
//!
//! `PageState` tracks the lifecycle of each URL the frontier accepts
//! (queued, fetching, retrying, mirrored, skipped, failed, abandoned).

mod page_state;

pub use page_state::PageState;
