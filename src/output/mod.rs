//! Output module for writing the mirror and reporting on it
//!
//! This module handles:
//! - Classifying fetched content and writing it to the site directory
//! - Recording and printing run statistics

pub mod stats;
mod writer;

pub use stats::{print_statistics, MirrorStats};
pub use writer::{ContentKind, ContentWriter};
