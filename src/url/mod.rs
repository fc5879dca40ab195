//! URL handling module for Sumi-Mirror
//!
//! This module provides the site scope test, resolution of references
//! against the current document, and the deterministic mapping from URLs
//! to destination paths.

mod path_map;
mod scope;

pub use path_map::{relative_link, sanitize_file_name, PathMapper};
pub use scope::SiteScope;
