//! Writing mirrored resources to disk
//!
//! This module handles:
//! - Deciding whether a resource is HTML, CSS or opaque bytes
//! - Atomic writes of resources into the site directory
//! - Serializing writers whose URLs collide on one destination path
//! - Applying the server timestamp as the file modification time

use crate::url::{PathMapper, SiteScope};
use crate::{MirrorError, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;
use tempfile::NamedTempFile;

/// MIME types that say nothing about the content
const GENERIC_MIME_TYPES: &[&str] = &[
    "text/plain",
    "application/octet-stream",
    "binary/octet-stream",
];

/// How a fetched resource is handled before it is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Rewritten with the HTML rewriter
    Html,
    /// Rewritten with the CSS rewriter
    Css,
    /// Written verbatim
    Other,
}

impl ContentKind {
    /// Classifies a resource
    ///
    /// Specific MIME types are trusted. The destination file extension only
    /// decides when the MIME type is missing or generic.
    ///
    /// # Examples
    ///
    /// ```
    /// use sumi_mirror::output::ContentKind;
    ///
    /// assert_eq!(ContentKind::classify(Some("text/css"), "a/index.html"), ContentKind::Css);
    /// assert_eq!(ContentKind::classify(Some("image/png"), "logo/index.html"), ContentKind::Other);
    /// assert_eq!(ContentKind::classify(None, "about.htm"), ContentKind::Html);
    /// ```
    pub fn classify(mime_type: Option<&str>, destination: &str) -> Self {
        match mime_type {
            Some("text/html") | Some("application/xhtml+xml") => Self::Html,
            Some("text/css") => Self::Css,
            Some(mime) if !GENERIC_MIME_TYPES.contains(&mime) => Self::Other,
            _ => Self::from_extension(destination),
        }
    }

    fn from_extension(destination: &str) -> Self {
        let extension = Path::new(destination)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("html") | Some("htm") => Self::Html,
            Some("css") => Self::Css,
            _ => Self::Other,
        }
    }
}

/// One lock per destination file being written
///
/// Entries live only while some writer holds or waits for them.
#[derive(Debug, Default)]
struct PathLocks {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl PathLocks {
    fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(path.to_path_buf()).or_default().clone()
    }

    /// Hands back a lock taken with `lock_for`
    fn release(&self, path: &Path, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // The map's copy plus ours: nobody else is waiting
        if Arc::strong_count(&lock) == 2 {
            locks.remove(path);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Writes resources below the site directory
#[derive(Debug)]
pub struct ContentWriter {
    /// `<destination-root>/<sanitized-root-url>`
    site_root: PathBuf,

    locks: PathLocks,
}

impl ContentWriter {
    /// Creates the site directory under the destination root
    ///
    /// # Arguments
    ///
    /// * `destination_root` - Directory holding one subdirectory per mirrored site
    /// * `scope` - The site being mirrored
    ///
    /// # Returns
    ///
    /// * `Ok(ContentWriter)` - The site directory exists
    /// * `Err(MirrorError::Write)` - The site directory could not be created
    pub fn new(destination_root: impl AsRef<Path>, scope: &SiteScope) -> Result<Self> {
        let site_root = destination_root
            .as_ref()
            .join(PathMapper::root_dir_name(scope));

        std::fs::create_dir_all(&site_root).map_err(|source| MirrorError::Write {
            path: site_root.clone(),
            source,
        })?;

        Ok(Self {
            site_root,
            locks: PathLocks::default(),
        })
    }

    /// Returns the site directory
    pub fn site_root(&self) -> &Path {
        &self.site_root
    }

    /// Turns a `/`-separated destination path into a filesystem path
    pub fn local_path(&self, destination: &str) -> PathBuf {
        destination
            .split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.site_root.clone(), |path, segment| path.join(segment))
    }

    /// Writes a resource to its destination path
    ///
    /// Parent directories are created as needed. The content goes to a
    /// temporary file next to the destination and is renamed into place, so
    /// the destination never holds a partial write.
    ///
    /// # Arguments
    ///
    /// * `destination` - Destination path from the path mapper
    /// * `contents` - Bytes to write
    /// * `modified` - Modification time to set, if known
    ///
    /// # Returns
    ///
    /// The filesystem path written
    pub fn write(
        &self,
        destination: &str,
        contents: &[u8],
        modified: Option<DateTime<Utc>>,
    ) -> Result<PathBuf> {
        let path = self.local_path(destination);
        let parent = path.parent().unwrap_or(&self.site_root).to_path_buf();
        std::fs::create_dir_all(&parent).map_err(|source| MirrorError::Write {
            path: path.clone(),
            source,
        })?;

        let lock = self.locks.lock_for(&path);
        let written = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            write_atomic(&path, &parent, contents, modified)
        };
        self.locks.release(&path, lock);

        written.map(|()| path)
    }
}

/// Writes `contents` to a temporary file in `parent` and renames it to `path`
fn write_atomic(
    path: &Path,
    parent: &Path,
    contents: &[u8],
    modified: Option<DateTime<Utc>>,
) -> Result<()> {
    let write_error = |source: std::io::Error| MirrorError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut file = NamedTempFile::new_in(parent).map_err(write_error)?;
    file.write_all(contents).map_err(write_error)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))
            .map_err(write_error)?;
    }

    if let Some(modified) = modified {
        file.as_file()
            .set_modified(SystemTime::from(modified))
            .map_err(write_error)?;
    }

    file.persist(path).map_err(|e| write_error(e.error))?;
    Ok(())
}
