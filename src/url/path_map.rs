//! Mapping from URLs to destination paths
//!
//! Destination paths are `/`-separated strings relative to the site's
//! directory under the destination root. The mapping is a pure function of
//! the URL and the site root.

use crate::url::SiteScope;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use std::path::{Component, Path, PathBuf};
use url::Url;

/// Characters that may not appear in a file name
const RESERVED: &[char] = &['?', '&', '|', ':', '/', ';', '*', '"', '\\', '#', '<', '>'];

/// File name used for URLs that name a directory
const INDEX_STEM: &str = "index";
const INDEX_EXTENSION: &str = "html";

/// Characters escaped in a segment of a rewritten relative link
const LINK_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'\'')
    .add(b'(')
    .add(b')')
    .add(b':')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Replaces every reserved file name character with `_`
///
/// # Examples
///
/// ```
/// use sumi_mirror::url::sanitize_file_name;
///
/// assert_eq!(sanitize_file_name("http://example.com/"), "http___example.com_");
/// assert_eq!(sanitize_file_name("page?a=1&b=2"), "page_a=1_b=2");
/// ```
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| if RESERVED.contains(&c) { '_' } else { c })
        .collect()
}

/// Maps resource URLs to destination paths
#[derive(Debug, Clone)]
pub struct PathMapper {
    /// Directory segments of the site root, stripped from every mapped path
    root_dirs: Vec<String>,
}

impl PathMapper {
    /// Creates a mapper for the given site
    pub fn new(scope: &SiteScope) -> Self {
        let mut segments = decoded_segments(scope.root());
        // The root path always ends with '/', so its last segment is empty
        segments.pop();
        let root_dirs = segments.iter().filter_map(|s| directory_name(s)).collect();
        Self { root_dirs }
    }

    /// Returns the name of the site's directory under the destination root
    pub fn root_dir_name(scope: &SiteScope) -> String {
        sanitize_file_name(scope.root().as_str())
    }

    /// Maps a URL to its destination path
    ///
    /// 1. Path segments are percent-decoded.
    /// 2. A trailing slash or an extensionless last segment gets `index.html`.
    /// 3. The query is folded into the file name before the extension.
    /// 4. Reserved characters in the file name become `_`.
    /// 5. The site root's own directories are stripped.
    ///
    /// # Examples
    ///
    /// ```
    /// use sumi_mirror::url::{PathMapper, SiteScope};
    /// use url::Url;
    ///
    /// let scope = SiteScope::new("http://example.com/").unwrap();
    /// let mapper = PathMapper::new(&scope);
    ///
    /// let url = Url::parse("http://example.com/a/c").unwrap();
    /// assert_eq!(mapper.map(&url), "a/c/index.html");
    ///
    /// let url = Url::parse("http://example.com/p?a=1").unwrap();
    /// assert_eq!(mapper.map(&url), "p/index_a=1.html");
    /// ```
    pub fn map(&self, url: &Url) -> String {
        let mut segments = decoded_segments(url);
        let last = segments.pop().unwrap_or_default();

        let mut dirs: Vec<String> = segments.iter().filter_map(|s| directory_name(s)).collect();

        let file_name = match split_extension(&last) {
            Some((stem, extension)) => file_name(stem, url.query(), extension),
            None => {
                dirs.extend(directory_name(&last));
                file_name(INDEX_STEM, url.query(), INDEX_EXTENSION)
            }
        };

        if dirs.starts_with(&self.root_dirs) {
            dirs.drain(..self.root_dirs.len());
        }

        dirs.push(file_name);
        dirs.join("/")
    }
}

/// Computes the link that leads from one destination file to another
///
/// Both arguments are destination paths. The result is relative to the
/// directory containing `from` and is percent-encoded segment by segment.
///
/// # Examples
///
/// ```
/// use sumi_mirror::url::relative_link;
///
/// assert_eq!(relative_link("a/b.html", "a/c/index.html"), "c/index.html");
/// assert_eq!(relative_link("css/site.css", "images/x.png"), "../images/x.png");
/// ```
pub fn relative_link(from: &str, to: &str) -> String {
    let base = Path::new(from).parent().unwrap_or_else(|| Path::new(""));
    let relative = pathdiff::diff_paths(Path::new(to), base).unwrap_or_else(|| PathBuf::from(to));

    relative
        .components()
        .filter_map(|component| match component {
            Component::ParentDir => Some("..".to_string()),
            Component::Normal(name) => {
                Some(utf8_percent_encode(&name.to_string_lossy(), LINK_SEGMENT).to_string())
            }
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn decoded_segments(url: &Url) -> Vec<String> {
    url.path_segments()
        .map(|segments| {
            segments
                .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default()
}

/// Turns a decoded path segment into a directory name that stays inside
/// the destination root. Empty segments are dropped.
fn directory_name(segment: &str) -> Option<String> {
    match segment {
        "" => None,
        "." | ".." => Some("_".to_string()),
        _ => Some(segment.replace(|c: char| c == '/' || c == '\\', "_")),
    }
}

fn split_extension(name: &str) -> Option<(&str, &str)> {
    let (stem, extension) = name.rsplit_once('.')?;
    if stem.is_empty() || extension.is_empty() {
        return None;
    }
    Some((stem, extension))
}

fn file_name(stem: &str, query: Option<&str>, extension: &str) -> String {
    let base = match query {
        Some(query) => format!("{}?{}", stem, query),
        None => stem.to_string(),
    };
    format!(
        "{}.{}",
        sanitize_file_name(&base),
        sanitize_file_name(extension)
    )
}
