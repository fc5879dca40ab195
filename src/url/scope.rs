use crate::UrlError;
use url::Url;

/// The boundary of the site being mirrored
///
/// A URL is in scope when its serialization starts with the serialization
/// of the root URL. Both sides go through `url::Url`, so scheme and host
/// case and default ports are already canonical when the prefix is tested.
#[derive(Debug, Clone)]
pub struct SiteScope {
    root: Url,
}

impl SiteScope {
    /// Creates the scope for a root URL
    ///
    /// The root loses its query and fragment and its path is forced to end
    /// with `/`, so `http://example.com/docs` scopes `http://example.com/docs/`.
    ///
    /// # Examples
    ///
    /// ```
    /// use sumi_mirror::url::SiteScope;
    ///
    /// let scope = SiteScope::new("HTTP://Example.COM:80/docs").unwrap();
    /// assert_eq!(scope.root().as_str(), "http://example.com/docs/");
    /// ```
    pub fn new(root: &str) -> Result<Self, UrlError> {
        let mut url = Url::parse(root.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(UrlError::InvalidScheme(format!(
                "Only HTTP and HTTPS schemes are supported, got: {}",
                url.scheme()
            )));
        }

        if url.host_str().is_none() {
            return Err(UrlError::MissingHost);
        }

        url.set_query(None);
        url.set_fragment(None);
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        Ok(Self { root: url })
    }

    /// Returns the normalized root URL
    pub fn root(&self) -> &Url {
        &self.root
    }

    /// Returns true if the URL lies inside the site
    pub fn contains(&self, url: &Url) -> bool {
        url.as_str().starts_with(self.root.as_str())
    }

    /// Resolves a reference found in a document against the document's URL
    ///
    /// Returns None for empty references, fragment-only references and
    /// references that cannot be joined.
    pub fn resolve(&self, base: &Url, reference: &str) -> Option<Url> {
        let reference = reference.trim();
        if reference.is_empty() || reference.starts_with('#') {
            return None;
        }
        base.join(reference).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_gets_trailing_slash() {
        let scope = SiteScope::new("http://example.com").unwrap();
        assert_eq!(scope.root().as_str(), "http://example.com/");

        let scope = SiteScope::new("http://example.com/docs").unwrap();
        assert_eq!(scope.root().as_str(), "http://example.com/docs/");
    }

    #[test]
    fn test_root_drops_query_and_fragment() {
        let scope = SiteScope::new("https://example.com/docs/?page=1#top").unwrap();
        assert_eq!(scope.root().as_str(), "https://example.com/docs/");
    }

    #[test]
    fn test_root_normalizes_case_and_port() {
        let scope = SiteScope::new("  HTTPS://Example.COM:443/  ").unwrap();
        assert_eq!(scope.root().as_str(), "https://example.com/");
    }

    #[test]
    fn test_rejects_other_schemes() {
        assert!(matches!(
            SiteScope::new("ftp://example.com/"),
            Err(UrlError::InvalidScheme(_))
        ));
        assert!(matches!(
            SiteScope::new("not a url"),
            Err(UrlError::Parse(_))
        ));
    }

    #[test]
    fn test_contains_is_prefix_test() {
        let scope = SiteScope::new("http://example.com/docs/").unwrap();

        let inside = Url::parse("http://example.com/docs/a/b.html").unwrap();
        let sibling = Url::parse("http://example.com/blog/").unwrap();
        let other_host = Url::parse("http://other.com/docs/").unwrap();
        let other_scheme = Url::parse("https://example.com/docs/").unwrap();

        assert!(scope.contains(&inside));
        assert!(scope.contains(scope.root()));
        assert!(!scope.contains(&sibling));
        assert!(!scope.contains(&other_host));
        assert!(!scope.contains(&other_scheme));
    }

    #[test]
    fn test_contains_uses_canonical_host() {
        let scope = SiteScope::new("http://example.com/").unwrap();
        let url = Url::parse("http://EXAMPLE.com:80/page").unwrap();
        assert!(scope.contains(&url));
    }

    #[test]
    fn test_resolve_against_document() {
        let scope = SiteScope::new("http://example.com/").unwrap();
        let base = Url::parse("http://example.com/css/site.css").unwrap();

        let resolved = scope.resolve(&base, "images/x.png").unwrap();
        assert_eq!(resolved.as_str(), "http://example.com/css/images/x.png");

        let resolved = scope.resolve(&base, "/img/y.png").unwrap();
        assert_eq!(resolved.as_str(), "http://example.com/img/y.png");

        let resolved = scope.resolve(&base, "../fonts/z.woff").unwrap();
        assert_eq!(resolved.as_str(), "http://example.com/fonts/z.woff");
    }

    #[test]
    fn test_resolve_skips_empty_and_fragment_only() {
        let scope = SiteScope::new("http://example.com/").unwrap();
        let base = Url::parse("http://example.com/page.html").unwrap();

        assert!(scope.resolve(&base, "").is_none());
        assert!(scope.resolve(&base, "   ").is_none());
        assert!(scope.resolve(&base, "#section").is_none());
    }

    #[test]
    fn test_special_schemes_are_out_of_scope() {
        let scope = SiteScope::new("http://example.com/").unwrap();
        let base = Url::parse("http://example.com/page.html").unwrap();

        for reference in ["mailto:a@example.com", "javascript:void(0)", "data:image/png;base64,AA"] {
            let resolved = scope.resolve(&base, reference).unwrap();
            assert!(!scope.contains(&resolved), "{} should be out of scope", reference);
        }
    }
}
