//! Link rewriting for fetched documents
//!
//! HTML and CSS documents are decoded, every in-scope reference is
//! replaced by the relative path between the document's destination file
//! and the referenced resource's destination file, and the absolute URL
//! of each rewritten reference is collected for the frontier.
//!
//! Out-of-scope references are never modified.

mod css;
mod html;

pub use css::CssRewriter;
pub use html::HtmlRewriter;

use crate::url::{relative_link, PathMapper, SiteScope};
use encoding_rs::Encoding;
use url::Url;

/// Where a document lives, on the site and in the mirror
#[derive(Debug, Clone, Copy)]
pub struct RewriteContext<'a> {
    /// Scope of the site being mirrored
    pub scope: &'a SiteScope,

    /// Mapper producing destination paths
    pub mapper: &'a PathMapper,

    /// URL that references in the document are resolved against
    pub base: &'a Url,

    /// Destination path the document itself is written to
    pub document_path: &'a str,
}

/// Output of a rewrite: the new document text and the in-scope URLs it references
#[derive(Debug, Clone, Default)]
pub struct Rewritten {
    pub text: String,
    pub links: Vec<Url>,
}

/// Rewrites single references for one document and records what it saw
#[derive(Debug)]
pub struct LinkRewriter<'a> {
    ctx: RewriteContext<'a>,
    links: Vec<Url>,
}

impl<'a> LinkRewriter<'a> {
    pub fn new(ctx: RewriteContext<'a>) -> Self {
        Self {
            ctx,
            links: Vec::new(),
        }
    }

    /// Rewrites one reference
    ///
    /// Returns the relative link to use instead of `reference`, or None if
    /// the reference must be left untouched (unresolvable, fragment-only or
    /// out of scope). A fragment on the reference is kept on the link but
    /// not on the recorded URL.
    pub fn rewrite_reference(&mut self, reference: &str) -> Option<String> {
        let mut target = self.ctx.scope.resolve(self.ctx.base, reference)?;
        let fragment = target.fragment().map(str::to_string);
        target.set_fragment(None);

        if !self.ctx.scope.contains(&target) {
            return None;
        }

        let mut link = relative_link(self.ctx.document_path, &self.ctx.mapper.map(&target));
        if let Some(fragment) = fragment {
            link.push('#');
            link.push_str(&fragment);
        }

        self.links.push(target);
        Some(link)
    }

    /// Consumes the rewriter and returns every in-scope URL it rewrote
    pub fn into_links(self) -> Vec<Url> {
        self.links
    }
}

/// The HTML and CSS rewriters, built once per mirror run
#[derive(Debug, Clone)]
pub struct Rewriters {
    pub html: HtmlRewriter,
    pub css: CssRewriter,
}

impl Rewriters {
    pub fn new() -> Result<Self, regex::Error> {
        let css = CssRewriter::new()?;
        let html = HtmlRewriter::new(css.clone())?;
        Ok(Self { html, css })
    }
}

/// Decodes a document body, logging malformed input
fn decode(body: &[u8], encoding: &'static Encoding, url: &Url) -> String {
    let (text, actual, malformed) = encoding.decode(body);
    if malformed {
        tracing::debug!(
            "Malformed {} sequences replaced while decoding {}",
            actual.name(),
            url
        );
    }
    text.into_owned()
}
