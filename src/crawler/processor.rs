//! Per-URL pipeline: fetch, classify, rewrite, write
//!
//! The processor never touches the frontier. It turns one `CrawlTask` into
//! a `PageOutcome` that the coordinator feeds back into the frontier.

use crate::crawler::fetcher::{fetch_url, FetchResult, RemoteResource};
use crate::crawler::frontier::CrawlTask;
use crate::output::{ContentKind, ContentWriter};
use crate::rewrite::{RewriteContext, Rewriters};
use crate::url::{PathMapper, SiteScope};
use crate::{MirrorError, Result};
use encoding_rs::Encoding;
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

/// Result of processing one URL
#[derive(Debug)]
pub enum PageOutcome {
    /// Written to disk
    Saved {
        url: Url,
        /// Filesystem path written
        path: PathBuf,
        /// In-scope URLs referenced by the resource
        links: Vec<Url>,
        /// Bytes written
        bytes: u64,
    },

    /// Non-success status or a redirect off the site
    Skipped { url: Url, reason: String },

    /// Transport failure; the URL may be tried again
    Retry { url: Url, error: String },

    /// Rewriting or writing failed; retrying would fail the same way
    Failed { url: Url, error: MirrorError },
}

impl PageOutcome {
    /// The URL this outcome is for
    pub fn url(&self) -> &Url {
        match self {
            Self::Saved { url, .. }
            | Self::Skipped { url, .. }
            | Self::Retry { url, .. }
            | Self::Failed { url, .. } => url,
        }
    }
}

/// Everything a worker needs to mirror one URL
#[derive(Debug)]
pub struct PageProcessor {
    client: Client,
    scope: SiteScope,
    mapper: PathMapper,
    rewriters: Rewriters,
    writer: Arc<ContentWriter>,
}

impl PageProcessor {
    /// Creates a processor for one site
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client shared by all workers
    /// * `scope` - The site being mirrored
    /// * `writer` - Writer for the site directory
    pub fn new(client: Client, scope: SiteScope, writer: Arc<ContentWriter>) -> Result<Self> {
        let mapper = PathMapper::new(&scope);
        let rewriters = Rewriters::new()?;

        Ok(Self {
            client,
            scope,
            mapper,
            rewriters,
            writer,
        })
    }

    /// Mirrors one URL
    ///
    /// 1. Fetch the URL (redirects are followed)
    /// 2. Skip it if the server refused it or redirected off the site
    /// 3. Classify the content and rewrite HTML and CSS against the final URL
    /// 4. Write the result at the requested URL's destination path
    pub async fn process(&self, task: CrawlTask) -> PageOutcome {
        let resource = match fetch_url(&self.client, &task.url).await {
            FetchResult::Fetched(resource) => resource,
            FetchResult::HttpError { url, status_code } => {
                return PageOutcome::Skipped {
                    url,
                    reason: format!("HTTP {}", status_code),
                };
            }
            FetchResult::NetworkError { url, error } => {
                return PageOutcome::Retry { url, error };
            }
        };

        if resource.was_redirected() && !self.scope.contains(&resource.final_url) {
            return PageOutcome::Skipped {
                reason: format!("Redirected off-site to {}", resource.final_url),
                url: resource.url,
            };
        }

        let RemoteResource {
            url,
            final_url,
            mime_type,
            declared_encoding,
            body,
            last_modified,
        } = resource;

        let destination = self.mapper.map(&url);
        let kind = ContentKind::classify(mime_type.as_deref(), &destination);
        tracing::debug!("{} is {:?} -> {}", url, kind, destination);

        let (contents, links) =
            match self.render(kind, body, declared_encoding, &final_url, &destination) {
                Ok(rendered) => rendered,
                Err(error) => return PageOutcome::Failed { url, error },
            };

        let bytes = contents.len() as u64;
        let writer = Arc::clone(&self.writer);
        let written = tokio::task::spawn_blocking(move || {
            writer.write(&destination, &contents, last_modified)
        })
        .await
        .map_err(|e| MirrorError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)));

        match written {
            Ok(Ok(path)) => PageOutcome::Saved {
                url,
                path,
                links,
                bytes,
            },
            Ok(Err(error)) | Err(error) => PageOutcome::Failed { url, error },
        }
    }

    /// Produces the bytes to write and the links they reference
    fn render(
        &self,
        kind: ContentKind,
        body: Vec<u8>,
        declared: Option<&'static Encoding>,
        base: &Url,
        destination: &str,
    ) -> Result<(Vec<u8>, Vec<Url>)> {
        let ctx = RewriteContext {
            scope: &self.scope,
            mapper: &self.mapper,
            base,
            document_path: destination,
        };

        let rewritten = match kind {
            ContentKind::Html => self.rewriters.html.rewrite(&body, declared, ctx)?,
            ContentKind::Css => self.rewriters.css.rewrite(&body, declared, ctx),
            ContentKind::Other => return Ok((body, Vec::new())),
        };

        Ok((rewritten.text.into_bytes(), rewritten.links))
    }
}
