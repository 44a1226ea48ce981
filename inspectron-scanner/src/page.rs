//! Collaborator seams used by the traversal engine.
//!
//! The engine never sees a concrete browser or DOM type. Page loading, link
//! extraction and element labeling are injected through these traits; the
//! HTTP and HTML adapters live in [`crate::http`] and [`crate::html`].

use crate::canonical::CanonicalUrl;
use crate::error::Result;
use futures::future::BoxFuture;
use url::Url;

/// Snapshot of a loaded page handed from the loader to the extractor.
#[derive(Debug, Clone)]
pub struct LoadedPage {
    pub url: CanonicalUrl,
    pub final_url: Option<String>,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl LoadedPage {
    pub fn new(url: CanonicalUrl, body: impl Into<String>) -> Self {
        Self {
            url,
            final_url: None,
            status_code: 200,
            content_type: Some("text/html".to_string()),
            body: body.into(),
        }
    }

    /// Where the body was actually served from: the last redirect target if
    /// there was one, else the requested URL. Left uncanonicalized so a
    /// served trailing slash still scopes relative links.
    pub fn base_url(&self) -> Url {
        self.final_url
            .as_deref()
            .and_then(|u| Url::parse(u).ok())
            .unwrap_or_else(|| self.url.as_url().clone())
    }

    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.contains("text/html"))
            .unwrap_or(true)
    }
}

/// One element found on a page that may be labeled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageElement {
    pub element_id: String,
    pub tag_name: String,
    pub text: String,
    pub href: Option<String>,
}

/// Page-loading capability (a browser session, an HTTP client, ...).
///
/// `start` acquires the underlying resource, `close` releases it. A loader is
/// owned by exactly one engine and is not reused after `close`.
pub trait PageLoader: Send {
    fn start(&mut self) -> BoxFuture<'_, Result<()>>;

    fn load<'a>(&'a mut self, url: &'a CanonicalUrl) -> BoxFuture<'a, Result<LoadedPage>>;

    fn close(&mut self) -> BoxFuture<'_, Result<()>>;
}

/// Link-extraction capability.
pub trait LinkExtractor: Send + Sync {
    /// Raw `href` values in document order.
    fn find_links<'a>(&'a self, page: &'a LoadedPage) -> BoxFuture<'a, Result<Vec<String>>>;

    /// Elements eligible for labeling. Defaults to none.
    fn find_elements<'a>(
        &'a self,
        _page: &'a LoadedPage,
    ) -> BoxFuture<'a, Result<Vec<PageElement>>> {
        Box::pin(async { Ok(Vec::new()) })
    }
}

/// Element-labeling capability.
pub trait ElementLabeler: Send + Sync {
    /// Colour assigned to `tag`, or `None` when the tag is not labeled.
    fn color_for(&self, tag: &str) -> Option<&str>;

    fn label<'a>(
        &'a self,
        page: &'a LoadedPage,
        element: &'a PageElement,
        color: &'a str,
        number: usize,
    ) -> BoxFuture<'a, Result<()>>;
}
