use crate::error::{CrawlError, Result};
use crate::page::{ElementLabeler, LinkExtractor, LoadedPage, PageElement};
use futures::future::BoxFuture;
use scraper::{Html, Selector};
use std::collections::HashMap;
use tracing::debug;

const LINK_SELECTOR: &str = "a[href]";
const ELEMENT_SELECTOR: &str = "a, button";

/// Extracts links and labelable elements from static HTML.
#[derive(Debug, Clone, Default)]
pub struct HtmlLinkExtractor;

impl HtmlLinkExtractor {
    pub fn new() -> Self {
        Self
    }

    fn selector(css: &str) -> Result<Selector> {
        Selector::parse(css).map_err(|e| CrawlError::ParseError(format!("{}: {:?}", css, e)))
    }

    /// Raw href values in document order.
    pub fn extract_links(html: &str) -> Result<Vec<String>> {
        let document = Html::parse_document(html);
        let selector = Self::selector(LINK_SELECTOR)?;

        Ok(document
            .select(&selector)
            .filter_map(|element| element.value().attr("href"))
            .map(|href| href.to_string())
            .collect())
    }

    /// Anchors and buttons in document order. Elements without an `id`
    /// attribute get a positional one.
    pub fn extract_elements(html: &str) -> Result<Vec<PageElement>> {
        let document = Html::parse_document(html);
        let selector = Self::selector(ELEMENT_SELECTOR)?;

        Ok(document
            .select(&selector)
            .enumerate()
            .map(|(idx, element)| {
                let tag_name = element.value().name().to_lowercase();
                let element_id = element
                    .value()
                    .id()
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| format!("{}-{}", tag_name, idx));
                let text = element
                    .text()
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
                PageElement {
                    element_id,
                    tag_name,
                    text,
                    href: element.value().attr("href").map(|h| h.to_string()),
                }
            })
            .collect())
    }
}

impl LinkExtractor for HtmlLinkExtractor {
    fn find_links<'a>(&'a self, page: &'a LoadedPage) -> BoxFuture<'a, Result<Vec<String>>> {
        let links = if page.is_html() {
            Self::extract_links(&page.body)
        } else {
            debug!("Skipping non-HTML page {}", page.url);
            Ok(Vec::new())
        };
        Box::pin(async move { links })
    }

    fn find_elements<'a>(
        &'a self,
        page: &'a LoadedPage,
    ) -> BoxFuture<'a, Result<Vec<PageElement>>> {
        let elements = if page.is_html() {
            Self::extract_elements(&page.body)
        } else {
            Ok(Vec::new())
        };
        Box::pin(async move { elements })
    }
}

/// Labeler that assigns colours per tag name.
///
/// Static HTML has no live DOM to decorate, so labeling only records the
/// assignment.
#[derive(Debug, Clone)]
pub struct PaletteLabeler {
    palette: HashMap<String, String>,
}

impl PaletteLabeler {
    pub fn new() -> Self {
        Self::with_palette([("a", "red"), ("button", "blue")])
    }

    pub fn with_palette<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            palette: entries
                .into_iter()
                .map(|(tag, color)| (tag.to_lowercase(), color.to_string()))
                .collect(),
        }
    }
}

impl Default for PaletteLabeler {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementLabeler for PaletteLabeler {
    fn color_for(&self, tag: &str) -> Option<&str> {
        self.palette.get(&tag.to_lowercase()).map(String::as_str)
    }

    fn label<'a>(
        &'a self,
        page: &'a LoadedPage,
        element: &'a PageElement,
        color: &'a str,
        number: usize,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            debug!(
                "Labeled {} #{} ({}) on {} with {}",
                element.tag_name, number, element.element_id, page.url, color
            );
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::canonicalize;

    #[test]
    fn test_extract_links_in_document_order() {
        let html = r#"<html><body>
            <a href="/a">A</a>
            <a>no href</a>
            <a href="https://other.test/x">X</a>
            <a href="/a">A again</a>
        </body></html>"#;

        let links = HtmlLinkExtractor::extract_links(html).unwrap();
        assert_eq!(links, vec!["/a", "https://other.test/x", "/a"]);
    }

    #[test]
    fn test_extract_elements_assigns_ids_and_text() {
        let html = r#"<html><body>
            <a id="home" href="/">  Home </a>
            <button>Sign <b>in</b></button>
            <input type="text">
        </body></html>"#;

        let elements = HtmlLinkExtractor::extract_elements(html).unwrap();
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].element_id, "home");
        assert_eq!(elements[0].tag_name, "a");
        assert_eq!(elements[0].text, "Home");
        assert_eq!(elements[0].href.as_deref(), Some("/"));
        assert_eq!(elements[1].element_id, "button-1");
        assert_eq!(elements[1].text, "Sign in");
        assert_eq!(elements[1].href, None);
    }

    #[tokio::test]
    async fn test_non_html_page_has_no_links() {
        let mut page = LoadedPage::new(
            canonicalize("http://site.test/data.json").unwrap(),
            r#"{"href": "<a href='/x'>x</a>"}"#,
        );
        page.content_type = Some("application/json".to_string());

        let links = HtmlLinkExtractor::new().find_links(&page).await.unwrap();
        assert!(links.is_empty());
    }

    #[test]
    fn test_palette_colors() {
        let labeler = PaletteLabeler::new();
        assert_eq!(labeler.color_for("a"), Some("red"));
        assert_eq!(labeler.color_for("BUTTON"), Some("blue"));
        assert_eq!(labeler.color_for("input"), None);
    }
}
