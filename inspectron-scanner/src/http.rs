use crate::canonical::CanonicalUrl;
use crate::error::{CrawlError, Result};
use crate::page::{LoadedPage, PageLoader};
use futures::future::BoxFuture;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_USER_AGENT: &str = "Inspectron/0.1";

/// Page loader backed by a plain HTTP client.
///
/// The client is created in `start` and dropped in `close`, mirroring the
/// lifetime of a browser session.
pub struct HttpPageLoader {
    client: Option<Client>,
    user_agent: String,
    timeout: Duration,
    closed: bool,
}

impl HttpPageLoader {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(40))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            client: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout,
            closed: false,
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn is_started(&self) -> bool {
        self.client.is_some()
    }

    fn build_client(&self) -> Result<Client> {
        let connect_timeout = (self.timeout / 2).max(Duration::from_secs(1));
        Client::builder()
            .user_agent(self.user_agent.clone())
            .timeout(self.timeout)
            .connect_timeout(connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| CrawlError::ResourceAcquisition(e.to_string()))
    }

    async fn fetch(client: &Client, url: &CanonicalUrl) -> Result<LoadedPage> {
        debug!("Fetching {}", url);

        let response = client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| CrawlError::PageLoad {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status_code = response.status().as_u16();
        let final_url = Some(response.url().to_string()).filter(|u| u != url.as_str());
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response.text().await.map_err(|e| CrawlError::PageLoad {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(LoadedPage {
            url: url.clone(),
            final_url,
            status_code,
            content_type,
            body,
        })
    }
}

impl Default for HttpPageLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl PageLoader for HttpPageLoader {
    fn start(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.closed {
                return Err(CrawlError::InvalidState(
                    "page loader cannot be restarted after close".to_string(),
                ));
            }
            if self.client.is_some() {
                return Err(CrawlError::InvalidState(
                    "page loader already started".to_string(),
                ));
            }
            self.client = Some(self.build_client()?);
            debug!("HTTP page loader started");
            Ok(())
        })
    }

    fn load<'a>(&'a mut self, url: &'a CanonicalUrl) -> BoxFuture<'a, Result<LoadedPage>> {
        Box::pin(async move {
            let client = self.client.as_ref().ok_or_else(|| {
                CrawlError::InvalidState("page loader not started".to_string())
            })?;
            Self::fetch(client, url).await
        })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.client.take().is_some() {
                debug!("HTTP page loader closed");
            }
            self.closed = true;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::canonicalize;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    #[tokio::test]
    async fn test_load_before_start_is_invalid_state() {
        let mut loader = HttpPageLoader::new();
        let url = canonicalize("http://127.0.0.1:1/").unwrap();
        let result = loader.load(&url).await;
        assert!(matches!(result, Err(CrawlError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_load_returns_page_snapshot() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=utf-8")
                    .set_body_string("<html><body>hello</body></html>"),
            )
            .mount(&mock_server)
            .await;

        let mut loader = HttpPageLoader::new();
        loader.start().await.unwrap();

        let url = canonicalize(&mock_server.uri()).unwrap();
        let page = loader.load(&url).await.unwrap();

        assert_eq!(page.status_code, 200);
        assert!(page.is_html());
        assert!(page.body.contains("hello"));

        loader.close().await.unwrap();
        assert!(!loader.is_started());
    }

    #[tokio::test]
    async fn test_start_twice_and_restart_rejected() {
        let mut loader = HttpPageLoader::new();
        loader.start().await.unwrap();
        assert!(matches!(
            loader.start().await,
            Err(CrawlError::InvalidState(_))
        ));

        loader.close().await.unwrap();
        loader.close().await.unwrap();
        assert!(matches!(
            loader.start().await,
            Err(CrawlError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_connection_failure_is_page_load_error() {
        let mut loader = HttpPageLoader::with_timeout(Duration::from_secs(2));
        loader.start().await.unwrap();

        // Port 9 (discard) is not listening on loopback in test environments.
        let url = canonicalize("http://127.0.0.1:9/").unwrap();
        let result = loader.load(&url).await;
        assert!(matches!(result, Err(CrawlError::PageLoad { .. })));
    }
}
