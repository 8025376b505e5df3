//! The rendering seam: the crawler drives an external collaborator that
//! loads a URL in a browser-like environment and returns the final URL,
//! status, and rendered HTML.
//!
//! The default [`HttpRenderer`] is a plain reqwest-backed session that
//! follows redirects and can authenticate via OAuth2 client credentials; a
//! headless-browser implementation plugs in behind the same traits.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use tracing::debug;

use crate::crawler::config::{CrawlerConfig, OauthConfig};
use crate::crawler::error::CrawlError;

/// A rendered page as reported by the rendering collaborator
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// The URL the render actually ended on (post-redirect)
    pub final_url: String,

    /// HTTP status of the response
    pub status: u16,

    /// The fully rendered HTML
    pub html: String,
}

/// Opens rendering sessions.
#[allow(async_fn_in_trait)]
pub trait PageRenderer {
    /// The session type this renderer produces
    type Session: RenderSession;

    /// Open a fresh rendering session.
    async fn open(&self) -> Result<Self::Session, CrawlError>;
}

/// One rendering session, exclusively owned for the duration of a crawl.
#[allow(async_fn_in_trait)]
pub trait RenderSession {
    /// Render a URL. A [`CrawlError::RenderSession`] return means the
    /// session itself became unusable and must be reopened.
    async fn fetch(&mut self, url: &str) -> Result<RenderedPage, CrawlError>;

    /// Release the session.
    async fn close(self);
}

/// Default renderer: fetches pages over plain HTTP with reqwest.
///
/// No JavaScript execution; sites that need a real browser engine get one
/// through their own [`PageRenderer`] implementation.
#[derive(Debug, Clone)]
pub struct HttpRenderer {
    user_agent: String,
    page_timeout: std::time::Duration,
    oauth: Option<OauthConfig>,
}

impl HttpRenderer {
    /// Create a renderer from the crawl configuration.
    pub fn new(config: &CrawlerConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            page_timeout: config.page_timeout(),
            oauth: config.oauth.clone(),
        }
    }
}

impl PageRenderer for HttpRenderer {
    type Session = HttpRenderSession;

    async fn open(&self) -> Result<HttpRenderSession, CrawlError> {
        let mut headers = HeaderMap::new();
        if let Some(oauth) = &self.oauth {
            let token = fetch_client_credentials_token(oauth).await?;
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| CrawlError::RenderSession(format!("invalid bearer token: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .user_agent(&self.user_agent)
            .timeout(self.page_timeout)
            .default_headers(headers)
            .build()?;

        debug!("opened HTTP render session");
        Ok(HttpRenderSession { client })
    }
}

/// A reqwest-backed rendering session
#[derive(Debug)]
pub struct HttpRenderSession {
    client: reqwest::Client,
}

impl RenderSession for HttpRenderSession {
    async fn fetch(&mut self, url: &str) -> Result<RenderedPage, CrawlError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_builder() {
                CrawlError::RenderSession(e.to_string())
            } else {
                CrawlError::Http(e)
            }
        })?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let html = response.text().await?;

        Ok(RenderedPage {
            final_url,
            status,
            html,
        })
    }

    async fn close(self) {
        debug!("closed HTTP render session");
    }
}

/// Perform an OAuth2 client-credentials token fetch against the configured
/// token endpoint.
async fn fetch_client_credentials_token(oauth: &OauthConfig) -> Result<String, CrawlError> {
    let client = reqwest::Client::new();
    let response = client
        .post(&oauth.token_url)
        .form(&[
            ("grant_type", "client_credentials"),
            ("client_id", oauth.client_id.as_str()),
            ("client_secret", oauth.client_secret.as_str()),
        ])
        .send()
        .await?
        .error_for_status()?;

    let body: serde_json::Value = response.json().await?;
    body.get("access_token")
        .and_then(|token| token.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            CrawlError::RenderSession("token response missing access_token".to_string())
        })
}
