//! The crawl controller: owns the frontier state machine and drives
//! validate → reachability → render → extract for every URL, feeding
//! discovered links back into the frontier in recursive mode.
//!
//! Per-page failures are absorbed into a running "last error" value and the
//! loop continues; only seeding-time and discovery-time failures propagate
//! to the caller.

use std::path::Path;

use scraper::Html;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::crawler::config::CrawlerConfig;
use crate::crawler::connectivity::check_reachable;
use crate::crawler::content_extraction::{extract_page, internal_links};
use crate::crawler::error::CrawlError;
use crate::crawler::frontier::Frontier;
use crate::crawler::renderer::{PageRenderer, RenderSession, RenderedPage};
use crate::crawler::sitemap::{ensure_valid_url, read_urls_from_file, urls_from_sitemap};
use crate::crawler::validation::validate;
use crate::crawler::{CrawlMode, ExtractedPage};

/// Crawls a site (or a fixed URL list) and produces [`ExtractedPage`]
/// records.
///
/// One `WebConnector` drives one crawl invocation; the frontier is owned by
/// [`WebConnector::load`] and discarded when it returns.
pub struct WebConnector {
    base_url: String,
    mode: CrawlMode,
    config: CrawlerConfig,
    http: reqwest::Client,
    last_error: Option<String>,
}

impl WebConnector {
    /// Create a connector. For [`CrawlMode::UploadList`] the base is a file
    /// path; for every other mode it is a URL.
    pub fn new(base_url: impl Into<String>, mode: CrawlMode, config: CrawlerConfig) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.into(),
            mode,
            config,
            http,
            last_error: None,
        }
    }

    /// The most recent per-page failure, kept for diagnostics. Individual
    /// page failures never abort a crawl, so a caller that got an empty
    /// result can consult this to find out why.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Populate the seed list according to the crawl mode.
    async fn seed(&self) -> Result<Vec<String>, CrawlError> {
        match self.mode {
            CrawlMode::Recursive | CrawlMode::Single => {
                Ok(vec![ensure_valid_url(&self.base_url)])
            }
            CrawlMode::Sitemap => {
                urls_from_sitemap(&self.http, &ensure_valid_url(&self.base_url)).await
            }
            CrawlMode::UploadList => read_urls_from_file(Path::new(&self.base_url)),
        }
    }

    /// Run the crawl to completion and return the extracted pages.
    ///
    /// A crawl that visits zero pages successfully still returns an empty
    /// sequence as long as seeding succeeded. The rendering session is
    /// released on every exit path.
    #[instrument(skip(self, renderer), fields(base_url = %self.base_url, mode = ?self.mode))]
    pub async fn load<R: PageRenderer>(
        &mut self,
        renderer: &R,
    ) -> Result<Vec<ExtractedPage>, CrawlError> {
        info!("starting {:?} crawl on {}", self.mode, self.base_url);

        let mut session = renderer.open().await?;

        let seeds = match self.seed().await {
            Ok(seeds) if !seeds.is_empty() => seeds,
            Ok(_) => {
                session.close().await;
                return Err(CrawlError::NoPagesToVisit);
            }
            Err(e) => {
                session.close().await;
                return Err(e);
            }
        };

        let base_url = seeds[0].clone();
        let recursive = self.mode == CrawlMode::Recursive;
        let mut frontier = Frontier::with_seeds(seeds);
        let mut documents = Vec::new();

        while let Some(current_url) = frontier.pop() {
            if !frontier.mark_visited(&current_url) {
                continue;
            }

            let verdict = validate(&current_url, &self.config).await;
            if !verdict.allowed {
                let err = CrawlError::SecurityRejection {
                    url: current_url.clone(),
                    reason: verdict.reason.unwrap_or_default(),
                };
                self.record(err.to_string());
                continue;
            }

            info!("visiting {current_url}");

            if let Err(e) = check_reachable(&self.http, &current_url).await {
                self.record(e.to_string());
                continue;
            }

            let rendered = match self
                .fetch_with_restart(renderer, &mut session, &current_url)
                .await
            {
                Ok(rendered) => rendered,
                Err(e) => {
                    self.record(format!("error indexing {current_url}: {e}"));
                    continue;
                }
            };

            let mut current_url = current_url;
            if rendered.final_url != current_url {
                info!("redirected to {}", rendered.final_url);
                let verdict = validate(&rendered.final_url, &self.config).await;
                if !verdict.allowed {
                    let err = CrawlError::SecurityRejection {
                        url: rendered.final_url.clone(),
                        reason: verdict.reason.unwrap_or_default(),
                    };
                    self.record(err.to_string());
                    continue;
                }
                if frontier.is_visited(&rendered.final_url) {
                    info!("redirected page already indexed");
                    continue;
                }
                frontier.mark_visited(&rendered.final_url);
                current_url = rendered.final_url.clone();
            }

            let parsed_document = Html::parse_document(&rendered.html);

            if recursive {
                for link in internal_links(&base_url, &current_url, &parsed_document) {
                    frontier.push_if_unvisited(link);
                }
                debug!("{} URLs pending", frontier.pending());
            }

            if (400..600).contains(&rendered.status) {
                self.record(format!(
                    "skipped indexing {current_url} due to HTTP {} response",
                    rendered.status
                ));
                continue;
            }

            let parsed = extract_page(&rendered.html, &self.config, &[]);
            documents.push(ExtractedPage {
                url: current_url,
                title: parsed.title,
                text: parsed.text,
            });

            if self.config.rate_limit_ms > 0 {
                tokio::time::sleep(self.config.rate_limit()).await;
            }
        }

        session.close().await;
        info!("crawl finished with {} pages", documents.len());
        Ok(documents)
    }

    /// Render one URL, restarting the session exactly once if it reports
    /// itself unusable. Timeouts count as per-URL failures, not session
    /// failures.
    async fn fetch_with_restart<R: PageRenderer>(
        &self,
        renderer: &R,
        session: &mut R::Session,
        url: &str,
    ) -> Result<RenderedPage, CrawlError> {
        let deadline = self.config.page_timeout();

        match timeout(deadline, session.fetch(url)).await {
            Ok(Ok(rendered)) => Ok(rendered),
            Ok(Err(CrawlError::RenderSession(reason))) => {
                warn!("render session failed ({reason}); restarting session");
                let fresh = renderer.open().await?;
                let broken = std::mem::replace(session, fresh);
                broken.close().await;

                match timeout(deadline, session.fetch(url)).await {
                    Ok(result) => result,
                    Err(_) => Err(CrawlError::Unreachable {
                        url: url.to_string(),
                        reason: "page render timed out".to_string(),
                    }),
                }
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(CrawlError::Unreachable {
                url: url.to_string(),
                reason: "page render timed out".to_string(),
            }),
        }
    }

    fn record(&mut self, message: String) {
        warn!("{message}");
        self.last_error = Some(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::renderer::HttpRenderer;
    use mockito::{Matcher, Server, ServerGuard};
    use std::collections::VecDeque;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// A renderer whose sessions replay scripted responses.
    #[derive(Clone)]
    struct ScriptedRenderer {
        sessions: Arc<Mutex<VecDeque<ScriptedSession>>>,
        opened: Arc<AtomicUsize>,
    }

    impl ScriptedRenderer {
        fn new(sessions: Vec<ScriptedSession>) -> Self {
            Self {
                sessions: Arc::new(Mutex::new(sessions.into())),
                opened: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    struct ScriptedSession {
        responses: VecDeque<Result<RenderedPage, CrawlError>>,
    }

    impl ScriptedSession {
        fn new(responses: Vec<Result<RenderedPage, CrawlError>>) -> Self {
            Self {
                responses: responses.into(),
            }
        }
    }

    impl PageRenderer for ScriptedRenderer {
        type Session = ScriptedSession;

        async fn open(&self) -> Result<ScriptedSession, CrawlError> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            self.sessions
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| CrawlError::RenderSession("no more sessions".to_string()))
        }
    }

    impl RenderSession for ScriptedSession {
        async fn fetch(&mut self, _url: &str) -> Result<RenderedPage, CrawlError> {
            self.responses
                .pop_front()
                .unwrap_or_else(|| Err(CrawlError::RenderSession("script exhausted".to_string())))
        }

        async fn close(self) {}
    }

    fn rendered(url: &str, status: u16, html: &str) -> RenderedPage {
        RenderedPage {
            final_url: url.to_string(),
            status,
            html: html.to_string(),
        }
    }

    /// Mockito server that answers 200 to everything, so reachability
    /// pre-checks pass while the renderer is scripted.
    async fn reachable_server() -> ServerGuard {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", Matcher::Regex(".*".to_string()))
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;
        server
    }

    #[tokio::test]
    async fn test_single_mode_produces_one_page() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/page")
            .with_status(200)
            .with_body("<html><head><title>One</title></head><body><p>hello</p></body></html>")
            .create_async()
            .await;

        let config = CrawlerConfig::default();
        let renderer = HttpRenderer::new(&config);
        let url = format!("{}/page", server.url());
        let mut connector = WebConnector::new(url.as_str(), CrawlMode::Single, config);

        let pages = connector.load(&renderer).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].url, url);
        assert_eq!(pages[0].title.as_deref(), Some("One"));
        assert_eq!(pages[0].text, "hello");
    }

    #[tokio::test]
    async fn test_redirect_reattributes_and_deduplicates() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/a")
            .with_status(301)
            .with_header("location", &format!("{}/b", server.url()))
            .create_async()
            .await;
        let _mock = server
            .mock("GET", "/b")
            .with_status(200)
            .with_body("<html><body><p>b content</p></body></html>")
            .create_async()
            .await;

        let config = CrawlerConfig::default();
        let renderer = HttpRenderer::new(&config);
        let mut connector =
            WebConnector::new(format!("{}/a", server.url()), CrawlMode::Single, config);

        let pages = connector.load(&renderer).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].url, format!("{}/b", server.url()));
    }

    #[tokio::test]
    async fn test_redirect_to_visited_page_is_skipped() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/a")
            .with_status(301)
            .with_header("location", &format!("{}/b", server.url()))
            .create_async()
            .await;
        let _mock = server
            .mock("GET", "/b")
            .with_status(200)
            .with_body("<html><body><p>b content</p></body></html>")
            .create_async()
            .await;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}/a", server.url()).unwrap();
        writeln!(file, "{}/b", server.url()).unwrap();
        file.flush().unwrap();

        let config = CrawlerConfig::default();
        let renderer = HttpRenderer::new(&config);
        let mut connector = WebConnector::new(
            file.path().to_str().unwrap(),
            CrawlMode::UploadList,
            config,
        );

        // /b is processed first (LIFO); /a then redirects onto the already
        // visited /b and produces no duplicate document.
        let pages = connector.load(&renderer).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].url, format!("{}/b", server.url()));
    }

    #[tokio::test]
    async fn test_recursive_mode_follows_internal_links() {
        let mut server = Server::new_async().await;
        let root = format!("{}/", server.url());
        let _mock = server
            .mock("GET", "/")
            .with_status(200)
            .with_body(format!(
                "<html><body><p>root</p><a href=\"/child\">child</a>\
                 <a href=\"{root}\">self</a></body></html>"
            ))
            .create_async()
            .await;
        let _mock = server
            .mock("GET", "/child")
            .with_status(200)
            .with_body("<html><body><p>child page</p></body></html>")
            .create_async()
            .await;

        let config = CrawlerConfig::default();
        let renderer = HttpRenderer::new(&config);
        let mut connector = WebConnector::new(root.as_str(), CrawlMode::Recursive, config);

        let mut pages = connector.load(&renderer).await.unwrap();
        pages.sort_by(|a, b| a.url.cmp(&b.url));
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].url, root);
        assert_eq!(pages[1].url, format!("{}/child", server.url()));
    }

    #[tokio::test]
    async fn test_sitemap_mode_seeds_from_sitemap() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/sitemap.xml")
            .with_status(200)
            .with_body(format!(
                "<urlset><url><loc>{}/s1</loc></url></urlset>",
                server.url()
            ))
            .create_async()
            .await;
        let _mock = server
            .mock("GET", "/s1")
            .with_status(200)
            .with_body("<html><body><p>from sitemap</p></body></html>")
            .create_async()
            .await;

        let config = CrawlerConfig::default();
        let renderer = HttpRenderer::new(&config);
        let mut connector = WebConnector::new(
            format!("{}/sitemap.xml", server.url()),
            CrawlMode::Sitemap,
            config,
        );

        let pages = connector.load(&renderer).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].text, "from sitemap");
    }

    #[tokio::test]
    async fn test_empty_upload_list_is_fatal() {
        let file = tempfile::NamedTempFile::new().unwrap();

        let config = CrawlerConfig::default();
        let renderer = HttpRenderer::new(&config);
        let mut connector = WebConnector::new(
            file.path().to_str().unwrap(),
            CrawlMode::UploadList,
            config,
        );

        let result = connector.load(&renderer).await;
        assert!(matches!(result, Err(CrawlError::NoPagesToVisit)));
    }

    #[tokio::test]
    async fn test_error_status_skips_page_without_aborting() {
        let server = reachable_server().await;
        let url = format!("{}/flaky", server.url());

        let renderer = ScriptedRenderer::new(vec![ScriptedSession::new(vec![Ok(rendered(
            &url, 503, "<html><body>down</body></html>",
        ))])]);

        let mut connector = WebConnector::new(url.as_str(), CrawlMode::Single, CrawlerConfig::default());
        let pages = connector.load(&renderer).await.unwrap();

        assert!(pages.is_empty());
        assert!(connector.last_error().unwrap().contains("HTTP 503"));
    }

    #[tokio::test]
    async fn test_session_restarted_once_on_hard_failure() {
        let server = reachable_server().await;
        let url = format!("{}/page", server.url());

        let renderer = ScriptedRenderer::new(vec![
            ScriptedSession::new(vec![Err(CrawlError::RenderSession(
                "browser died".to_string(),
            ))]),
            ScriptedSession::new(vec![Ok(rendered(
                &url,
                200,
                "<html><body><p>recovered</p></body></html>",
            ))]),
        ]);

        let mut connector = WebConnector::new(url.as_str(), CrawlMode::Single, CrawlerConfig::default());
        let pages = connector.load(&renderer).await.unwrap();

        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].text, "recovered");
        assert_eq!(renderer.opened.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_persistent_session_failure_skips_url() {
        let server = reachable_server().await;
        let url = format!("{}/page", server.url());

        let renderer = ScriptedRenderer::new(vec![
            ScriptedSession::new(vec![Err(CrawlError::RenderSession("dead".to_string()))]),
            ScriptedSession::new(vec![Err(CrawlError::RenderSession(
                "still dead".to_string(),
            ))]),
        ]);

        let mut connector = WebConnector::new(url.as_str(), CrawlMode::Single, CrawlerConfig::default());
        let pages = connector.load(&renderer).await.unwrap();

        assert!(pages.is_empty());
        assert!(connector.last_error().unwrap().contains("render session"));
        assert_eq!(renderer.opened.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_validation_rejects_local_server() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/page")
            .with_status(200)
            .with_body("<html><body>secret</body></html>")
            .create_async()
            .await;

        let config = CrawlerConfig::builder().validate_urls(true).build();
        let renderer = HttpRenderer::new(&config);
        let mut connector =
            WebConnector::new(format!("{}/page", server.url()), CrawlMode::Single, config);

        let pages = connector.load(&renderer).await.unwrap();
        assert!(pages.is_empty());
        assert!(connector.last_error().unwrap().contains("non_global_address"));
    }
}
