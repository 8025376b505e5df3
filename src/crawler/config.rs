//! # Crawler Configuration Module
//!
//! This module provides configuration options for the web crawler, covering
//! the SSRF validation switch, boilerplate-removal lists, link handling, the
//! optional readability extraction path, and fetch pacing. It uses a builder
//! pattern for flexible configuration and can also be populated from the
//! environment.
//!
//! ## Key Components
//!
//! - `CrawlerConfig`: the main configuration struct
//! - `CrawlerConfigBuilder`: builder pattern implementation
//! - `LinkTransform`: how `<a>` text is rendered during extraction
//! - `OauthConfig`: OAuth2 client-credentials settings for the renderer
//!
//! ## Environment surface
//!
//! `from_env()` recognizes `WEB_CONNECTOR_IGNORED_CLASSES`,
//! `WEB_CONNECTOR_IGNORED_ELEMENTS`, `WEB_CONNECTOR_VALIDATE_URLS`,
//! `HTML_BASED_CONNECTOR_TRANSFORM_LINKS_STRATEGY`, `PARSE_WITH_READABILITY`,
//! and `WEB_CONNECTOR_OAUTH_CLIENT_ID`/`_CLIENT_SECRET`/`_TOKEN_URL`.

use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// How link text is rendered during extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkTransform {
    /// Emit plain link text with no markup
    #[default]
    Strip,
    /// Wrap link text as `[text](href)`
    Markdown,
}

impl FromStr for LinkTransform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strip" => Ok(Self::Strip),
            "markdown" => Ok(Self::Markdown),
            other => Err(format!("unknown link transform strategy: {other}")),
        }
    }
}

/// OAuth2 client-credentials configuration for authenticated rendering
#[derive(Debug, Clone)]
pub struct OauthConfig {
    /// OAuth2 client id
    pub client_id: String,

    /// OAuth2 client secret
    pub client_secret: String,

    /// Token endpoint URL
    pub token_url: String,
}

/// Configuration for the crawler
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// CSS classes whose elements are dropped before extraction
    pub ignored_classes: Vec<String>,

    /// Tag names dropped before extraction
    pub ignored_elements: Vec<String>,

    /// Whether the SSRF validator is active
    pub validate_urls: bool,

    /// How `<a>` text is rendered
    pub link_transform: LinkTransform,

    /// Whether to also drop Mintlify-style utility classes (sticky, hidden)
    pub mintlify_cleanup: bool,

    /// Whether to attempt readability main-content extraction first
    pub parse_with_readability: bool,

    /// Separator emitted between table cells
    pub table_cell_separator: String,

    /// OAuth2 client-credentials settings for the renderer, if any
    pub oauth: Option<OauthConfig>,

    /// Delay in milliseconds between page fetches (0 disables pacing)
    pub rate_limit_ms: u64,

    /// Timeout in seconds for DNS resolution during validation
    pub dns_timeout_secs: u64,

    /// Timeout in seconds for rendering a single page
    pub page_timeout_secs: u64,

    /// User agent to use for requests
    pub user_agent: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            ignored_classes: vec!["sidebar".to_string(), "footer".to_string()],
            ignored_elements: vec![
                "nav".to_string(),
                "footer".to_string(),
                "meta".to_string(),
                "script".to_string(),
                "style".to_string(),
                "symbol".to_string(),
                "aside".to_string(),
            ],
            validate_urls: false,
            link_transform: LinkTransform::Strip,
            mintlify_cleanup: true,
            parse_with_readability: false,
            table_cell_separator: "\t".to_string(),
            oauth: None,
            rate_limit_ms: 0,
            dns_timeout_secs: 10,
            page_timeout_secs: 60,
            user_agent: format!("webharvest/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Builder for CrawlerConfig
#[derive(Debug, Default)]
pub struct CrawlerConfigBuilder {
    config: CrawlerConfig,
}

impl CrawlerConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: CrawlerConfig::default(),
        }
    }

    /// Set the CSS classes whose elements are dropped before extraction
    pub fn ignored_classes(mut self, ignored_classes: Vec<String>) -> Self {
        self.config.ignored_classes = ignored_classes;
        self
    }

    /// Set the tag names dropped before extraction
    pub fn ignored_elements(mut self, ignored_elements: Vec<String>) -> Self {
        self.config.ignored_elements = ignored_elements;
        self
    }

    /// Enable or disable the SSRF validator
    pub fn validate_urls(mut self, validate_urls: bool) -> Self {
        self.config.validate_urls = validate_urls;
        self
    }

    /// Set how `<a>` text is rendered
    pub fn link_transform(mut self, link_transform: LinkTransform) -> Self {
        self.config.link_transform = link_transform;
        self
    }

    /// Enable or disable Mintlify utility-class cleanup
    pub fn mintlify_cleanup(mut self, mintlify_cleanup: bool) -> Self {
        self.config.mintlify_cleanup = mintlify_cleanup;
        self
    }

    /// Enable or disable the readability extraction path
    pub fn parse_with_readability(mut self, parse_with_readability: bool) -> Self {
        self.config.parse_with_readability = parse_with_readability;
        self
    }

    /// Set the separator emitted between table cells
    pub fn table_cell_separator(mut self, separator: impl Into<String>) -> Self {
        self.config.table_cell_separator = separator.into();
        self
    }

    /// Set the OAuth2 client-credentials configuration
    pub fn oauth(mut self, oauth: OauthConfig) -> Self {
        self.config.oauth = Some(oauth);
        self
    }

    /// Set the delay in milliseconds between page fetches
    pub fn rate_limit_ms(mut self, rate_limit_ms: u64) -> Self {
        self.config.rate_limit_ms = rate_limit_ms;
        self
    }

    /// Set the DNS resolution timeout in seconds
    pub fn dns_timeout_secs(mut self, dns_timeout_secs: u64) -> Self {
        self.config.dns_timeout_secs = dns_timeout_secs;
        self
    }

    /// Set the page render timeout in seconds
    pub fn page_timeout_secs(mut self, page_timeout_secs: u64) -> Self {
        self.config.page_timeout_secs = page_timeout_secs;
        self
    }

    /// Set the user agent to use for requests
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Build the configuration
    pub fn build(self) -> CrawlerConfig {
        self.config
    }
}

impl CrawlerConfig {
    /// Create a new builder
    pub fn builder() -> CrawlerConfigBuilder {
        CrawlerConfigBuilder::new()
    }

    /// Build a configuration from the recognized environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(classes) = std::env::var("WEB_CONNECTOR_IGNORED_CLASSES") {
            config.ignored_classes = split_list(&classes);
        }
        if let Ok(elements) = std::env::var("WEB_CONNECTOR_IGNORED_ELEMENTS") {
            config.ignored_elements = split_list(&elements);
        }
        config.validate_urls = std::env::var("WEB_CONNECTOR_VALIDATE_URLS")
            .map(|v| !v.is_empty())
            .unwrap_or(false);
        if let Ok(strategy) = std::env::var("HTML_BASED_CONNECTOR_TRANSFORM_LINKS_STRATEGY") {
            match strategy.parse() {
                Ok(transform) => config.link_transform = transform,
                Err(e) => warn!("{e}; defaulting to strip"),
            }
        }
        config.parse_with_readability = std::env::var("PARSE_WITH_READABILITY")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let client_id = std::env::var("WEB_CONNECTOR_OAUTH_CLIENT_ID").ok();
        let client_secret = std::env::var("WEB_CONNECTOR_OAUTH_CLIENT_SECRET").ok();
        let token_url = std::env::var("WEB_CONNECTOR_OAUTH_TOKEN_URL").ok();
        if let (Some(client_id), Some(client_secret), Some(token_url)) =
            (client_id, client_secret, token_url)
        {
            config.oauth = Some(OauthConfig {
                client_id,
                client_secret,
                token_url,
            });
        }

        config
    }

    /// Get the pacing delay as a Duration
    pub fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }

    /// Get the DNS resolution timeout as a Duration
    pub fn dns_timeout(&self) -> Duration {
        Duration::from_secs(self.dns_timeout_secs)
    }

    /// Get the page render timeout as a Duration
    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
