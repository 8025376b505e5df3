//! Error types for the crawler module

use crate::error::Error as CrateError;
use thiserror::Error;

/// Error type for crawler operations
#[derive(Debug, Error)]
pub enum CrawlError {
    /// Bad seed configuration; fatal before any fetch
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Seeding produced an empty URL list
    #[error("no pages to visit")]
    NoPagesToVisit,

    /// Sitemap discovery exhausted all fallbacks without finding a URL
    #[error(
        "no URLs found in sitemap {sitemap}. Try the 'single' or 'recursive' crawl modes instead"
    )]
    NoUrlsFound {
        /// The sitemap URL that yielded nothing
        sitemap: String,
    },

    /// SSRF check rejected the URL; per-URL, non-fatal
    #[error("security rejection for {url}: {reason}")]
    SecurityRejection {
        /// The rejected URL
        url: String,
        /// Why validation failed
        reason: String,
    },

    /// Reachability pre-check or page fetch failed; per-URL, non-fatal
    #[error("unable to reach {url}: {reason}")]
    Unreachable {
        /// The unreachable URL
        url: String,
        /// Classified failure reason
        reason: String,
    },

    /// The rendering session became unusable
    #[error("render session failure: {0}")]
    RenderSession(String),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing error
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// I/O error (upload list reads)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CrawlError> for CrateError {
    fn from(err: CrawlError) -> Self {
        match err {
            CrawlError::Http(e) => CrateError::Http(e),
            CrawlError::Io(e) => CrateError::Io(e),
            CrawlError::InvalidInput(msg) => CrateError::InvalidRequest(msg),
            _ => CrateError::Crawl(err.to_string()),
        }
    }
}
