//! # webharvest - Web Crawling and Content Extraction for RAG
//!
//! This crate implements the content-acquisition stage of a RAG pipeline:
//! given a seed URL, a sitemap, or an uploaded list of URLs, it discovers a
//! bounded set of reachable pages, fetches each one safely, and converts raw
//! HTML into normalized structured text ready for downstream chunking and
//! embedding.
//!
//! ## Features
//!
//! - Four crawl modes: recursive, single page, sitemap, and upload list
//! - SSRF guard that re-validates every URL (and every redirect target)
//!   against loopback, link-local, and private address ranges
//! - Sitemap and robots.txt discovery with best-effort fallbacks
//! - Structure-preserving HTML to text conversion (headings, lists, tables,
//!   links) with boilerplate removal
//! - Pluggable page renderer behind a trait, with a reqwest-backed default
//!   that supports OAuth2 client-credentials authentication
//! - Async API with Tokio
//! - Robust error handling and logging
//!
//! ## Example
//!
//! ```rust,no_run
//! use webharvest::crawler::{CrawlMode, CrawlerConfig, HttpRenderer, WebConnector};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CrawlerConfig::default();
//!     let renderer = HttpRenderer::new(&config);
//!
//!     let mut connector =
//!         WebConnector::new("https://example.com/docs", CrawlMode::Recursive, config);
//!     let pages = connector.load(&renderer).await?;
//!
//!     for page in pages {
//!         println!("{}: {} bytes of text", page.url, page.text.len());
//!     }
//!     Ok(())
//! }
//! ```

mod error;

pub mod crawler;

pub use error::Error;

/// Re-export of common types for public use
pub mod prelude {
    pub use crate::crawler::{CrawlMode, CrawlerConfig, ExtractedPage, WebConnector};
    pub use crate::error::Error;
    pub use crate::error::Result;
}
