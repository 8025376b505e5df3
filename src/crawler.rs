//! # Website Crawler Module
//!
//! This module owns the crawl pipeline: a URL frontier with global
//! deduplication, an SSRF safety gate applied before every fetch, sitemap and
//! robots.txt discovery, and an HTML-to-text extraction engine that preserves
//! document structure while stripping boilerplate.
//!
//! ## Key Components
//!
//! - `WebConnector`: the crawl controller, seeded per `CrawlMode`
//! - `CrawlerConfig`: configuration for validation, extraction, and pacing
//! - `ExtractedPage`: a crawled page reduced to url, title, and text
//! - `PageRenderer`/`RenderSession`: the seam to the page-rendering collaborator
//! - Content extraction utilities for converting HTML to clean text
//!
//! ## Usage
//!
//! The crawler is the first stage of a RAG pipeline; the sequence of
//! `ExtractedPage` records it produces feeds the chunking and embedding
//! stages downstream.

mod config;
mod connectivity;
mod connector;
mod content_extraction;
mod error;
mod frontier;
mod renderer;
mod sitemap;
mod validation;

pub use config::{CrawlerConfig, LinkTransform, OauthConfig};
pub use connector::WebConnector;
pub use content_extraction::{ParsedHtml, extract_page};
pub use error::CrawlError;
pub use renderer::{HttpRenderer, PageRenderer, RenderSession, RenderedPage};
pub use sitemap::{ensure_valid_url, read_urls_from_file, urls_from_sitemap};
pub use validation::{ValidationVerdict, validate};

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Represents an extracted page with its content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedPage {
    /// Final URL of the page (post-redirect)
    pub url: String,

    /// Title of the page, if the document had one
    pub title: Option<String>,

    /// Normalized text content of the page
    pub text: String,
}

/// How the frontier is seeded and whether link-following is active.
///
/// Fixed at crawl start; the variants differ only in seeding, not in loop
/// behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlMode {
    /// Seed with one URL and follow same-site links
    Recursive,
    /// Fetch exactly one page
    Single,
    /// Seed from a sitemap (or robots.txt discovery)
    Sitemap,
    /// Seed from a file with one URL per line
    UploadList,
}

impl FromStr for CrawlMode {
    type Err = CrawlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "recursive" => Ok(Self::Recursive),
            "single" => Ok(Self::Single),
            "sitemap" => Ok(Self::Sitemap),
            "upload" | "upload-list" => Ok(Self::UploadList),
            other => Err(CrawlError::InvalidInput(format!(
                "unknown crawl mode: {other}"
            ))),
        }
    }
}
