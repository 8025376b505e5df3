//! # webharvest CLI
//!
//! Command-line front end for the crawler: runs one crawl and writes the
//! extracted pages as JSON lines, ready to be piped into a chunking or
//! embedding stage.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use webharvest::crawler::{
    CrawlMode, CrawlerConfig, HttpRenderer, LinkTransform, WebConnector,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Crawl a website and emit extracted pages as JSON lines", long_about = None)]
struct Cli {
    /// URL to crawl (or a file path in upload mode)
    #[arg(required = true)]
    url: String,

    /// Crawl mode: recursive, single, sitemap, or upload
    #[arg(short, long, default_value = "single")]
    mode: String,

    /// Write output to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable the SSRF URL validator
    #[arg(long)]
    validate_urls: bool,

    /// Render links as markdown instead of stripping them
    #[arg(long)]
    markdown_links: bool,

    /// Try readability main-content extraction before the serializer
    #[arg(long)]
    readability: bool,

    /// Delay in milliseconds between page fetches
    #[arg(short, long, default_value = "0")]
    rate: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mode: CrawlMode = cli.mode.parse()?;

    let mut config = CrawlerConfig::from_env();
    config.rate_limit_ms = cli.rate;
    if cli.validate_urls {
        config.validate_urls = true;
    }
    if cli.markdown_links {
        config.link_transform = LinkTransform::Markdown;
    }
    if cli.readability {
        config.parse_with_readability = true;
    }

    let renderer = HttpRenderer::new(&config);
    let mut connector = WebConnector::new(cli.url.as_str(), mode, config);
    let pages = connector.load(&renderer).await?;

    if pages.is_empty() {
        if let Some(last_error) = connector.last_error() {
            info!("crawl produced no pages; last error: {last_error}");
        }
    }

    let mut out: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(
            std::fs::File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout()),
    };

    for page in &pages {
        serde_json::to_writer(&mut out, page)?;
        writeln!(out)?;
    }
    out.flush()?;

    info!("wrote {} pages", pages.len());
    Ok(())
}
