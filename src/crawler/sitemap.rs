//! Sitemap and robots.txt discovery.
//!
//! Resolves a sitemap URL (or a bare site) into a concrete list of page
//! URLs. Discovery across the candidate locations (`/sitemap.xml`,
//! `/sitemap_index.xml`, robots.txt `Sitemap:` directives) is best-effort:
//! individual fetch failures are logged and swallowed, and only a final
//! empty result is fatal.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::{debug, warn};
use url::Url;

use crate::crawler::error::CrawlError;

/// Extract page URLs from a sitemap document.
///
/// Every `<loc>` entry is resolved into an absolute URL against the sitemap's
/// own URL. A document with no `<loc>` entries and no `<urlset>` wrapper is
/// not treated as a sitemap at all; discovery falls back to probing the site's
/// well-known sitemap locations. An empty final result is a fatal
/// [`CrawlError::NoUrlsFound`].
pub async fn urls_from_sitemap(
    client: &reqwest::Client,
    sitemap_url: &str,
) -> Result<Vec<String>, CrawlError> {
    let (mut urls, saw_urlset) = fetch_sitemap_urls(client, sitemap_url).await?;

    if urls.is_empty() && !saw_urlset {
        debug!("{sitemap_url} does not look like a sitemap; probing site for one");
        urls = pages_for_site(client, sitemap_url).await;
    }

    if urls.is_empty() {
        return Err(CrawlError::NoUrlsFound {
            sitemap: sitemap_url.to_string(),
        });
    }

    Ok(urls)
}

/// Fetch one sitemap document and parse its `<loc>` entries.
/// Returns the entries plus whether a `<urlset>` wrapper was seen.
async fn fetch_sitemap_urls(
    client: &reqwest::Client,
    sitemap_url: &str,
) -> Result<(Vec<String>, bool), CrawlError> {
    let response = client.get(sitemap_url).send().await?.error_for_status()?;
    let body = response.text().await?;

    let (locations, saw_urlset) = parse_sitemap_document(&body);
    let urls = locations
        .into_iter()
        .map(|loc| ensure_absolute_url(sitemap_url, &loc))
        .collect();
    Ok((urls, saw_urlset))
}

/// Pull `<loc>` text contents out of a sitemap document. Lenient: parse
/// errors end the scan rather than failing, so non-XML input simply yields
/// nothing.
fn parse_sitemap_document(xml: &str) -> (Vec<String>, bool) {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    reader.config_mut().check_end_names = false;

    let mut locations = Vec::new();
    let mut saw_urlset = false;
    let mut in_loc = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = e.local_name();
                if name.as_ref().eq_ignore_ascii_case(b"urlset") {
                    saw_urlset = true;
                } else if name.as_ref().eq_ignore_ascii_case(b"loc") {
                    in_loc = true;
                }
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref().eq_ignore_ascii_case(b"loc") {
                    in_loc = false;
                }
            }
            Ok(Event::Text(t)) if in_loc => {
                if let Ok(text) = t.unescape() {
                    let text = text.trim();
                    if !text.is_empty() {
                        locations.push(text.to_string());
                    }
                }
            }
            Ok(Event::CData(t)) if in_loc => {
                let text = String::from_utf8_lossy(&t.into_inner()).trim().to_string();
                if !text.is_empty() {
                    locations.push(text);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("stopping sitemap parse on malformed XML: {e}");
                break;
            }
        }
    }

    (locations, saw_urlset)
}

/// Get the list of pages for a site from its sitemaps, best-effort.
///
/// Probes `/sitemap.xml` and `/sitemap_index.xml` under the site root, then
/// any sitemaps advertised by robots.txt, and unions the results.
pub(crate) async fn pages_for_site(client: &reqwest::Client, site: &str) -> Vec<String> {
    let site = site.trim_end_matches('/');
    let mut all_urls: HashSet<String> = HashSet::new();

    let mut candidates: Vec<String> = Vec::new();
    for path in ["/sitemap.xml", "/sitemap_index.xml"] {
        match Url::parse(site).and_then(|base| base.join(path)) {
            Ok(url) => candidates.push(url.to_string()),
            Err(e) => warn!("could not build sitemap URL for {site}{path}: {e}"),
        }
    }
    candidates.extend(sitemap_locations_from_robots(client, site).await);

    for sitemap_url in candidates {
        match fetch_sitemap_urls(client, &sitemap_url).await {
            Ok((urls, _)) => all_urls.extend(urls),
            Err(e) => warn!("error fetching sitemap {sitemap_url}: {e}"),
        }
    }

    all_urls.into_iter().collect()
}

/// Extract sitemap URLs from a site's robots.txt, best-effort.
async fn sitemap_locations_from_robots(client: &reqwest::Client, base_url: &str) -> Vec<String> {
    let mut sitemap_urls = HashSet::new();

    let robots_url = match Url::parse(base_url).and_then(|base| base.join("/robots.txt")) {
        Ok(url) => url,
        Err(e) => {
            warn!("could not build robots.txt URL for {base_url}: {e}");
            return Vec::new();
        }
    };

    let response = client
        .get(robots_url.as_str())
        .timeout(Duration::from_secs(10))
        .send()
        .await;
    match response {
        Ok(resp) if resp.status().is_success() => match resp.text().await {
            Ok(body) => {
                for line in body.lines() {
                    if line.to_lowercase().starts_with("sitemap:") {
                        if let Some(value) = line.splitn(2, ':').nth(1) {
                            sitemap_urls.insert(value.trim().to_string());
                        }
                    }
                }
            }
            Err(e) => warn!("error reading robots.txt: {e}"),
        },
        Ok(resp) => debug!("robots.txt returned HTTP {}", resp.status()),
        Err(e) => warn!("error fetching robots.txt: {e}"),
    }

    sitemap_urls.into_iter().collect()
}

/// Read one URL per line from a file, skipping blank lines. Each URL is
/// normalized via [`ensure_valid_url`].
pub fn read_urls_from_file(path: &Path) -> Result<Vec<String>, CrawlError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ensure_valid_url)
        .collect())
}

/// Prepend `https://` to a URL missing a scheme delimiter. A syntactic
/// default only, not a security check.
pub fn ensure_valid_url(url: &str) -> String {
    if !url.contains("://") {
        return format!("https://{url}");
    }
    url.to_string()
}

/// Resolve a possibly-relative URL against its source document's URL.
pub(crate) fn ensure_absolute_url(source_url: &str, maybe_relative_url: &str) -> String {
    if is_valid_url(maybe_relative_url) {
        return maybe_relative_url.to_string();
    }
    match Url::parse(source_url).and_then(|base| base.join(maybe_relative_url)) {
        Ok(url) => url.to_string(),
        Err(_) => maybe_relative_url.to_string(),
    }
}

/// Whether the string parses as an absolute URL with a host.
pub(crate) fn is_valid_url(url: &str) -> bool {
    Url::parse(url)
        .map(|parsed| parsed.has_host())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use std::io::Write;

    fn client() -> reqwest::Client {
        reqwest::Client::new()
    }

    #[test]
    fn test_ensure_valid_url() {
        assert_eq!(ensure_valid_url("example.com"), "https://example.com");
        assert_eq!(ensure_valid_url("http://example.com"), "http://example.com");
    }

    #[test]
    fn test_ensure_absolute_url() {
        assert_eq!(
            ensure_absolute_url("https://example.com/sitemap.xml", "/page"),
            "https://example.com/page"
        );
        assert_eq!(
            ensure_absolute_url("https://example.com/sitemap.xml", "https://other.com/p"),
            "https://other.com/p"
        );
    }

    #[test]
    fn test_parse_sitemap_document() {
        let xml = r#"<?xml version="1.0"?>
            <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
              <url><loc>https://example.com/a</loc></url>
              <url><loc> https://example.com/b </loc></url>
            </urlset>"#;
        let (locations, saw_urlset) = parse_sitemap_document(xml);
        assert_eq!(locations, vec!["https://example.com/a", "https://example.com/b"]);
        assert!(saw_urlset);
    }

    #[test]
    fn test_parse_non_sitemap_document() {
        let (locations, saw_urlset) = parse_sitemap_document("<html><body>hi</body></html>");
        assert!(locations.is_empty());
        assert!(!saw_urlset);
    }

    #[tokio::test]
    async fn test_urls_from_sitemap() {
        let mut server = Server::new_async().await;
        let body = format!(
            "<urlset><url><loc>{0}/a</loc></url><url><loc>/relative</loc></url></urlset>",
            server.url()
        );
        let _mock = server
            .mock("GET", "/sitemap.xml")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let urls = urls_from_sitemap(&client(), &format!("{}/sitemap.xml", server.url()))
            .await
            .unwrap();
        assert_eq!(urls.len(), 2);
        assert!(urls.contains(&format!("{}/a", server.url())));
        assert!(urls.contains(&format!("{}/relative", server.url())));
    }

    #[tokio::test]
    async fn test_fallback_to_site_probing_and_robots() {
        let mut server = Server::new_async().await;
        // The seed document is not a sitemap at all.
        let _mock = server
            .mock("GET", "/docs")
            .with_status(200)
            .with_body("<html><body>docs</body></html>")
            .create_async()
            .await;
        let _mock = server
            .mock("GET", "/sitemap.xml")
            .with_status(404)
            .create_async()
            .await;
        let _mock = server
            .mock("GET", "/sitemap_index.xml")
            .with_status(404)
            .create_async()
            .await;
        let _mock = server
            .mock("GET", "/robots.txt")
            .with_status(200)
            .with_body(format!(
                "User-agent: *\nSitemap: {}/custom-sitemap.xml\n",
                server.url()
            ))
            .create_async()
            .await;
        let _mock = server
            .mock("GET", "/custom-sitemap.xml")
            .with_status(200)
            .with_body(format!(
                "<urlset><url><loc>{}/from-robots</loc></url></urlset>",
                server.url()
            ))
            .create_async()
            .await;

        let urls = urls_from_sitemap(&client(), &format!("{}/docs", server.url()))
            .await
            .unwrap();
        assert_eq!(urls, vec![format!("{}/from-robots", server.url())]);
    }

    #[tokio::test]
    async fn test_no_urls_found_after_all_fallbacks() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/empty")
            .with_status(200)
            .with_body("<html></html>")
            .create_async()
            .await;
        // Everything else 404s (mockito default).

        let result = urls_from_sitemap(&client(), &format!("{}/empty", server.url())).await;
        assert!(matches!(result, Err(CrawlError::NoUrlsFound { .. })));
    }

    #[tokio::test]
    async fn test_empty_urlset_is_not_a_fallback_case() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/sitemap.xml")
            .with_status(200)
            .with_body("<urlset></urlset>")
            .create_async()
            .await;

        // A real (but empty) urlset skips site probing and fails directly.
        let result = urls_from_sitemap(&client(), &format!("{}/sitemap.xml", server.url())).await;
        assert!(matches!(result, Err(CrawlError::NoUrlsFound { .. })));
    }

    #[test]
    fn test_read_urls_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "example.com/a").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  https://example.com/b  ").unwrap();
        file.flush().unwrap();

        let urls = read_urls_from_file(file.path()).unwrap();
        assert_eq!(urls, vec!["https://example.com/a", "https://example.com/b"]);
    }
}
