//! URL safety validation (SSRF guard).
//!
//! A few considerations, mirrored in the contract:
//! - DNS mappings change over time, so verdicts are never cached
//! - resolution is assumed cheap next to rendering a page, so re-validating
//!   every fetch (and every redirect target) is acceptable
//! - a hostname can resolve to many addresses (CDN fan-out); every one of
//!   them must be globally routable or the whole URL is rejected

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use tokio::net::lookup_host;
use tokio::time::timeout;
use tracing::debug;
use url::Url;

use crate::crawler::config::CrawlerConfig;

/// The outcome of validating one URL. Never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationVerdict {
    /// Whether the URL may be fetched
    pub allowed: bool,

    /// Why the URL was rejected, when it was
    pub reason: Option<String>,
}

impl ValidationVerdict {
    fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    fn rejected(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Validate a URL before fetching it.
///
/// Rejects non-http(s) schemes and URLs without a hostname, then resolves
/// the hostname and requires every resolved address to be globally routable.
/// DNS failures and non-global addresses are distinct rejection reasons; all
/// failures surface as a verdict, never an error. When `validate_urls` is
/// disabled in the configuration the verdict is always allowed.
pub async fn validate(url: &str, config: &CrawlerConfig) -> ValidationVerdict {
    if !config.validate_urls {
        return ValidationVerdict::allowed();
    }

    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(e) => return ValidationVerdict::rejected(format!("url_parse_failed: {e}")),
    };

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return ValidationVerdict::rejected("url_scheme_not_http: URL must be of scheme http(s)");
    }

    let Some(host) = parsed.host_str() else {
        return ValidationVerdict::rejected("missing_hostname: URL must include a hostname");
    };
    // Url keeps brackets around IPv6 literals; lookup_host wants them bare.
    let host = host.trim_start_matches('[').trim_end_matches(']');

    let addresses = match timeout(config.dns_timeout(), lookup_host((host, 0u16))).await {
        Ok(Ok(addresses)) => addresses.collect::<Vec<_>>(),
        Ok(Err(e)) => {
            return ValidationVerdict::rejected(format!(
                "dns_resolution_failed: DNS resolution failed for {host}: {e}"
            ));
        }
        Err(_) => {
            return ValidationVerdict::rejected(format!(
                "dns_resolution_failed: DNS resolution timed out for {host}"
            ));
        }
    };

    if addresses.is_empty() {
        return ValidationVerdict::rejected(format!(
            "dns_resolution_failed: no addresses found for {host}"
        ));
    }

    for address in &addresses {
        let ip = address.ip();
        if !is_global_ip(ip) {
            return ValidationVerdict::rejected(format!(
                "non_global_address: {ip} is not globally routable; reading loopback, \
                 link-local, or private ranges is not allowed"
            ));
        }
    }

    debug!("validated {url} ({} addresses)", addresses.len());
    ValidationVerdict::allowed()
}

/// Whether an address is globally routable. Covers the ranges the crawler
/// must never touch: loopback, link-local, private, and the assorted
/// reserved/special-purpose blocks.
fn is_global_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_global_ipv4(v4),
        IpAddr::V6(v6) => is_global_ipv6(v6),
    }
}

fn is_global_ipv4(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();
    !(ip.is_unspecified()
        || ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_broadcast()
        || ip.is_documentation()
        || ip.is_multicast()
        // "this network" 0.0.0.0/8
        || octets[0] == 0
        // shared address space (CGNAT) 100.64.0.0/10
        || (octets[0] == 100 && (octets[1] & 0xc0) == 64)
        // benchmarking 198.18.0.0/15
        || (octets[0] == 198 && (octets[1] & 0xfe) == 18)
        // reserved 240.0.0.0/4
        || octets[0] >= 240)
}

fn is_global_ipv6(ip: Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_global_ipv4(v4);
    }

    let segments = ip.segments();
    !(ip.is_unspecified()
        || ip.is_loopback()
        || ip.is_unique_local()
        || ip.is_unicast_link_local()
        || ip.is_multicast()
        // documentation 2001:db8::/32
        || (segments[0] == 0x2001 && segments[1] == 0x0db8))
}
