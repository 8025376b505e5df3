//! Reachability pre-check and transient-error classification.

use std::time::Duration;

use crate::crawler::error::CrawlError;

/// Timeout for the reachability probe; generous pages are the renderer's
/// problem, this only has to see the server answer at all.
const REACHABILITY_TIMEOUT: Duration = Duration::from_secs(3);

/// Probe a URL before handing it to the renderer.
///
/// Failures are classified into a human-readable reason and returned as a
/// per-URL [`CrawlError::Unreachable`]; they never abort the crawl.
pub async fn check_reachable(client: &reqwest::Client, url: &str) -> Result<(), CrawlError> {
    let response = client
        .get(url)
        .timeout(REACHABILITY_TIMEOUT)
        .send()
        .await
        .map_err(|e| CrawlError::Unreachable {
            url: url.to_string(),
            reason: classify_request_error(&e),
        })?;

    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        return Err(CrawlError::Unreachable {
            url: url.to_string(),
            reason: format!("{} ({})", reason_for_status(status.as_u16()), status.as_u16()),
        });
    }

    Ok(())
}

fn classify_request_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        format!("request timed out: {error}")
    } else if error.is_connect() {
        format!("connection failed - check your internet connection: {error}")
    } else {
        format!("request error: {error}")
    }
}

fn reason_for_status(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "HTTP Error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[tokio::test]
    async fn test_reachable_url() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/ok")
            .with_status(200)
            .with_body("fine")
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let result = check_reachable(&client, &format!("{}/ok", server.url())).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_http_error_is_named() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/down")
            .with_status(503)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let result = check_reachable(&client, &format!("{}/down", server.url())).await;
        match result {
            Err(CrawlError::Unreachable { reason, .. }) => {
                assert!(reason.contains("Service Unavailable (503)"));
            }
            other => panic!("expected Unreachable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connection_failure() {
        // A port nothing is listening on.
        let client = reqwest::Client::new();
        let result = check_reachable(&client, "http://127.0.0.1:9/unreachable").await;
        match result {
            Err(CrawlError::Unreachable { reason, .. }) => {
                assert!(!reason.is_empty());
            }
            other => panic!("expected Unreachable, got {other:?}"),
        }
    }

    #[test]
    fn test_reason_for_status() {
        assert_eq!(reason_for_status(404), "Not Found");
        assert_eq!(reason_for_status(502), "Bad Gateway");
        assert_eq!(reason_for_status(418), "HTTP Error");
    }
}
