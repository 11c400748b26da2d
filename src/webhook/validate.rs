//! Webhook URL checks: syntax first, then a HEAD probe.
//!
//! Fails closed. Every error is logged and reported as "invalid".

use reqwest::Url;
use std::time::Duration;

/// Parses a webhook URL, accepting only absolute http(s) URLs.
pub fn parse_webhook_url(url: &str) -> Result<Url, WebhookUrlError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(WebhookUrlError::Empty);
    }

    let parsed = Url::parse(url).map_err(|e| WebhookUrlError::Malformed(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(WebhookUrlError::UnsupportedScheme(other.to_string())),
    }
}

/// True if `url` parses and answers a HEAD request with a 2xx status.
///
/// The probe is awaited by the caller, so it holds up whatever event loop
/// invoked it for at most `timeout`.
pub async fn validate(client: &reqwest::Client, url: &str, timeout: Duration) -> bool {
    let parsed = match parse_webhook_url(url) {
        Ok(parsed) => parsed,
        Err(WebhookUrlError::Empty) => return false,
        Err(e) => {
            log::error!("[WEBHOOK] {}", e);
            return false;
        }
    };

    match client.head(parsed).timeout(timeout).send().await {
        Ok(response) => {
            let status = response.status();
            if !status.is_success() {
                log::warn!("[WEBHOOK] Validation probe returned HTTP {}", status);
            }
            status.is_success()
        }
        Err(e) => {
            log::error!("[WEBHOOK] Validation probe failed: {}", e);
            false
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WebhookUrlError {
    #[error("Webhook URL is empty")]
    Empty,

    #[error("Malformed webhook URL: {0}")]
    Malformed(String),

    #[error("Unsupported webhook URL scheme: {0}")]
    UnsupportedScheme(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn parse_rejects_empty_and_garbage() {
        assert_eq!(parse_webhook_url("   "), Err(WebhookUrlError::Empty));
        assert!(matches!(
            parse_webhook_url("not a url"),
            Err(WebhookUrlError::Malformed(_))
        ));
        assert!(matches!(
            parse_webhook_url("ftp://example.com/hook"),
            Err(WebhookUrlError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn parse_accepts_discord_webhook() {
        let url = parse_webhook_url("https://discord.com/api/webhooks/123/abc").unwrap();
        assert_eq!(url.host_str(), Some("discord.com"));
    }

    #[tokio::test]
    async fn empty_url_is_invalid() {
        assert!(!validate(&reqwest::Client::new(), "", TIMEOUT).await);
    }

    #[tokio::test]
    async fn non_url_is_invalid() {
        assert!(!validate(&reqwest::Client::new(), "not a url", TIMEOUT).await);
    }

    #[tokio::test]
    async fn unreachable_url_is_invalid() {
        // Bind then drop a listener so the port is known to be closed.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let url = format!("http://127.0.0.1:{}/api/webhooks/1/abc", port);
        assert!(!validate(&reqwest::Client::new(), &url, TIMEOUT).await);
    }

    #[tokio::test]
    async fn reachable_url_answering_200_is_valid() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/api/webhooks/1/abc"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/api/webhooks/1/abc", server.uri());
        assert!(validate(&reqwest::Client::new(), &url, TIMEOUT).await);
    }

    #[tokio::test]
    async fn not_found_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = format!("{}/api/webhooks/1/gone", server.uri());
        assert!(!validate(&reqwest::Client::new(), &url, TIMEOUT).await);
    }
}
