//! Fire-and-forget multipart POST to the webhook.
//!
//! Never retries, never blocks the caller. Whatever comes back is drained
//! and dropped.

use super::body::WebhookMessage;
use super::validate::{parse_webhook_url, WebhookUrlError};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use tokio::task::JoinHandle;

pub const PAYLOAD_FIELD: &str = "payload_json";
pub const FILE_FIELD: &str = "file";
pub const FILE_NAME: &str = "image.png";
pub const PNG_MIME: &str = "image/png";

#[derive(Debug, Clone, Default)]
pub struct WebhookDispatcher {
    client: reqwest::Client,
}

impl WebhookDispatcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Spawns the request and returns immediately.
    ///
    /// Failures are logged at debug level. The handle can be ignored; tests
    /// await it to know the request has finished.
    pub fn dispatch(
        &self,
        url: &str,
        message: WebhookMessage,
        image: Option<Vec<u8>>,
    ) -> JoinHandle<()> {
        let this = self.clone();
        let url = url.to_string();
        tokio::spawn(async move {
            if let Err(e) = this.send(&url, &message, image).await {
                log::debug!("[WEBHOOK] Error submitting webhook: {}", e);
            }
        })
    }

    /// Sends one request and waits for it. Returns the status Discord gave,
    /// success or not.
    pub async fn send(
        &self,
        url: &str,
        message: &WebhookMessage,
        image: Option<Vec<u8>>,
    ) -> Result<StatusCode, DispatchError> {
        let url = parse_webhook_url(url)?;
        let has_image = image.is_some();
        let form = build_form(message, image)?;

        let start = std::time::Instant::now();
        let response = self.client.post(url).multipart(form).send().await?;
        let status = response.status();

        // Drain so the connection goes back to the pool.
        let _ = response.bytes().await;

        if status.is_success() {
            log::info!(
                "[WEBHOOK] Posted drop (image: {}) in {}ms",
                has_image,
                start.elapsed().as_millis()
            );
        } else {
            // Rate limits (429) land here too; they're not retried.
            log::debug!("[WEBHOOK] Webhook answered HTTP {}, ignoring", status);
        }

        Ok(status)
    }
}

/// `payload_json` plus an optional `file` part holding PNG bytes.
pub fn build_form(message: &WebhookMessage, image: Option<Vec<u8>>) -> Result<Form, DispatchError> {
    let mut form = Form::new().text(PAYLOAD_FIELD, message.to_payload_json()?);

    if let Some(bytes) = image {
        let part = Part::bytes(bytes)
            .file_name(FILE_NAME)
            .mime_str(PNG_MIME)
            .map_err(DispatchError::Mime)?;
        form = form.part(FILE_FIELD, part);
    }

    Ok(form)
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    InvalidUrl(#[from] WebhookUrlError),

    #[error("Failed to serialize webhook payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid attachment MIME type: {0}")]
    Mime(reqwest::Error),

    #[error("Webhook request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn body_text(server_requests: &[wiremock::Request]) -> String {
        String::from_utf8_lossy(&server_requests[0].body).into_owned()
    }

    #[tokio::test]
    async fn text_only_post_has_payload_and_no_file() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let dispatcher = WebhookDispatcher::default();
        let status = dispatcher
            .send(
                &format!("{}/hook", server.uri()),
                &WebhookMessage::text("Player123 received a drop"),
                None,
            )
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let requests = server.received_requests().await.unwrap();
        let body = body_text(&requests);
        assert!(body.contains(r#"name="payload_json""#));
        assert!(body.contains(r#"{"content":"Player123 received a drop"}"#));
        assert!(!body.contains(r#"name="file""#));

        let content_type = requests[0].headers.get("content-type").unwrap().to_str().unwrap();
        assert!(content_type.starts_with("multipart/form-data"));
    }

    #[tokio::test]
    async fn image_post_has_png_file_part() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let png = crate::capture::encode_png(&image::RgbaImage::new(2, 2)).unwrap();
        WebhookDispatcher::default()
            .send(&server.uri(), &WebhookMessage::text("gz"), Some(png))
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let body = body_text(&requests);
        assert!(body.contains(r#"name="file"; filename="image.png""#));
        assert!(body.contains("Content-Type: image/png") || body.contains("content-type: image/png"));
    }

    #[tokio::test]
    async fn error_status_is_returned_not_raised() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string(r#"{"retry_after":1.5}"#))
            .mount(&server)
            .await;

        let status = WebhookDispatcher::default()
            .send(&server.uri(), &WebhookMessage::text("gz"), None)
            .await
            .unwrap();
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn malformed_url_is_rejected_before_sending() {
        let result = WebhookDispatcher::default()
            .send("nope", &WebhookMessage::text("gz"), None)
            .await;
        assert!(matches!(result, Err(DispatchError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn dispatch_swallows_transport_errors() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let url = format!("http://127.0.0.1:{}/hook", port);
        let handle = WebhookDispatcher::default().dispatch(&url, WebhookMessage::text("gz"), None);
        // Completes without panicking even though nothing is listening.
        handle.await.unwrap();
    }
}
