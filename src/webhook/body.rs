//! The JSON body Discord reads from the `payload_json` form field.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookMessage {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed: Option<Embed>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Embed {
    pub image: UrlEmbed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlEmbed {
    pub url: String,
}

impl WebhookMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            embed: None,
        }
    }

    /// Shows `url` as the embed image. `attachment://image.png` points at
    /// the uploaded file part.
    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.embed = Some(Embed {
            image: UrlEmbed { url: url.into() },
        });
        self
    }

    pub fn embedded_image_url(&self) -> Option<&str> {
        self.embed.as_ref().map(|e| e.image.url.as_str())
    }

    pub fn to_payload_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_only_omits_embed() {
        let json = WebhookMessage::text("Player123 received a drop").to_payload_json().unwrap();
        assert_eq!(json, r#"{"content":"Player123 received a drop"}"#);
    }

    #[test]
    fn embed_carries_image_url() {
        let msg = WebhookMessage::text("gz").with_image_url("attachment://image.png");
        assert_eq!(msg.embedded_image_url(), Some("attachment://image.png"));

        let value: serde_json::Value = serde_json::from_str(&msg.to_payload_json().unwrap()).unwrap();
        assert_eq!(value["embed"]["image"]["url"], "attachment://image.png");
    }
}
