//! Discord webhook domain: validate the URL, build the body, post it.

mod body;
mod dispatch;
mod validate;

pub use body::{Embed, UrlEmbed, WebhookMessage};
pub use dispatch::{
    build_form, DispatchError, WebhookDispatcher, FILE_FIELD, FILE_NAME, PAYLOAD_FIELD, PNG_MIME,
};
pub use validate::{parse_webhook_url, validate, WebhookUrlError};

/// Embed URL that points Discord at the uploaded `file` part.
pub const ATTACHMENT_IMAGE_URL: &str = "attachment://image.png";
