use async_trait::async_trait;
use reqwest::Response;
use serde_json::Value;

use crate::{error::VisionError, types::VisionRequest};

pub mod grid;
pub mod huggingface;
pub mod ollama;
pub mod openai;

/// An upstream that answers an image plus prompt with free text.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    async fn describe(&self, request: &VisionRequest) -> Result<String, VisionError>;

    fn name(&self) -> &'static str;

    /// Fails with [`VisionError::MissingApiKey`] when a required credential is not configured.
    fn check_credentials(&self) -> Result<(), VisionError> {
        Ok(())
    }
}

/// Pulls the reply text out of whichever envelope an upstream returned.
///
/// Falls back to the compact JSON of the whole body so the normalizer still gets a chance
/// to find the fields in it.
pub fn extract_reply_text(body: &Value) -> String {
    let content = body
        .pointer("/message/content")
        .filter(|value| is_present(value))
        .or_else(|| body.pointer("/choices/0/message/content").filter(|value| is_present(value)))
        .or_else(|| body.get("response").filter(|value| value.is_string()))
        .or_else(|| body.get("generated_text").filter(|value| value.is_string()))
        .or_else(|| body.pointer("/0/generated_text").filter(|value| value.is_string()));

    let text = match content {
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => body.to_string(),
    };

    text.trim().to_string()
}

// Null and empty-string content count as absent.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(text) => !text.is_empty(),
        _ => true,
    }
}

/// Turns a non-success upstream response into [`VisionError::Upstream`].
pub(crate) async fn upstream_error(upstream: &str, response: Response) -> VisionError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    if let Some(message) = error_envelope_message(&text) {
        return VisionError::Upstream(format!("{upstream} error: HTTP {status} {message}"));
    }

    VisionError::Upstream(format!("{upstream} error: HTTP {status} {text}"))
}

fn error_envelope_message(text: &str) -> Option<String> {
    let body: Value = serde_json::from_str(text).ok()?;
    match body.get("error")? {
        Value::String(message) => Some(message.clone()),
        Value::Object(object) => object
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
