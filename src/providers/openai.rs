use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde_json::Value;

use crate::{
    error::VisionError,
    providers::{endpoint, extract_reply_text, upstream_error, VisionProvider},
    types::VisionRequest,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub organization: Option<String>,
    pub project: Option<String>,
    pub max_tokens: Option<u32>,
    pub request_timeout: Duration,
}

impl OpenAIConfig {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            organization: None,
            project: None,
            max_tokens: Some(512),
            request_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

#[derive(Debug, Clone)]
pub struct OpenAI {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAI {
    pub fn from_config(config: OpenAIConfig) -> Result<Self, VisionError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { client, config })
    }

    fn with_default_headers(&self, builder: RequestBuilder, api_key: &str) -> RequestBuilder {
        let mut builder = builder.bearer_auth(api_key);

        if let Some(ref org) = self.config.organization {
            builder = builder.header("OpenAI-Organization", org);
        }

        if let Some(ref project) = self.config.project {
            builder = builder.header("OpenAI-Project", project);
        }

        builder
    }
}

/// Chat-completions body with one user turn holding the prompt and the image as a data URL.
/// Shared with other OpenAI-compatible upstreams.
#[derive(Debug, Serialize)]
pub(crate) struct VisionChatBody {
    model: String,
    messages: Vec<VisionMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct VisionMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

impl VisionChatBody {
    pub(crate) fn new(model: &str, request: &VisionRequest, max_tokens: Option<u32>) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![VisionMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: request.prompt.clone(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: request.image.to_data_url(),
                        },
                    },
                ],
            }],
            max_tokens,
            stream: false,
        }
    }
}

#[async_trait]
impl VisionProvider for OpenAI {
    async fn describe(&self, request: &VisionRequest) -> Result<String, VisionError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(VisionError::MissingApiKey(API_KEY_VAR))?;

        let body = VisionChatBody::new(&self.config.model, request, self.config.max_tokens);

        let builder = self
            .with_default_headers(
                self.client
                    .post(endpoint(&self.config.base_url, "chat/completions")),
                api_key,
            )
            .json(&body);

        let response = builder.send().await?;
        if !response.status().is_success() {
            return Err(upstream_error("OpenAI", response).await);
        }

        let parsed: Value = response.json().await?;
        if parsed.pointer("/choices/0").is_none() {
            return Err(VisionError::InvalidResponse("response did not contain any choices"));
        }

        Ok(extract_reply_text(&parsed))
    }

    fn name(&self) -> &'static str {
        "openai"
    }

    fn check_credentials(&self) -> Result<(), VisionError> {
        self.config
            .api_key
            .as_ref()
            .map(|_| ())
            .ok_or(VisionError::MissingApiKey(API_KEY_VAR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImageData;

    #[test]
    fn vision_body_uses_content_parts() {
        let request = VisionRequest::new(ImageData::new("image/png", "AAAA"), "count");
        let value = serde_json::to_value(VisionChatBody::new("gpt-4o-mini", &request, Some(256)))
            .expect("serialize");

        let content = &value["messages"][0]["content"];
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[0]["text"], "count");
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(content[1]["image_url"]["url"], "data:image/png;base64,AAAA");
        assert_eq!(value["max_tokens"], 256);
    }

    #[tokio::test]
    async fn missing_key_is_reported() {
        let provider = OpenAI::from_config(OpenAIConfig::new(None)).expect("client");
        let request = VisionRequest::new(ImageData::new("image/jpeg", "AAAA"), "count");

        let error = provider.describe(&request).await.unwrap_err();
        assert!(matches!(error, VisionError::MissingApiKey("OPENAI_API_KEY")));
        assert!(provider.check_credentials().is_err());

        let configured = OpenAI::from_config(OpenAIConfig::new(Some("sk-test".to_string())))
            .expect("client");
        assert!(configured.check_credentials().is_ok());
    }
}
