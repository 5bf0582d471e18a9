use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::{
    error::VisionError,
    providers::{endpoint, extract_reply_text, upstream_error, VisionProvider},
    types::VisionRequest,
};

pub const LOCAL_BASE_URL: &str = "http://localhost:11434/api";
pub const CLOUD_BASE_URL: &str = "https://ollama.com/api";
pub const DEFAULT_MODEL: &str = "gemma3";
pub const API_KEY_VAR: &str = "OLLAMA_API_KEY";

#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub require_api_key: bool,
    pub request_timeout: Duration,
}

impl OllamaConfig {
    /// A gateway on this machine; no credentials are sent unless a key is set.
    pub fn local() -> Self {
        Self {
            api_key: None,
            base_url: LOCAL_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            require_api_key: false,
            request_timeout: Duration::from_secs(120),
        }
    }

    pub fn cloud(api_key: Option<String>) -> Self {
        Self {
            api_key,
            base_url: CLOUD_BASE_URL.to_string(),
            require_api_key: true,
            ..Self::local()
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

    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Ollama {
    client: Client,
    config: OllamaConfig,
}

impl Ollama {
    pub fn from_config(config: OllamaConfig) -> Result<Self, VisionError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { client, config })
    }

    fn label(&self) -> &'static str {
        if self.config.require_api_key {
            "Ollama Cloud"
        } else {
            "Ollama"
        }
    }
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OllamaMessage<'a> {
    role: &'static str,
    content: &'a str,
    images: Vec<&'a str>,
}

#[async_trait]
impl VisionProvider for Ollama {
    async fn describe(&self, request: &VisionRequest) -> Result<String, VisionError> {
        self.check_credentials()?;

        let body = OllamaChatRequest {
            model: &self.config.model,
            messages: vec![OllamaMessage {
                role: "user",
                content: &request.prompt,
                images: vec![request.image.data.as_str()],
            }],
            stream: false,
        };

        let mut builder = self
            .client
            .post(endpoint(&self.config.base_url, "chat"))
            .json(&body);
        if let Some(ref api_key) = self.config.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await?;
        if !response.status().is_success() {
            return Err(upstream_error(self.label(), response).await);
        }

        let parsed: Value = response.json().await?;
        Ok(extract_reply_text(&parsed))
    }

    fn name(&self) -> &'static str {
        if self.config.require_api_key {
            "ollama-cloud"
        } else {
            "ollama"
        }
    }

    fn check_credentials(&self) -> Result<(), VisionError> {
        if self.config.require_api_key && self.config.api_key.is_none() {
            return Err(VisionError::MissingApiKey(API_KEY_VAR));
        }
        Ok(())
    }
}
