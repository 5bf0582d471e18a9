use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::{
    error::VisionError,
    providers::{endpoint, extract_reply_text, openai::VisionChatBody, upstream_error, VisionProvider},
    types::VisionRequest,
};

pub const ROUTER_BASE_URL: &str = "https://router.huggingface.co/v1";
pub const INFERENCE_BASE_URL: &str = "https://api-inference.huggingface.co";
pub const DEFAULT_MODEL: &str = "Qwen/Qwen2.5-VL-7B-Instruct";
pub const API_KEY_VAR: &str = "HF_TOKEN";

/// The two hosted request shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HuggingFaceApi {
    /// OpenAI-compatible chat completions on the inference router.
    Chat,
    /// Serverless `models/{model}` endpoint taking `inputs` and returning `generated_text`.
    Inference,
}

#[derive(Debug, Clone)]
pub struct HuggingFaceConfig {
    pub api: HuggingFaceApi,
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_new_tokens: u32,
    pub request_timeout: Duration,
}

impl HuggingFaceConfig {
    pub fn new(api: HuggingFaceApi, api_key: Option<String>) -> Self {
        let base_url = match api {
            HuggingFaceApi::Chat => ROUTER_BASE_URL,
            HuggingFaceApi::Inference => INFERENCE_BASE_URL,
        };

        Self {
            api,
            api_key,
            base_url: base_url.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_new_tokens: 512,
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

    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

#[derive(Debug, Clone)]
pub struct HuggingFace {
    client: Client,
    config: HuggingFaceConfig,
}

impl HuggingFace {
    pub fn from_config(config: HuggingFaceConfig) -> Result<Self, VisionError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { client, config })
    }
}

#[derive(Debug, Serialize)]
struct InferenceBody<'a> {
    inputs: InferenceInputs<'a>,
    parameters: InferenceParameters,
}

#[derive(Debug, Serialize)]
struct InferenceInputs<'a> {
    image: &'a str,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct InferenceParameters {
    max_new_tokens: u32,
    return_full_text: bool,
}

impl<'a> InferenceBody<'a> {
    fn new(request: &'a VisionRequest, max_new_tokens: u32) -> Self {
        Self {
            inputs: InferenceInputs {
                image: &request.image.data,
                text: &request.prompt,
            },
            parameters: InferenceParameters {
                max_new_tokens,
                return_full_text: false,
            },
        }
    }
}

#[async_trait]
impl VisionProvider for HuggingFace {
    async fn describe(&self, request: &VisionRequest) -> Result<String, VisionError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(VisionError::MissingApiKey(API_KEY_VAR))?;

        let builder = match self.config.api {
            HuggingFaceApi::Chat => self
                .client
                .post(endpoint(&self.config.base_url, "chat/completions"))
                .json(&VisionChatBody::new(
                    &self.config.model,
                    request,
                    Some(self.config.max_new_tokens),
                )),
            HuggingFaceApi::Inference => self
                .client
                .post(endpoint(
                    &self.config.base_url,
                    &format!("models/{}", self.config.model),
                ))
                .json(&InferenceBody::new(request, self.config.max_new_tokens)),
        };

        let response = builder.bearer_auth(api_key).send().await?;
        if !response.status().is_success() {
            return Err(upstream_error("Hugging Face", response).await);
        }

        let parsed: Value = response.json().await?;
        Ok(extract_reply_text(&parsed))
    }

    fn name(&self) -> &'static str {
        match self.config.api {
            HuggingFaceApi::Chat => "huggingface",
            HuggingFaceApi::Inference => "huggingface-inference",
        }
    }

    fn check_credentials(&self) -> Result<(), VisionError> {
        self.config
            .api_key
            .as_ref()
            .map(|_| ())
            .ok_or(VisionError::MissingApiKey(API_KEY_VAR))
    }
}
