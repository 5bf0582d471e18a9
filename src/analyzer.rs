use std::sync::Arc;

use crate::{
    error::VisionError,
    normalizer::{normalize, CabinetAnalysisResult},
    prompt::PromptTemplate,
    providers::VisionProvider,
    types::{ImageData, VisionRequest},
};

/// Renders the strict prompt, asks the configured upstream, and normalizes its reply.
#[derive(Clone)]
pub struct CabinetAnalyzer {
    provider: Arc<dyn VisionProvider>,
    prompt: PromptTemplate,
}

impl CabinetAnalyzer {
    pub fn new(provider: Arc<dyn VisionProvider>) -> Self {
        Self {
            provider,
            prompt: PromptTemplate::default(),
        }
    }

    pub fn with_prompt_template(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn check_credentials(&self) -> Result<(), VisionError> {
        self.provider.check_credentials()
    }

    pub async fn analyze(
        &self,
        image: ImageData,
        prompt: &str,
    ) -> Result<CabinetAnalysisResult, VisionError> {
        let request = VisionRequest::new(image, self.prompt.render(prompt));
        let reply = self.provider.describe(&request).await?;

        tracing::debug!(
            provider = self.provider.name(),
            reply_len = reply.len(),
            "upstream replied"
        );

        let result = normalize(&reply)?;
        Ok(result)
    }
}
