use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use clap::{Args, Parser, ValueEnum};

use crate::{
    analyzer::CabinetAnalyzer,
    error::ConfigError,
    prompt::PromptTemplate,
    providers::{
        grid::{GridAnalyzer, GridConfig},
        huggingface::{HuggingFace, HuggingFaceApi, HuggingFaceConfig},
        ollama::{Ollama, OllamaConfig},
        openai::{OpenAI, OpenAIConfig},
        VisionProvider,
    },
};

pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Upper bound for grid rows and columns; the image is resized to 600 px wide.
pub const MAX_GRID_CELLS: i64 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderKind {
    /// Ollama gateway on this machine.
    Ollama,
    /// Hosted Ollama, needs OLLAMA_API_KEY.
    OllamaCloud,
    /// Hugging Face router chat completions, needs HF_TOKEN.
    Huggingface,
    /// Hugging Face serverless inference, needs HF_TOKEN.
    HuggingfaceInference,
    /// OpenAI chat completions, needs OPENAI_API_KEY.
    Openai,
    /// Local brightness grid, no upstream.
    Grid,
}

/// Upstream credentials. Read from the environment; never logged.
#[derive(Debug, Clone, Default, Args)]
pub struct Credentials {
    #[arg(long, env = "OLLAMA_API_KEY", hide_env_values = true)]
    pub ollama_api_key: Option<String>,

    #[arg(long, env = "HF_TOKEN", hide_env_values = true)]
    pub hf_token: Option<String>,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "OPENAI_ORGANIZATION")]
    pub openai_organization: Option<String>,

    #[arg(long, env = "OPENAI_PROJECT")]
    pub openai_project: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct GridArgs {
    #[arg(long = "grid-rows", env = "GRID_ROWS", default_value_t = 6, value_parser = clap::value_parser!(u32).range(1..=MAX_GRID_CELLS))]
    pub rows: u32,

    #[arg(long = "grid-cols", env = "GRID_COLS", default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..=MAX_GRID_CELLS))]
    pub cols: u32,

    #[arg(long = "grid-threshold", env = "GRID_EMPTY_THRESHOLD", default_value_t = 150.0)]
    pub empty_threshold: f32,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "cabinet-vision", about = "Phone cabinet slot analysis service")]
pub struct ServerConfig {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 3001)]
    pub port: u16,

    #[arg(long, env = "VISION_PROVIDER", value_enum, default_value_t = ProviderKind::OllamaCloud)]
    pub provider: ProviderKind,

    /// Upstream model id; each provider has its own default.
    #[arg(long, env = "VISION_MODEL")]
    pub model: Option<String>,

    /// Overrides the upstream base URL.
    #[arg(long, env = "VISION_BASE_URL")]
    pub base_url: Option<String>,

    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value_t = 120_000)]
    pub request_timeout_ms: u64,

    /// Handlebars template wrapping the caller's prompt; `{{prompt}}` is substituted.
    #[arg(long, env = "PROMPT_TEMPLATE")]
    pub prompt_template: Option<PathBuf>,

    #[arg(long, env = "MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,

    #[command(flatten)]
    pub grid: GridArgs,

    #[command(flatten)]
    pub credentials: Credentials,
}

impl ServerConfig {
    pub fn from_env_and_args() -> Self {
        Self::parse()
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("bad listen address {}:{}", self.host, self.port)))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn grid_config(&self) -> GridConfig {
        GridConfig {
            rows: self.grid.rows,
            cols: self.grid.cols,
            empty_threshold: self.grid.empty_threshold,
            ..GridConfig::default()
        }
    }

    pub fn build_provider(&self) -> Result<Arc<dyn VisionProvider>, ConfigError> {
        let credentials = &self.credentials;
        let timeout = self.request_timeout();

        let provider: Arc<dyn VisionProvider> = match self.provider {
            ProviderKind::Ollama | ProviderKind::OllamaCloud => {
                let mut config = if self.provider == ProviderKind::Ollama {
                    OllamaConfig::local()
                } else {
                    OllamaConfig::cloud(None)
                };
                config.api_key = non_empty(&credentials.ollama_api_key);
                config = self.apply_overrides(config, |c, m| c.with_model(m), |c, u| c.with_base_url(u));
                Arc::new(Ollama::from_config(config.with_timeout(timeout))?)
            }
            ProviderKind::Huggingface | ProviderKind::HuggingfaceInference => {
                let api = if self.provider == ProviderKind::Huggingface {
                    HuggingFaceApi::Chat
                } else {
                    HuggingFaceApi::Inference
                };
                let config = HuggingFaceConfig::new(api, non_empty(&credentials.hf_token));
                let config =
                    self.apply_overrides(config, |c, m| c.with_model(m), |c, u| c.with_base_url(u));
                Arc::new(HuggingFace::from_config(config.with_timeout(timeout))?)
            }
            ProviderKind::Openai => {
                let mut config = OpenAIConfig::new(non_empty(&credentials.openai_api_key));
                if let Some(org) = non_empty(&credentials.openai_organization) {
                    config = config.with_organization(org);
                }
                if let Some(project) = non_empty(&credentials.openai_project) {
                    config = config.with_project(project);
                }
                let config =
                    self.apply_overrides(config, |c, m| c.with_model(m), |c, u| c.with_base_url(u));
                Arc::new(OpenAI::from_config(config.with_timeout(timeout))?)
            }
            ProviderKind::Grid => Arc::new(GridAnalyzer::new(self.grid_config())),
        };

        Ok(provider)
    }

    pub fn build_analyzer(&self) -> Result<CabinetAnalyzer, ConfigError> {
        let analyzer = CabinetAnalyzer::new(self.build_provider()?);

        match &self.prompt_template {
            Some(path) => Ok(analyzer.with_prompt_template(PromptTemplate::from_file(path)?)),
            None => Ok(analyzer),
        }
    }

    fn apply_overrides<C>(
        &self,
        mut config: C,
        with_model: fn(C, String) -> C,
        with_base_url: fn(C, String) -> C,
    ) -> C {
        if let Some(model) = non_empty(&self.model) {
            config = with_model(config, model);
        }
        if let Some(base_url) = non_empty(&self.base_url) {
            config = with_base_url(config, base_url);
        }
        config
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
