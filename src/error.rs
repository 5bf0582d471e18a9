use thiserror::Error;

use crate::normalizer::ParseFailure;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Upstream(String),

    #[error("Missing {0} on the server")]
    MissingApiKey(&'static str),

    #[error("invalid response from upstream: {0}")]
    InvalidResponse(&'static str),

    #[error("Invalid image data URL")]
    InvalidDataUrl,

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error(transparent)]
    Parse(#[from] ParseFailure),

    #[error("background task failed: {0}")]
    Task(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read prompt template {path}: {source}")]
    TemplateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid prompt template: {0}")]
    Template(#[from] handlebars::TemplateError),

    #[error("failed to build upstream client: {0}")]
    Provider(#[from] VisionError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
