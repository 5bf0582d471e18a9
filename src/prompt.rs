use std::{fs, path::Path};

use handlebars::{no_escape, Handlebars};
use serde::Serialize;

use crate::error::ConfigError;

const TEMPLATE_NAME: &str = "cabinet";

pub const DEFAULT_TEMPLATE: &str = r#"
You are analyzing a phone storage cabinet image.

{{prompt}}

IMPORTANT:
- Respond ONLY with a single JSON object.
- No Markdown, no explanation, no backticks.
- The JSON must have exactly these keys:
  {
    "emptySlots": [1, 5, 23],
    "totalSlotsVisible": 60,
    "confidence": "high"
  }
"#;

#[derive(Serialize)]
struct PromptContext<'a> {
    prompt: &'a str,
}

/// Wraps the caller's instruction in the strict JSON-only prompt sent upstream.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    registry: Handlebars<'static>,
}

impl PromptTemplate {
    pub fn new(template: &str) -> Result<Self, ConfigError> {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(no_escape);
        registry.register_template_string(TEMPLATE_NAME, template)?;
        Ok(Self { registry })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let template = fs::read_to_string(path).map_err(|source| ConfigError::TemplateFile {
            path: path.display().to_string(),
            source,
        })?;
        Self::new(&template)
    }

    pub fn render(&self, prompt: &str) -> String {
        // The template is validated at construction and the context is a plain string, so
        // rendering can only fail on helpers we never register.
        self.registry
            .render(TEMPLATE_NAME, &PromptContext { prompt })
            .unwrap_or_else(|error| {
                tracing::warn!(%error, "prompt template failed to render, sending raw prompt");
                prompt.to_string()
            })
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE).expect("built-in prompt template is valid")
    }
}
