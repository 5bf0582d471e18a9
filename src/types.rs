use serde::{Deserialize, Serialize};

use crate::error::VisionError;

pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";

/// A base64 image payload without its data-URL prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub mime_type: String,
    pub data: String,
}

impl ImageData {
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Parses `data:<mime>;base64,<payload>`. Only the presence of a payload after the first
    /// comma is checked; the payload itself is passed upstream untouched.
    pub fn from_data_url(url: &str) -> Result<Self, VisionError> {
        let (header, payload) = url.split_once(',').ok_or(VisionError::InvalidDataUrl)?;
        let payload = payload.split(',').next().unwrap_or_default();
        if payload.is_empty() {
            return Err(VisionError::InvalidDataUrl);
        }

        let mime_type = header
            .strip_prefix("data:")
            .and_then(|rest| rest.split(';').next())
            .map(str::trim)
            .filter(|mime| !mime.is_empty())
            .unwrap_or(DEFAULT_MIME_TYPE);

        Ok(Self::new(mime_type, payload))
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// One image plus the fully rendered instruction prompt.
#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub image: ImageData,
    pub prompt: String,
}

impl VisionRequest {
    pub fn new(image: ImageData, prompt: impl Into<String>) -> Self {
        Self {
            image,
            prompt: prompt.into(),
        }
    }
}

/// Body of `POST /api/analyze-cabinet`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeCabinetRequest {
    #[serde(default)]
    pub image_data: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
