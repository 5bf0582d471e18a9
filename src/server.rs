use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{
    analyzer::CabinetAnalyzer,
    config::DEFAULT_MAX_BODY_BYTES,
    error::VisionError,
    normalizer::CabinetAnalysisResult,
    types::{AnalyzeCabinetRequest, ErrorBody, ImageData},
};

pub struct AppState {
    pub analyzer: CabinetAnalyzer,
}

impl AppState {
    pub fn new(analyzer: CabinetAnalyzer) -> Self {
        Self { analyzer }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    router_with_body_limit(state, DEFAULT_MAX_BODY_BYTES)
}

pub fn router_with_body_limit(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(health))
        .route("/api/analyze-cabinet", post(analyze_cabinet))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "provider": state.analyzer.provider_name(),
    }))
}

async fn analyze_cabinet(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AnalyzeCabinetRequest>, JsonRejection>,
) -> Result<Json<CabinetAnalysisResult>, ApiError> {
    let Json(request) = payload.map_err(ApiError::from_rejection)?;

    let image_data = request.image_data.filter(|value| !value.is_empty());
    let prompt = request.prompt.filter(|value| !value.is_empty());
    let (Some(image_data), Some(prompt)) = (image_data, prompt) else {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "Missing imageData or prompt"));
    };

    // A missing key wins over a malformed image.
    state.analyzer.check_credentials()?;
    let image = ImageData::from_data_url(&image_data)?;
    let provider = state.analyzer.provider_name();

    match state.analyzer.analyze(image, &prompt).await {
        Ok(result) => {
            tracing::info!(
                provider,
                empty_slots = result.empty_slots.len(),
                confidence = %result.confidence,
                "cabinet analyzed"
            );
            Ok(Json(result))
        }
        Err(error) => {
            tracing::error!(provider, %error, "vision analysis failed");
            Err(error.into())
        }
    }
}

/// Status plus `{ error, details? }` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: error.into(),
                details: None,
            },
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.body.details = Some(details.into());
        self
    }

    fn from_rejection(rejection: JsonRejection) -> Self {
        tracing::warn!(%rejection, "rejected request body");
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return Self::new(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large");
        }
        Self::new(StatusCode::BAD_REQUEST, "Missing imageData or prompt")
    }
}

impl From<VisionError> for ApiError {
    fn from(error: VisionError) -> Self {
        match error {
            VisionError::InvalidDataUrl => Self::new(StatusCode::BAD_REQUEST, error.to_string()),
            VisionError::InvalidImage(details) => {
                Self::new(StatusCode::BAD_REQUEST, "Invalid image").with_details(details)
            }
            VisionError::MissingApiKey(_) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
            }
            other => Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Vision analysis failed")
                .with_details(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::ParseFailure;

    #[test]
    fn maps_errors_to_statuses() {
        let error = ApiError::from(VisionError::InvalidDataUrl);
        assert_eq!(error.status, StatusCode::BAD_REQUEST);
        assert_eq!(error.body.error, "Invalid image data URL");

        let error = ApiError::from(VisionError::MissingApiKey("HF_TOKEN"));
        assert_eq!(error.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.body.error, "Missing HF_TOKEN on the server");
        assert!(error.body.details.is_none());

        let error = ApiError::from(VisionError::Parse(ParseFailure::from_text("nope")));
        assert_eq!(error.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.body.error, "Vision analysis failed");
        assert_eq!(
            error.body.details.as_deref(),
            Some("Could not parse model JSON: nope")
        );

        let error = ApiError::from(VisionError::InvalidImage("truncated png".to_string()));
        assert_eq!(error.status, StatusCode::BAD_REQUEST);
        assert_eq!(error.body.details.as_deref(), Some("truncated png"));
    }
}
