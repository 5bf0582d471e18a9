use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use cabinet_vision::{
    server, AppState, CabinetAnalyzer, VisionError, VisionProvider, VisionRequest,
};
use serde_json::{json, Value};
use tower::ServiceExt;

enum Reply {
    Text(&'static str),
    /// Answers with the received payload as the confidence label.
    EchoPayload,
    MissingKey,
    Upstream,
}

struct StubProvider {
    reply: Reply,
}

#[async_trait]
impl VisionProvider for StubProvider {
    async fn describe(&self, request: &VisionRequest) -> Result<String, VisionError> {
        if let Reply::EchoPayload = self.reply {
            return Ok(json!({ "confidence": request.image.data }).to_string());
        }

        assert_eq!(request.image.data, "AAAA");
        match self.reply {
            Reply::Text(text) => Ok(text.to_string()),
            Reply::EchoPayload => unreachable!(),
            Reply::MissingKey => Err(VisionError::MissingApiKey("OLLAMA_API_KEY")),
            Reply::Upstream => Err(VisionError::Upstream(
                "Ollama Cloud error: HTTP 401 Unauthorized invalid key".to_string(),
            )),
        }
    }

    fn name(&self) -> &'static str {
        "stub"
    }

    fn check_credentials(&self) -> Result<(), VisionError> {
        match self.reply {
            Reply::MissingKey => Err(VisionError::MissingApiKey("OLLAMA_API_KEY")),
            _ => Ok(()),
        }
    }
}

fn app(reply: Reply) -> Router {
    let analyzer = CabinetAnalyzer::new(Arc::new(StubProvider { reply }));
    server::router(Arc::new(AppState::new(analyzer)))
}

async fn post(app: Router, body: String) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/analyze-cabinet")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn valid_body() -> String {
    json!({ "imageData": "data:image/jpeg;base64,AAAA", "prompt": "Which slots are empty?" })
        .to_string()
}

#[tokio::test]
async fn returns_normalized_result() {
    let reply = "Here is the result:\n```json\n{\"emptySlots\":[2,7],\"totalSlotsVisible\":40,\"confidence\":\"high\"}\n```";
    let (status, body) = post(app(Reply::Text(reply)), valid_body()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "emptySlots": [2, 7], "totalSlotsVisible": 40, "confidence": "high" })
    );
}

#[tokio::test]
async fn partial_reply_gets_defaults() {
    let (status, body) = post(app(Reply::Text("{\"totalSlotsVisible\": 50}")), valid_body()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "emptySlots": [], "totalSlotsVisible": 50, "confidence": "unknown" })
    );
}

#[tokio::test]
async fn unparsable_reply_is_500_with_details() {
    let (status, body) = post(app(Reply::Text("I cannot analyze this image.")), valid_body()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Vision analysis failed");
    assert_eq!(
        body["details"],
        "Could not parse model JSON: I cannot analyze this image."
    );
}

#[tokio::test]
async fn missing_fields_are_400() {
    let (status, body) = post(app(Reply::Text("{}")), json!({ "prompt": "x" }).to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Missing imageData or prompt" }));

    let (status, _) = post(
        app(Reply::Text("{}")),
        json!({ "imageData": "data:image/jpeg;base64,AAAA", "prompt": "" }).to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(app(Reply::Text("{}")), "not json".to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_data_url_is_400() {
    let body = json!({ "imageData": "data:image/jpeg;base64,", "prompt": "x" }).to_string();
    let (status, body) = post(app(Reply::Text("{}")), body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Invalid image data URL" }));
}

#[tokio::test]
async fn missing_credentials_are_500() {
    let (status, body) = post(app(Reply::MissingKey), valid_body()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Missing OLLAMA_API_KEY on the server" }));
}

#[tokio::test]
async fn missing_credentials_win_over_invalid_data_url() {
    let body = json!({ "imageData": "data:image/jpeg;base64,", "prompt": "x" }).to_string();
    let (status, body) = post(app(Reply::MissingKey), body).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Missing OLLAMA_API_KEY on the server" }));
}

#[tokio::test]
async fn whitespace_payload_reaches_provider() {
    let body = json!({ "imageData": "data:image/jpeg;base64, ", "prompt": "x" }).to_string();
    let (status, body) = post(app(Reply::EchoPayload), body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["confidence"], " ");
}

#[tokio::test]
async fn cors_preflight_allows_any_origin() {
    let response = app(Reply::Text("{}"))
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/analyze-cabinet")
                .header("origin", "http://localhost:5173")
                .header("access-control-request-method", "POST")
                .header("access-control-request-headers", "content-type")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_success());
    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert!(headers.contains_key("access-control-allow-methods"));
    assert!(headers.contains_key("access-control-allow-headers"));
}

#[tokio::test]
async fn cross_origin_post_carries_cors_header() {
    let response = app(Reply::Text("{}"))
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/analyze-cabinet")
                .header("origin", "http://localhost:5173")
                .header("content-type", "application/json")
                .body(Body::from(valid_body()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
}

#[tokio::test]
async fn upstream_failure_is_500() {
    let (status, body) = post(app(Reply::Upstream), valid_body()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Vision analysis failed");
    assert!(body["details"]
        .as_str()
        .unwrap()
        .starts_with("Ollama Cloud error: HTTP 401"));
}

#[tokio::test]
async fn health_reports_provider() {
    let response = app(Reply::Text("{}"))
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, json!({ "status": "ok", "provider": "stub" }));
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let analyzer = CabinetAnalyzer::new(Arc::new(StubProvider {
        reply: Reply::Text("{}"),
    }));
    let app = server::router_with_body_limit(Arc::new(AppState::new(analyzer)), 64);

    let big = json!({ "imageData": format!("data:image/jpeg;base64,{}", "A".repeat(256)), "prompt": "x" });
    let (status, body) = post(app, big.to_string()).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"], "Request body too large");
}
