use std::{process::ExitCode, sync::Arc};

use cabinet_vision::{server, AppState, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,cabinet_vision=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env_and_args();

    let analyzer = match config.build_analyzer() {
        Ok(analyzer) => analyzer,
        Err(error) => {
            tracing::error!(%error, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    let addr = match config.bind_addr() {
        Ok(addr) => addr,
        Err(error) => {
            tracing::error!(%error, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let provider = analyzer.provider_name();
    let app_state = Arc::new(AppState::new(analyzer));
    let app = server::router_with_body_limit(app_state, config.max_body_bytes);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!(%error, %addr, "failed to bind");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(%addr, provider, "cabinet-vision listening");

    if let Err(error) = axum::serve(listener, app).await {
        tracing::error!(%error, "server stopped");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
