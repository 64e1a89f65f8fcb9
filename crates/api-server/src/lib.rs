use analysis_core::{AnalysisError, PriceHistoryProvider};
use analysis_orchestrator::{ScanConfig, StockScanner};
use axum::{
    http::{header::CONTENT_TYPE, Method, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use yahoo_client::YahooClient;

pub mod config;
pub mod scanner_routes;

pub use config::ServerConfig;

/// Shared handler state. Each scan owns its own data; only the scanner's
/// configuration and provider handle are shared.
#[derive(Clone)]
pub struct AppState {
    pub scanner: Arc<StockScanner<Arc<dyn PriceHistoryProvider>>>,
}

impl AppState {
    pub fn new(provider: Arc<dyn PriceHistoryProvider>, config: ScanConfig) -> Self {
        Self {
            scanner: Arc::new(StockScanner::new(provider, config)),
        }
    }
}

/// Error returned by handlers, rendered as `{"error": ..., "details": ...}`
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{error}")]
    BadRequest { error: String, details: Option<String> },

    #[error("{error}")]
    Internal { error: String, details: String },
}

impl From<AnalysisError> for AppError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::InvalidInput(details) => AppError::BadRequest {
                error: scanner_routes::TICKERS_REQUIRED.to_string(),
                details: Some(details),
            },
            other => AppError::Internal {
                error: "Failed to scan stocks".to_string(),
                details: other.to_string(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::BadRequest { error, details } => {
                let mut body = serde_json::json!({ "error": error });
                if let Some(details) = details {
                    body["details"] = serde_json::Value::String(details);
                }
                (StatusCode::BAD_REQUEST, body)
            }
            AppError::Internal { error, details } => {
                tracing::error!("Scanner error: {}", details);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "error": error, "details": details }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers([CONTENT_TYPE])
        .allow_methods([Method::POST, Method::OPTIONS]);

    Router::new()
        .merge(scanner_routes::scanner_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());

    if json_logging {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env()?;
    tracing::info!("Starting stock scanner API");
    tracing::info!("  Pacing: {}ms between tickers", config.pacing.as_millis());
    tracing::info!(
        "  Price history: {} ({} days)",
        config.yahoo.base_url,
        config.yahoo.lookback_days
    );

    let provider: Arc<dyn PriceHistoryProvider> = Arc::new(YahooClient::with_settings(config.yahoo.clone()));
    let state = AppState::new(provider, ScanConfig { pacing: config.pacing });
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Listening on {}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
