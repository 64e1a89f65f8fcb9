use analysis_core::ScanReport;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{AppError, AppState};

pub const TICKERS_REQUIRED: &str = "Please provide tickers array";

#[derive(Debug, Clone, Deserialize)]
pub struct ScanRequest {
    pub tickers: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: ScanReport,
}

/// POST /api/stock-scanner
///
/// Scans the tickers sequentially and returns them ranked by score.
async fn scan_stocks(
    State(state): State<AppState>,
    payload: Result<Json<ScanRequest>, JsonRejection>,
) -> Result<Json<ScanResponse>, AppError> {
    let Json(request) = payload.map_err(|rejection| AppError::BadRequest {
        error: TICKERS_REQUIRED.to_string(),
        details: Some(rejection.body_text()),
    })?;

    let report = state.scanner.scan(&request.tickers).await?;

    Ok(Json(ScanResponse {
        success: true,
        report,
    }))
}

/// OPTIONS /api/stock-scanner, answered even without CORS preflight headers
async fn scan_options() -> StatusCode {
    StatusCode::OK
}

pub fn scanner_routes() -> Router<AppState> {
    Router::new().route("/api/stock-scanner", post(scan_stocks).options(scan_options))
}
