use crate::config::ApiConfig;
use crate::report_store::{FileReportStore, NewReport, Report};
use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use pawtrack_triage::{Coordinates, ImagePayload, TriageEngine, TriageResult};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<TriageEngine>,
    pub store: Arc<FileReportStore>,
    pub triage_timeout: Duration,
}

/// Submission body sent by the report form
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReportRequest {
    pub image_data: Option<String>,
    pub gps_coordinates: Option<GpsCoordinates>,
    /// Skip the live classifier for this submission
    #[serde(default)]
    pub force_simulation: bool,
}

/// Coordinates as submitted; either value may be missing
#[derive(Debug, Deserialize)]
pub struct GpsCoordinates {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Successful submission response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReportResponse {
    pub success: bool,
    pub report_id: String,
    pub triage_result: TriageResult,
}

/// Report list response
#[derive(Debug, Serialize)]
pub struct ReportListResponse {
    pub reports: Vec<Report>,
}

/// Query parameters for deletion
#[derive(Debug, Deserialize)]
pub struct DeleteReportQuery {
    pub id: Option<String>,
}

/// Successful deletion response
#[derive(Debug, Serialize)]
pub struct DeleteReportResponse {
    pub success: bool,
    pub message: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

fn internal_error() -> ApiError {
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

fn missing_fields() -> ApiError {
    api_error(
        StatusCode::BAD_REQUEST,
        "Missing required fields: imageData and gpsCoordinates",
    )
}

/// Create the API router
pub fn create_router(state: AppState, config: &ApiConfig) -> Router {
    let cors = if config.cors_enabled {
        if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/reports",
            get(list_reports).post(submit_report).delete(delete_report),
        )
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "pawtrack-reports"
    }))
}

/// Triage and persist a new report
#[instrument(skip(state, body))]
async fn submit_report(
    State(state): State<AppState>,
    body: Result<Json<SubmitReportRequest>, JsonRejection>,
) -> Result<Json<SubmitReportResponse>, ApiError> {
    let Json(request) = body.map_err(|rejection| {
        warn!(
            status = %rejection.status(),
            reason = %rejection.body_text(),
            "Rejected report body"
        );
        api_error(StatusCode::BAD_REQUEST, "Invalid request body")
    })?;

    let force_simulation = request.force_simulation;
    let (image_data, gps) = match (request.image_data, request.gps_coordinates) {
        (Some(image_data), Some(gps)) => (image_data, gps),
        _ => return Err(missing_fields()),
    };
    let image = ImagePayload::from(image_data.as_str());
    if image.is_empty() {
        return Err(missing_fields());
    }

    let coordinates = match (gps.latitude, gps.longitude) {
        (Some(latitude), Some(longitude)) => Coordinates::new(latitude, longitude),
        _ => return Err(api_error(StatusCode::BAD_REQUEST, "Invalid GPS coordinates")),
    };
    if !coordinates.is_valid() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Invalid GPS coordinates"));
    }

    let triage = state
        .engine
        .triage_with(&image, coordinates, force_simulation);
    let triage_result = tokio::time::timeout(state.triage_timeout, triage)
        .await
        .map_err(|_| {
            warn!(timeout = ?state.triage_timeout, "Triage timed out");
            api_error(StatusCode::GATEWAY_TIMEOUT, "Triage timed out")
        })?
        .map_err(|e| {
            error!(error = %e, "Triage failed");
            internal_error()
        })?;

    let report = state
        .store
        .create(NewReport {
            image_data,
            gps_coordinates: coordinates,
            triage: triage_result.clone(),
        })
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to save report");
            internal_error()
        })?;

    info!(
        report_id = %report.id,
        priority = report.priority_score,
        "Report submitted"
    );

    Ok(Json(SubmitReportResponse {
        success: true,
        report_id: report.id,
        triage_result,
    }))
}

/// List reports, highest priority first
#[instrument(skip(state))]
async fn list_reports(
    State(state): State<AppState>,
) -> Result<Json<ReportListResponse>, ApiError> {
    let reports = state.store.list_by_priority().await.map_err(|e| {
        error!(error = %e, "Failed to fetch reports");
        internal_error()
    })?;

    Ok(Json(ReportListResponse { reports }))
}

/// Delete a report by identifier
#[instrument(skip(state))]
async fn delete_report(
    State(state): State<AppState>,
    Query(params): Query<DeleteReportQuery>,
) -> Result<Json<DeleteReportResponse>, ApiError> {
    let report_id = params
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Missing report ID"))?;

    let deleted = state.store.delete(&report_id).await.map_err(|e| {
        error!(error = %e, "Failed to delete report");
        internal_error()
    })?;

    if !deleted {
        return Err(api_error(StatusCode::NOT_FOUND, "Report not found"));
    }

    Ok(Json(DeleteReportResponse {
        success: true,
        message: "Report deleted successfully".to_string(),
    }))
}

/// Serve the reports API until `shutdown` resolves.
///
/// Returns early with an error when the listener cannot be bound.
pub async fn start_api_server<F>(state: AppState, config: &ApiConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = create_router(state, config);
    let addr = format!("{}:{}", config.host, config.port);

    info!(address = %addr, "Starting reports API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server error")?;

    Ok(())
}
