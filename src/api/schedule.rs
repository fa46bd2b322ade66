//! Schedule management REST endpoints
//!
//! Request fields omitted from the generate body fall back to the configured
//! defaults, so a bare POST regenerates the standing schedule.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::services::{
    GenerationError, GenerationReport, GenerationRequest, PruneReport, ServerStatus,
};

#[derive(Debug, Default, Deserialize)]
pub struct GenerateBody {
    pub library_names: Option<Vec<String>>,
    pub allowed_ratings: Option<Vec<String>>,
    pub weeks_per_year: Option<u32>,
    pub playlist_title_prefix: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: Option<GenerationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PrefixQuery {
    pub prefix: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PlaylistSummary {
    pub title: String,
    pub item_count: u64,
    pub duration_ms: i64,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub success: bool,
    pub total_playlists: usize,
    pub playlists: Vec<PlaylistSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PruneResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: Option<PruneReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    #[serde(flatten)]
    pub server: Option<ServerStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn error_status(error: &GenerationError) -> StatusCode {
    match error {
        GenerationError::Configuration(_) => StatusCode::BAD_REQUEST,
        GenerationError::CatalogUnavailable(_) => StatusCode::BAD_GATEWAY,
        GenerationError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Run a generation. Per-bucket write failures are reported in the body, not
/// as an HTTP error; only run-level failures change the status code.
async fn generate(
    State(state): State<AppState>,
    body: Option<Json<GenerateBody>>,
) -> (StatusCode, Json<GenerateResponse>) {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let request = GenerationRequest {
        library_names: body
            .library_names
            .unwrap_or_else(|| state.config.libraries.clone()),
        allowed_ratings: body
            .allowed_ratings
            .unwrap_or_else(|| state.config.allowed_ratings.clone()),
        weeks_per_year: body.weeks_per_year.unwrap_or(state.config.weeks_per_year),
        playlist_title_prefix: body
            .playlist_title_prefix
            .unwrap_or_else(|| state.config.playlist_prefix.clone()),
    };

    match state.generator.generate(request).await {
        Ok(report) => {
            let success = report.weeks_failed == 0 && !report.cancelled;
            (
                StatusCode::OK,
                Json(GenerateResponse {
                    success,
                    report: Some(report),
                    error: None,
                }),
            )
        }
        Err(e) => (
            error_status(&e),
            Json(GenerateResponse {
                success: false,
                report: None,
                error: Some(e.to_string()),
            }),
        ),
    }
}

/// List the playlists currently persisted under a prefix
async fn summary(
    State(state): State<AppState>,
    Query(query): Query<PrefixQuery>,
) -> (StatusCode, Json<SummaryResponse>) {
    let prefix = query
        .prefix
        .unwrap_or_else(|| state.config.playlist_prefix.clone());

    match state.generator.playlist_summary(&prefix).await {
        Ok(playlists) => {
            let playlists: Vec<PlaylistSummary> = playlists
                .into_iter()
                .map(|p| PlaylistSummary {
                    title: p.title,
                    item_count: p.item_count,
                    duration_ms: p.duration_ms,
                })
                .collect();
            (
                StatusCode::OK,
                Json(SummaryResponse {
                    success: true,
                    total_playlists: playlists.len(),
                    playlists,
                    error: None,
                }),
            )
        }
        Err(e) => (
            error_status(&e),
            Json(SummaryResponse {
                success: false,
                total_playlists: 0,
                playlists: vec![],
                error: Some(e.to_string()),
            }),
        ),
    }
}

/// Delete every generated playlist under a prefix
async fn prune(
    State(state): State<AppState>,
    Query(query): Query<PrefixQuery>,
) -> (StatusCode, Json<PruneResponse>) {
    let prefix = query
        .prefix
        .unwrap_or_else(|| state.config.playlist_prefix.clone());

    match state.generator.prune(&prefix).await {
        Ok(report) => (
            StatusCode::OK,
            Json(PruneResponse {
                success: true,
                report: Some(report),
                error: None,
            }),
        ),
        Err(e) => (
            error_status(&e),
            Json(PruneResponse {
                success: false,
                report: None,
                error: Some(e.to_string()),
            }),
        ),
    }
}

/// Report catalog connection status and visible library sections
async fn server_status(State(state): State<AppState>) -> (StatusCode, Json<StatusResponse>) {
    match state.catalog.server_status().await {
        Ok(server) => (
            StatusCode::OK,
            Json(StatusResponse {
                success: true,
                server: Some(server),
                error: None,
            }),
        ),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(StatusResponse {
                success: false,
                server: None,
                error: Some(e.to_string()),
            }),
        ),
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(server_status))
        .route("/schedule/generate", post(generate))
        .route("/schedule/summary", get(summary))
        .route("/schedule", delete(prune))
}
