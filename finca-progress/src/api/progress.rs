//! Progress API handlers
//!
//! - `GET /fincas/:finca_id/progress` - full report for one case
//! - `POST /fincas/progress` - percentages for many cases
//! - `GET /stages` - the stage registry

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use crate::{
    aggregator::CaseProgress,
    error::{ApiError, ApiResult},
    progress::ProgressResult,
    stages::{registry, StageKey},
    types::CaseId,
    AppState,
};

/// Batch progress request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProgressRequest {
    #[serde(alias = "finca_ids")]
    pub finca_ids: Vec<String>,
}

/// Batch progress response
#[derive(Debug, Serialize, Deserialize)]
pub struct BatchProgressResponse {
    pub progress: BTreeMap<CaseId, ProgressResult>,
}

/// Registry entry as exposed over HTTP
#[derive(Debug, Serialize, Deserialize)]
pub struct StageSummary {
    pub key: StageKey,
    pub ordinal: u8,
    pub label: String,
    pub counted: bool,
}

/// GET /fincas/:finca_id/progress
pub async fn case_progress(
    State(state): State<AppState>,
    Path(finca_id): Path<String>,
) -> ApiResult<Json<CaseProgress>> {
    let case_id = CaseId::parse(&finca_id)?;

    let report = state.aggregator.case_progress(&case_id).await;

    if let Some(failure) = report.source_failures.last() {
        state.record_failure(&case_id, failure).await;
    }

    Ok(Json(report))
}

/// POST /fincas/progress
pub async fn batch_progress(
    State(state): State<AppState>,
    Json(request): Json<BatchProgressRequest>,
) -> ApiResult<Json<BatchProgressResponse>> {
    if request.finca_ids.len() > state.max_batch_size {
        return Err(ApiError::BadRequest(format!(
            "At most {} finca ids per request, got {}",
            state.max_batch_size,
            request.finca_ids.len()
        )));
    }

    let case_ids = request
        .finca_ids
        .iter()
        .map(|id| CaseId::parse(id))
        .collect::<finca_common::Result<Vec<CaseId>>>()?;

    info!(count = case_ids.len(), "Batch progress request");

    let report = state.aggregator.batch_report(&case_ids).await;

    if let Some((case_id, failure)) = report.last_failure() {
        state.record_failure(case_id, failure).await;
    }

    Ok(Json(BatchProgressResponse {
        progress: report.progress,
    }))
}

/// GET /stages
pub async fn list_stages() -> Json<Vec<StageSummary>> {
    Json(
        registry()
            .iter()
            .map(|def| StageSummary {
                key: def.key,
                ordinal: def.ordinal,
                label: def.label.to_string(),
                counted: def.counted,
            })
            .collect(),
    )
}

/// Build progress routes
pub fn progress_routes() -> Router<AppState> {
    Router::new()
        .route("/fincas/:finca_id/progress", get(case_progress))
        .route("/fincas/progress", post(batch_progress))
        .route("/stages", get(list_stages))
}
