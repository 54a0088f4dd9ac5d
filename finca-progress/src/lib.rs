//! finca-progress library interface
//!
//! Computes how far each expropriation case (finca) has advanced through its
//! stages by reading surveys and deeds from the upstream services.
//!
//! # Pipeline
//! 1. **sources** - read the three sources per case, normalize envelopes
//! 2. **classifier** - map each deed to one stage
//! 3. **resolver** - build the per-case completion record
//! 4. **progress** - percentage over counted stages
//! 5. **aggregator** - single-case and batch entry points

pub mod aggregator;
pub mod api;
pub mod classifier;
pub mod error;
pub mod progress;
pub mod resolver;
pub mod sources;
pub mod stages;
pub mod types;

pub use crate::aggregator::{
    AggregatorSettings, BatchReport, CaseProgress, StageCompletionAggregator,
};
pub use crate::error::{ApiError, ApiResult};

use crate::sources::SourceFailure;
use crate::types::CaseId;
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub aggregator: StageCompletionAggregator,
    /// Largest accepted batch request
    pub max_batch_size: usize,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last source failure for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(aggregator: StageCompletionAggregator, max_batch_size: usize) -> Self {
        Self {
            aggregator,
            max_batch_size,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Keep `failure` as the error shown by `/health`
    pub async fn record_failure(&self, case_id: &CaseId, failure: &SourceFailure) {
        *self.last_error.write().await = Some(format!(
            "{} read failed for finca {}: {}",
            failure.source, case_id, failure.error
        ));
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::progress_routes())
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
