//! Shared fixtures for finca-progress integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use finca_progress::classifier::DeedClassifier;
use finca_progress::sources::{FailurePolicy, SourceSet};
use finca_progress::types::{CaseId, RawResponse, SourceError, SourceKind, SourceReader};
use finca_progress::{AggregatorSettings, StageCompletionAggregator};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Per-case canned responses for one source
pub struct FixtureReader {
    kind: SourceKind,
    responses: HashMap<String, Result<Value, SourceError>>,
    delays: HashMap<String, Duration>,
    panics_for: Option<String>,
    calls: AtomicUsize,
}

impl FixtureReader {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            responses: HashMap::new(),
            delays: HashMap::new(),
            panics_for: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with(mut self, case_id: &str, response: Value) -> Self {
        self.responses.insert(case_id.to_string(), Ok(response));
        self
    }

    pub fn failing_for(mut self, case_id: &str, error: SourceError) -> Self {
        self.responses.insert(case_id.to_string(), Err(error));
        self
    }

    pub fn slow_for(mut self, case_id: &str, delay: Duration) -> Self {
        self.delays.insert(case_id.to_string(), delay);
        self
    }

    pub fn panicking_for(mut self, case_id: &str) -> Self {
        self.panics_for = Some(case_id.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceReader for FixtureReader {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch(&self, case_id: &CaseId) -> Result<RawResponse, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(case_id.as_str()) {
            tokio::time::sleep(*delay).await;
        }
        if self.panics_for.as_deref() == Some(case_id.as_str()) {
            panic!("fixture reader panic for {}", case_id);
        }

        self.responses
            .get(case_id.as_str())
            .cloned()
            .unwrap_or_else(|| Ok(json!([])))
    }
}

pub fn settings() -> AggregatorSettings {
    AggregatorSettings {
        max_concurrency: 4,
        source_timeout: Duration::from_millis(300),
        policy: FailurePolicy::reporting(),
    }
}

pub fn aggregator(
    parcel: Arc<FixtureReader>,
    construction: Arc<FixtureReader>,
    deeds: Arc<FixtureReader>,
) -> StageCompletionAggregator {
    let sources = SourceSet::new(parcel, construction, deeds).expect("readers match their slots");
    StageCompletionAggregator::new(sources, DeedClassifier::default(), settings())
}

/// Readers for the standard fixture cases
///
/// - `A`: parcel survey + previa + ocupacion + justiprecio (100%)
/// - `B`: construction survey + mutuo_acuerdo (50%)
/// - `C`: comparecencia only (0%)
pub fn standard_readers() -> (Arc<FixtureReader>, Arc<FixtureReader>, Arc<FixtureReader>) {
    let parcel = FixtureReader::new(SourceKind::ParcelSurvey).with("A", json!([{"id": 1}]));
    let construction =
        FixtureReader::new(SourceKind::ConstructionSurvey).with("B", json!({"data": [{"id": 7}]}));
    let deeds = FixtureReader::new(SourceKind::Deed)
        .with(
            "A",
            json!([
                {"id": 10, "tipo_acta": "previa"},
                {"id": 11, "tipo_acta": "ocupacion"},
                {"id": 12, "tipo": "justiprecio"}
            ]),
        )
        .with("B", json!({"data": [{"id": 20, "tipo": "mutuo_acuerdo"}]}))
        .with("C", json!([{"id": 30, "tipo_acta": "comparecencia"}]));

    (Arc::new(parcel), Arc::new(construction), Arc::new(deeds))
}
