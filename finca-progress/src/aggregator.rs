//! Stage Completion Aggregator
//!
//! Entry point for progress queries. A single case reads its three sources
//! concurrently; a batch fans cases out over a bounded worker pool and
//! isolates each case, so one failing case never affects another.

use crate::classifier::DeedClassifier;
use crate::progress::{calculate, ProgressResult};
use crate::resolver::{resolve, CompletionRecord};
use crate::sources::{FailurePolicy, SourceFailure, SourceSet};
use crate::types::CaseId;
use finca_common::config::AggregatorConfig;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Aggregator tuning
#[derive(Debug, Clone, Copy)]
pub struct AggregatorSettings {
    /// Cases computed at once in a batch (minimum 1)
    pub max_concurrency: usize,
    /// Deadline for each source read
    pub source_timeout: Duration,
    pub policy: FailurePolicy,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        AggregatorSettings::from(&AggregatorConfig::default())
    }
}

impl From<&AggregatorConfig> for AggregatorSettings {
    fn from(config: &AggregatorConfig) -> Self {
        Self {
            max_concurrency: config.max_concurrency.max(1),
            source_timeout: config.source_timeout(),
            policy: if config.report_source_failures {
                FailurePolicy::reporting()
            } else {
                FailurePolicy::silent()
            },
        }
    }
}

/// Full progress report for one case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseProgress {
    pub case_id: CaseId,
    pub stages: CompletionRecord,
    pub progress: ProgressResult,
    /// Source reads downgraded to "no records"
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_failures: Vec<SourceFailure>,
}

/// Batch outcome: percentages plus the failures reported per case
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub progress: BTreeMap<CaseId, ProgressResult>,
    /// Only cases with at least one reported failure appear here
    pub failures: BTreeMap<CaseId, Vec<SourceFailure>>,
}

impl BatchReport {
    /// Last reported failure, in case id order
    pub fn last_failure(&self) -> Option<(&CaseId, &SourceFailure)> {
        self.failures
            .iter()
            .rev()
            .find_map(|(case_id, failures)| failures.last().map(|f| (case_id, f)))
    }
}

/// Stage completion aggregator
///
/// Cheap to clone; clones share readers and classifier.
///
/// # Example
/// ```rust,ignore
/// let aggregator = StageCompletionAggregator::new(sources, DeedClassifier::default(), AggregatorSettings::default());
///
/// let report = aggregator.case_progress(&CaseId::from("F-001")).await;
/// println!("{}%", report.progress.percentage);
///
/// let batch = aggregator.batch_progress(&[CaseId::from("F-001"), CaseId::from("F-002")]).await;
/// ```
#[derive(Clone)]
pub struct StageCompletionAggregator {
    sources: Arc<SourceSet>,
    classifier: Arc<DeedClassifier>,
    settings: AggregatorSettings,
}

impl StageCompletionAggregator {
    pub fn new(sources: SourceSet, classifier: DeedClassifier, settings: AggregatorSettings) -> Self {
        Self {
            sources: Arc::new(sources),
            classifier: Arc::new(classifier),
            settings,
        }
    }

    /// Completion record and progress for one case
    ///
    /// Never fails: unreadable sources count as empty.
    pub async fn case_progress(&self, case_id: &CaseId) -> CaseProgress {
        self.case_progress_with_cancel(case_id, &CancellationToken::new())
            .await
    }

    /// `case_progress` whose pending reads stop when `cancel` fires
    pub async fn case_progress_with_cancel(
        &self,
        case_id: &CaseId,
        cancel: &CancellationToken,
    ) -> CaseProgress {
        let deadline = self.settings.source_timeout;
        let policy = self.settings.policy;

        let (parcel, construction, deeds) = tokio::join!(
            self.sources.parcel.read(case_id, deadline, cancel, policy),
            self.sources.construction.read(case_id, deadline, cancel, policy),
            self.sources.deeds.read(case_id, deadline, cancel, policy),
        );

        let source_failures: Vec<SourceFailure> = [
            parcel.failure,
            construction.failure,
            deeds.failure,
        ]
        .into_iter()
        .flatten()
        .collect();

        let stages = resolve(
            &self.classifier,
            parcel.records,
            construction.records,
            deeds.records,
        );
        let progress = calculate(&stages);

        debug!(
            case_id = %case_id,
            completed = progress.completed_count,
            total = progress.total_count,
            percentage = progress.percentage,
            failures = source_failures.len(),
            "Case progress computed"
        );

        CaseProgress {
            case_id: case_id.clone(),
            stages,
            progress,
            source_failures,
        }
    }

    /// Progress for many cases, keyed by case id
    ///
    /// Duplicate ids are computed once. A case whose computation aborts
    /// resolves to `ProgressResult::incomplete()`.
    pub async fn batch_progress(&self, case_ids: &[CaseId]) -> BTreeMap<CaseId, ProgressResult> {
        self.batch_report(case_ids).await.progress
    }

    /// `batch_progress` that stops reading once `cancel` fires
    ///
    /// Cases still pending at cancellation settle with empty sources.
    pub async fn batch_progress_with_cancel(
        &self,
        case_ids: &[CaseId],
        cancel: CancellationToken,
    ) -> BTreeMap<CaseId, ProgressResult> {
        self.batch_report_with_cancel(case_ids, cancel).await.progress
    }

    /// `batch_progress` keeping each case's reported source failures
    pub async fn batch_report(&self, case_ids: &[CaseId]) -> BatchReport {
        self.batch_report_with_cancel(case_ids, CancellationToken::new())
            .await
    }

    pub async fn batch_report_with_cancel(
        &self,
        case_ids: &[CaseId],
        cancel: CancellationToken,
    ) -> BatchReport {
        let start = Instant::now();
        let unique: BTreeSet<CaseId> = case_ids.iter().cloned().collect();
        let requested = case_ids.len();

        let results: Vec<(CaseId, ProgressResult, Vec<SourceFailure>)> = stream::iter(unique)
            .map(|case_id| {
                let aggregator = self.clone();
                let cancel = cancel.clone();

                async move {
                    let task = {
                        let case_id = case_id.clone();
                        tokio::spawn(async move {
                            aggregator
                                .case_progress_with_cancel(&case_id, &cancel)
                                .await
                        })
                    };

                    match task.await {
                        Ok(report) => (case_id, report.progress, report.source_failures),
                        Err(e) => {
                            error!(
                                case_id = %case_id,
                                error = %e,
                                "Case computation aborted (per-case isolation)"
                            );
                            (case_id, ProgressResult::incomplete(), Vec::new())
                        }
                    }
                }
            })
            .buffer_unordered(self.settings.max_concurrency)
            .collect()
            .await;

        let mut report = BatchReport::default();
        for (case_id, progress, failures) in results {
            if !failures.is_empty() {
                report.failures.insert(case_id.clone(), failures);
            }
            report.progress.insert(case_id, progress);
        }

        let complete = report.progress.values().filter(|p| p.is_complete()).count();
        info!(
            requested,
            unique = report.progress.len(),
            complete,
            failed_cases = report.failures.len(),
            cancelled = cancel.is_cancelled(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Batch progress computed"
        );

        report
    }
}
