//! Source failure policy
//!
//! A failed source read never fails the case: its result settles to an
//! empty list. The failure is always logged and, when reporting is on,
//! carried alongside the case result as a diagnostic.

use crate::types::{CaseId, SourceError, SourceKind};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Downgraded source failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub source: SourceKind,
    pub error: String,
}

/// Outcome of one source read after the policy is applied
#[derive(Debug, Clone)]
pub struct Settled<T> {
    pub records: Vec<T>,
    pub failure: Option<SourceFailure>,
}

impl<T> Settled<T> {
    pub fn ok(records: Vec<T>) -> Self {
        Self {
            records,
            failure: None,
        }
    }
}

/// Failure-to-empty policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailurePolicy {
    report: bool,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self::reporting()
    }
}

impl FailurePolicy {
    /// Downgrade and keep the failure as a diagnostic
    pub fn reporting() -> Self {
        Self { report: true }
    }

    /// Downgrade silently (log only)
    pub fn silent() -> Self {
        Self { report: false }
    }

    /// Apply the policy to a read result
    pub fn settle<T>(
        &self,
        source: SourceKind,
        case_id: &CaseId,
        result: Result<Vec<T>, SourceError>,
    ) -> Settled<T> {
        match result {
            Ok(records) => Settled::ok(records),
            Err(e) => {
                warn!(
                    source = %source,
                    case_id = %case_id,
                    error = %e,
                    "Source read failed, treating as no records"
                );
                Settled {
                    records: Vec::new(),
                    failure: self.report.then(|| SourceFailure {
                        source,
                        error: e.to_string(),
                    }),
                }
            }
        }
    }
}
