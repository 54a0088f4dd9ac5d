//! Source Adapters
//!
//! Wraps the three `SourceReader`s and turns their raw responses into typed
//! records. Every read is bounded by a deadline and can be abandoned through
//! a cancellation token; both outcomes surface as `SourceError`. The
//! `FailurePolicy` handed to `read` then settles any failure to an empty list.
//!
//! # Modules
//! - **normalizer** - envelope flattening and record construction
//! - **policy** - failure-to-empty policy and diagnostics
//! - **http** - REST implementation of `SourceReader`

pub mod http;
pub mod normalizer;
pub mod policy;

use crate::types::{
    CaseId, Deed, RawResponse, SourceError, SourceKind, SourceReader, SurveyKind, SurveyRecord,
};
use finca_common::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use policy::{FailurePolicy, Settled, SourceFailure};

/// Fetch with deadline and cancellation
async fn guarded_fetch(
    reader: &dyn SourceReader,
    case_id: &CaseId,
    deadline: Duration,
    cancel: &CancellationToken,
) -> std::result::Result<RawResponse, SourceError> {
    if cancel.is_cancelled() {
        return Err(SourceError::Cancelled);
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SourceError::Cancelled),
        result = tokio::time::timeout(deadline, reader.fetch(case_id)) => match result {
            Ok(response) => response,
            Err(_) => Err(SourceError::Timeout(deadline.as_millis() as u64)),
        },
    }
}

fn check_kind(reader: &dyn SourceReader, expected: SourceKind) -> Result<()> {
    if reader.kind() != expected {
        return Err(Error::InvalidInput(format!(
            "Reader serves {}, expected {}",
            reader.kind(),
            expected
        )));
    }
    Ok(())
}

/// Typed reader for one of the two survey sources
#[derive(Clone)]
pub struct SurveyAdapter {
    reader: Arc<dyn SourceReader>,
    kind: SurveyKind,
}

impl SurveyAdapter {
    /// # Errors
    /// `Error::InvalidInput` when the reader serves a different source
    pub fn new(reader: Arc<dyn SourceReader>, kind: SurveyKind) -> Result<Self> {
        check_kind(reader.as_ref(), kind.source())?;
        Ok(Self { reader, kind })
    }

    pub fn source(&self) -> SourceKind {
        self.kind.source()
    }

    /// Read and settle through `policy`; never fails
    pub async fn read(
        &self,
        case_id: &CaseId,
        deadline: Duration,
        cancel: &CancellationToken,
        policy: FailurePolicy,
    ) -> Settled<SurveyRecord> {
        let result = self.try_read(case_id, deadline, cancel).await;
        policy.settle(self.source(), case_id, result)
    }

    /// Read without applying a failure policy
    pub async fn try_read(
        &self,
        case_id: &CaseId,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> std::result::Result<Vec<SurveyRecord>, SourceError> {
        let raw = guarded_fetch(self.reader.as_ref(), case_id, deadline, cancel).await?;
        let records: Vec<SurveyRecord> = normalizer::normalize(raw)?
            .into_iter()
            .map(|object| normalizer::survey_from_object(case_id, self.kind, object))
            .collect();

        debug!(
            source = %self.source(),
            case_id = %case_id,
            count = records.len(),
            "Surveys read"
        );
        Ok(records)
    }
}

/// Typed reader for the deed source
#[derive(Clone)]
pub struct DeedAdapter {
    reader: Arc<dyn SourceReader>,
}

impl DeedAdapter {
    /// # Errors
    /// `Error::InvalidInput` when the reader does not serve deeds
    pub fn new(reader: Arc<dyn SourceReader>) -> Result<Self> {
        check_kind(reader.as_ref(), SourceKind::Deed)?;
        Ok(Self { reader })
    }

    /// Read and settle through `policy`; never fails
    pub async fn read(
        &self,
        case_id: &CaseId,
        deadline: Duration,
        cancel: &CancellationToken,
        policy: FailurePolicy,
    ) -> Settled<Deed> {
        let result = self.try_read(case_id, deadline, cancel).await;
        policy.settle(SourceKind::Deed, case_id, result)
    }

    /// Read without applying a failure policy
    pub async fn try_read(
        &self,
        case_id: &CaseId,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> std::result::Result<Vec<Deed>, SourceError> {
        let raw = guarded_fetch(self.reader.as_ref(), case_id, deadline, cancel).await?;
        let deeds: Vec<Deed> = normalizer::normalize(raw)?
            .into_iter()
            .map(|object| normalizer::deed_from_object(case_id, object))
            .collect();

        debug!(case_id = %case_id, count = deeds.len(), "Deeds read");
        Ok(deeds)
    }
}

/// The three adapters a case is read through
#[derive(Clone)]
pub struct SourceSet {
    pub parcel: SurveyAdapter,
    pub construction: SurveyAdapter,
    pub deeds: DeedAdapter,
}

impl SourceSet {
    /// # Errors
    /// `Error::InvalidInput` when a reader is wired to the wrong slot
    pub fn new(
        parcel: Arc<dyn SourceReader>,
        construction: Arc<dyn SourceReader>,
        deeds: Arc<dyn SourceReader>,
    ) -> Result<Self> {
        Ok(Self {
            parcel: SurveyAdapter::new(parcel, SurveyKind::Parcel)?,
            construction: SurveyAdapter::new(construction, SurveyKind::Construction)?,
            deeds: DeedAdapter::new(deeds)?,
        })
    }
}

// ============================================================================
// Mock Reader for Testing
// ============================================================================
