//! Core Types and Trait Definitions for finca-progress
//!
//! Defines the records read from the three upstream sources and the
//! `SourceReader` trait every transport implements.
//!
//! # Architecture
//! - **Source readers** return raw JSON exactly as the upstream service sent it
//! - **Adapters** (see `sources`) normalize that JSON into typed records at the boundary
//! - Everything downstream (classifier, resolver, calculator) works on typed records only

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// Identifiers
// ============================================================================

/// Opaque case (finca) identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(String);

impl CaseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Case id from user input, surrounding whitespace removed
    ///
    /// # Errors
    /// `Error::InvalidInput` when nothing but whitespace is left
    pub fn parse(raw: &str) -> finca_common::Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(finca_common::Error::InvalidInput(
                "finca id must not be empty".to_string(),
            ));
        }
        Ok(Self::new(trimmed))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CaseId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for CaseId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ============================================================================
// Sources
// ============================================================================

/// The three upstream sources a case is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    ParcelSurvey,
    ConstructionSurvey,
    Deed,
}

impl SourceKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::ParcelSurvey => "parcel_survey",
            Self::ConstructionSurvey => "construction_survey",
            Self::Deed => "deed",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw upstream response, before envelope normalization
pub type RawResponse = serde_json::Value;

/// Source reader trait
///
/// One implementation per transport (REST today, see `sources::http`).
/// Readers report failures honestly; turning a failure into "no records"
/// is the job of the `FailurePolicy`, not of the reader.
///
/// # Example
/// ```rust,ignore
/// use finca_progress::types::{CaseId, RawResponse, SourceError, SourceKind, SourceReader};
///
/// struct FixedDeeds(serde_json::Value);
///
/// #[async_trait::async_trait]
/// impl SourceReader for FixedDeeds {
///     fn kind(&self) -> SourceKind { SourceKind::Deed }
///
///     async fn fetch(&self, _case_id: &CaseId) -> Result<RawResponse, SourceError> {
///         Ok(self.0.clone())
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait SourceReader: Send + Sync {
    /// Which source this reader serves
    fn kind(&self) -> SourceKind;

    /// Fetch every record the source holds for `case_id`
    ///
    /// # Errors
    /// Returns `SourceError` on transport, status or decode failure
    async fn fetch(&self, case_id: &CaseId) -> Result<RawResponse, SourceError>;
}

/// Source read error
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    /// Request never produced a response
    #[error("Transport error: {0}")]
    Transport(String),

    /// Upstream answered with a non-success status
    #[error("Upstream returned status {0}")]
    Status(u16),

    /// Body could not be decoded as JSON
    #[error("Decode error: {0}")]
    Decode(String),

    /// Body was JSON but neither a list nor a `{ "data": [...] }` envelope
    #[error("Unexpected response shape: {0}")]
    UnexpectedShape(String),

    /// Read exceeded its deadline
    #[error("Timed out after {0} ms")]
    Timeout(u64),

    /// Read abandoned because the batch was cancelled
    #[error("Cancelled")]
    Cancelled,
}

// ============================================================================
// Records
// ============================================================================

/// Survey kind (parcel ficha vs construction ficha)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurveyKind {
    Parcel,
    Construction,
}

impl SurveyKind {
    pub fn source(self) -> SourceKind {
        match self {
            Self::Parcel => SourceKind::ParcelSurvey,
            Self::Construction => SourceKind::ConstructionSurvey,
        }
    }
}

/// Field survey record (ficha de campo)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyRecord {
    /// Upstream record id, when the record carries one
    pub id: Option<String>,
    pub case_id: CaseId,
    pub kind: SurveyKind,
    /// Full upstream object, untouched
    pub payload: serde_json::Value,
}

/// Signed deed (acta)
///
/// The deed type arrives under `tipo_acta` or the older `tipo`; both are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deed {
    pub id: Option<String>,
    pub case_id: CaseId,
    pub tipo_acta: Option<String>,
    pub tipo: Option<String>,
    pub payload: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_id_serializes_transparently() {
        let id = CaseId::new("F-001");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"F-001\"");
        assert_eq!(id.to_string(), "F-001");
    }

    #[test]
    fn test_case_id_parse_trims_and_rejects_blank() {
        assert_eq!(CaseId::parse(" F-1 ").unwrap(), CaseId::from("F-1"));
        assert!(matches!(
            CaseId::parse("   "),
            Err(finca_common::Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_case_id_ordering_is_lexicographic() {
        let mut ids = vec![CaseId::from("b"), CaseId::from("a"), CaseId::from("c")];
        ids.sort();
        assert_eq!(ids, vec![CaseId::from("a"), CaseId::from("b"), CaseId::from("c")]);
    }

    #[test]
    fn test_survey_kind_maps_to_source() {
        assert_eq!(SurveyKind::Parcel.source(), SourceKind::ParcelSurvey);
        assert_eq!(SurveyKind::Construction.source(), SourceKind::ConstructionSurvey);
    }

    #[test]
    fn test_source_error_display() {
        assert_eq!(SourceError::Status(503).to_string(), "Upstream returned status 503");
        assert_eq!(SourceError::Timeout(250).to_string(), "Timed out after 250 ms");
    }
}
