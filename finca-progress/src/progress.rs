//! Progress Calculator
//!
//! Percentage over counted stages only. Wildcard stages appear in the
//! completion record but never change the result.

use crate::resolver::CompletionRecord;
use crate::stages::{counted_stage_count, counted_stages};
use serde::{Deserialize, Serialize};

/// Progress summary for one case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResult {
    pub completed_count: u32,
    pub total_count: u32,
    /// Integer percentage, half rounded up
    pub percentage: u32,
}

impl ProgressResult {
    pub fn from_counts(completed_count: u32, total_count: u32) -> Self {
        Self {
            completed_count,
            total_count,
            percentage: rounded_percentage(completed_count, total_count),
        }
    }

    /// Result for a case whose computation could not run
    pub fn incomplete() -> Self {
        Self::from_counts(0, counted_stage_count())
    }

    pub fn is_complete(&self) -> bool {
        self.total_count > 0 && self.completed_count == self.total_count
    }
}

/// `round(completed / total * 100)` with halves rounded up; 0 when total is 0
pub fn rounded_percentage(completed: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let (completed, total) = (u64::from(completed), u64::from(total));
    ((completed * 200 + total) / (total * 2)) as u32
}

/// Progress for a completion record
pub fn calculate(record: &CompletionRecord) -> ProgressResult {
    let completed = counted_stages()
        .filter(|def| record.is_completed(def.key))
        .count() as u32;
    ProgressResult::from_counts(completed, counted_stage_count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::DeedClassifier;
    use crate::resolver::resolve;
    use crate::types::{CaseId, Deed, SurveyKind, SurveyRecord};
    use serde_json::json;

    fn deed(tipo_acta: &str) -> Deed {
        Deed {
            id: None,
            case_id: CaseId::from("F-1"),
            tipo_acta: Some(tipo_acta.to_string()),
            tipo: None,
            payload: json!({}),
        }
    }

    #[test]
    fn test_rounding() {
        assert_eq!(rounded_percentage(0, 4), 0);
        assert_eq!(rounded_percentage(1, 4), 25);
        assert_eq!(rounded_percentage(3, 4), 75);
        assert_eq!(rounded_percentage(4, 4), 100);
        assert_eq!(rounded_percentage(1, 3), 33);
        assert_eq!(rounded_percentage(2, 3), 67);
        assert_eq!(rounded_percentage(1, 8), 13);
        assert_eq!(rounded_percentage(0, 0), 0);
    }

    #[test]
    fn test_incomplete_default() {
        assert_eq!(
            ProgressResult::incomplete(),
            ProgressResult {
                completed_count: 0,
                total_count: 4,
                percentage: 0
            }
        );
    }

    #[test]
    fn test_wildcard_stage_never_counts() {
        let record = resolve(
            &DeedClassifier::default(),
            vec![],
            vec![],
            vec![deed("comparecencia")],
        );
        assert_eq!(calculate(&record), ProgressResult::from_counts(0, 4));
    }

    #[test]
    fn test_three_deeds_without_survey() {
        let record = resolve(
            &DeedClassifier::default(),
            vec![],
            vec![],
            vec![deed("previa"), deed("ocupacion"), deed("mutuo_acuerdo")],
        );
        let result = calculate(&record);
        assert_eq!(result.percentage, 75);
        assert!(!result.is_complete());
    }

    #[test]
    fn test_all_counted_stages_complete() {
        let parcel = SurveyRecord {
            id: None,
            case_id: CaseId::from("F-1"),
            kind: SurveyKind::Parcel,
            payload: json!({}),
        };
        let record = resolve(
            &DeedClassifier::default(),
            vec![parcel],
            vec![],
            vec![deed("previa"), deed("ocupacion"), deed("justiprecio")],
        );
        let result = calculate(&record);
        assert_eq!(result.percentage, 100);
        assert!(result.is_complete());
    }

    #[test]
    fn test_serializes_camel_case() {
        let value = serde_json::to_value(ProgressResult::from_counts(3, 4)).unwrap();
        assert_eq!(
            value,
            json!({"completedCount": 3, "totalCount": 4, "percentage": 75})
        );
    }
}
