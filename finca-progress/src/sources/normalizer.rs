//! Response Normalizer
//!
//! Upstream services answer either with a bare JSON list or with a
//! `{ "data": [...] }` envelope. Both become a plain list of objects here,
//! and nothing past this module sees the envelope.

use crate::types::{CaseId, Deed, RawResponse, SourceError, SurveyKind, SurveyRecord};
use serde_json::{Map, Value};
use tracing::debug;

type Object = Map<String, Value>;

/// Flatten a raw response into its record objects
///
/// - `[..]` and `{ "data": [..] }` yield their items
/// - `null` and `{ "data": null }` yield no items
/// - items that are not JSON objects are skipped
///
/// # Errors
/// `SourceError::UnexpectedShape` for any other top-level value
pub fn normalize(raw: RawResponse) -> Result<Vec<Object>, SourceError> {
    let items = match raw {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        Value::Object(mut envelope) => match envelope.remove("data") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) => Vec::new(),
            Some(other) => {
                return Err(SourceError::UnexpectedShape(format!(
                    "'data' is {}",
                    json_type(&other)
                )))
            }
            None => {
                return Err(SourceError::UnexpectedShape(
                    "object without 'data' field".to_string(),
                ))
            }
        },
        other => {
            return Err(SourceError::UnexpectedShape(format!(
                "top-level {}",
                json_type(&other)
            )))
        }
    };

    let total = items.len();
    let objects: Vec<Object> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(object) => Some(object),
            _ => None,
        })
        .collect();

    if objects.len() != total {
        debug!(
            skipped = total - objects.len(),
            "Skipped non-object items in source response"
        );
    }
    Ok(objects)
}

/// Build a survey record; the record belongs to the case it was read for
pub fn survey_from_object(case_id: &CaseId, kind: SurveyKind, object: Object) -> SurveyRecord {
    SurveyRecord {
        id: record_id(&object),
        case_id: case_id.clone(),
        kind,
        payload: Value::Object(object),
    }
}

/// Build a deed, keeping both type fields as sent
pub fn deed_from_object(case_id: &CaseId, object: Object) -> Deed {
    Deed {
        id: record_id(&object),
        case_id: case_id.clone(),
        tipo_acta: string_field(&object, "tipo_acta"),
        tipo: string_field(&object, "tipo"),
        payload: Value::Object(object),
    }
}

fn record_id(object: &Object) -> Option<String> {
    match object.get("id") {
        Some(Value::String(id)) => Some(id.clone()),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    }
}

fn string_field(object: &Object, name: &str) -> Option<String> {
    object
        .get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_list_and_envelope_are_equivalent() {
        let bare = normalize(json!([{"id": 1}, {"id": 2}])).unwrap();
        let wrapped = normalize(json!({"data": [{"id": 1}, {"id": 2}], "total": 2})).unwrap();
        assert_eq!(bare, wrapped);
        assert_eq!(bare.len(), 2);
    }

    #[test]
    fn test_null_and_null_data_are_empty() {
        assert!(normalize(Value::Null).unwrap().is_empty());
        assert!(normalize(json!({"data": null})).unwrap().is_empty());
        assert!(normalize(json!([])).unwrap().is_empty());
    }

    #[test]
    fn test_unrecognized_shapes_are_errors() {
        for raw in [
            json!({"items": []}),
            json!({"data": {"id": 1}}),
            json!("ok"),
            json!(42),
        ] {
            assert!(matches!(
                normalize(raw),
                Err(SourceError::UnexpectedShape(_))
            ));
        }
    }

    #[test]
    fn test_non_object_items_skipped() {
        let objects = normalize(json!([{"id": 1}, "junk", null, 7])).unwrap();
        assert_eq!(objects.len(), 1);
    }

    #[test]
    fn test_deed_keeps_both_type_fields() {
        let object = normalize(json!([{"id": 9, "tipo_acta": "previa", "tipo": "ocupacion"}]))
            .unwrap()
            .remove(0);
        let deed = deed_from_object(&CaseId::from("F-1"), object);

        assert_eq!(deed.id.as_deref(), Some("9"));
        assert_eq!(deed.tipo_acta.as_deref(), Some("previa"));
        assert_eq!(deed.tipo.as_deref(), Some("ocupacion"));
        assert_eq!(deed.case_id, CaseId::from("F-1"));
    }

    #[test]
    fn test_non_string_type_field_ignored() {
        let object = normalize(json!([{"tipo_acta": 3, "tipo": "previa"}]))
            .unwrap()
            .remove(0);
        let deed = deed_from_object(&CaseId::from("F-1"), object);

        assert_eq!(deed.tipo_acta, None);
        assert_eq!(deed.tipo.as_deref(), Some("previa"));
        assert_eq!(deed.id, None);
    }

    #[test]
    fn test_survey_payload_preserved() {
        let object = normalize(json!([{"id": "s-1", "superficie": 120.5}]))
            .unwrap()
            .remove(0);
        let survey = survey_from_object(&CaseId::from("F-1"), SurveyKind::Parcel, object);

        assert_eq!(survey.id.as_deref(), Some("s-1"));
        assert_eq!(survey.payload["superficie"], json!(120.5));
    }
}
