//! Completion Resolver
//!
//! Builds the per-case completion record from typed source records.
//! Every registry stage is always present. When several deeds classify to
//! the same stage, the first one in source order is kept as the reference.

use crate::classifier::DeedClassifier;
use crate::stages::{registry, StageKey, StageRule};
use crate::types::{Deed, SurveyRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Record that satisfied a stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageReference {
    /// Survey stage: parcel and construction sub-checklists
    Survey {
        parcel: Option<SurveyRecord>,
        construction: Option<SurveyRecord>,
    },
    Deed(Deed),
}

/// One stage of the completion record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageCompletion {
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<StageReference>,
}

impl StageCompletion {
    fn pending() -> Self {
        Self {
            completed: false,
            reference: None,
        }
    }

    fn done(reference: StageReference) -> Self {
        Self {
            completed: true,
            reference: Some(reference),
        }
    }
}

/// Completion state of every stage for one case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompletionRecord {
    stages: BTreeMap<StageKey, StageCompletion>,
}

impl Default for CompletionRecord {
    fn default() -> Self {
        Self {
            stages: registry()
                .iter()
                .map(|def| (def.key, StageCompletion::pending()))
                .collect(),
        }
    }
}

impl CompletionRecord {
    pub fn get(&self, key: StageKey) -> Option<&StageCompletion> {
        self.stages.get(&key)
    }

    pub fn is_completed(&self, key: StageKey) -> bool {
        self.stages.get(&key).is_some_and(|stage| stage.completed)
    }

    /// Stages in registry order
    pub fn iter(&self) -> impl Iterator<Item = (StageKey, &StageCompletion)> {
        self.stages.iter().map(|(key, stage)| (*key, stage))
    }

    /// First parcel survey, if any
    pub fn parcel_survey(&self) -> Option<&SurveyRecord> {
        self.survey_reference().and_then(|(parcel, _)| parcel)
    }

    /// First construction survey, if any
    pub fn construction_survey(&self) -> Option<&SurveyRecord> {
        self.survey_reference().and_then(|(_, construction)| construction)
    }

    fn survey_reference(&self) -> Option<(Option<&SurveyRecord>, Option<&SurveyRecord>)> {
        match self.get(StageKey::FichaCampo)?.reference.as_ref()? {
            StageReference::Survey {
                parcel,
                construction,
            } => Some((parcel.as_ref(), construction.as_ref())),
            StageReference::Deed(_) => None,
        }
    }
}

/// Resolve the completion record for one case
pub fn resolve(
    classifier: &DeedClassifier,
    parcel_surveys: Vec<SurveyRecord>,
    construction_surveys: Vec<SurveyRecord>,
    deeds: Vec<Deed>,
) -> CompletionRecord {
    let mut first_deed: BTreeMap<StageKey, Deed> = BTreeMap::new();
    for deed in deeds {
        if let Some(stage) = classifier.classify(&deed) {
            first_deed.entry(stage).or_insert(deed);
        }
    }

    let mut parcel = parcel_surveys.into_iter().next();
    let mut construction = construction_surveys.into_iter().next();
    let mut record = CompletionRecord::default();

    for def in registry() {
        let completion = match def.rule {
            StageRule::AnySurvey => {
                if parcel.is_some() || construction.is_some() {
                    StageCompletion::done(StageReference::Survey {
                        parcel: parcel.take(),
                        construction: construction.take(),
                    })
                } else {
                    StageCompletion::pending()
                }
            }
            StageRule::DeedType(_) => match first_deed.remove(&def.key) {
                Some(deed) => StageCompletion::done(StageReference::Deed(deed)),
                None => StageCompletion::pending(),
            },
        };
        record.stages.insert(def.key, completion);
    }

    record
}
