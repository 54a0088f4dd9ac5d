//! Deed Classifier
//!
//! Maps a raw deed to exactly one stage using a declarative alias table
//! (`stage -> accepted type values`). The table is seeded from the stage
//! registry and can be extended from configuration, so new aliases are data.
//!
//! Lookup order: `tipo_acta` first, then the legacy `tipo` field.
//! Matching is exact; a deed matching nothing is unclassified and counts
//! toward no stage.

use crate::stages::{registry, StageKey, StageRule};
use crate::types::Deed;
use finca_common::{Error, Result};
use std::collections::BTreeMap;
use tracing::debug;

/// Alias-tolerant deed classifier
#[derive(Debug, Clone)]
pub struct DeedClassifier {
    table: Vec<(StageKey, Vec<String>)>,
}

impl Default for DeedClassifier {
    fn default() -> Self {
        let table = registry()
            .iter()
            .filter_map(|def| match def.rule {
                StageRule::DeedType(values) => Some((
                    def.key,
                    values.iter().map(|v| v.to_string()).collect(),
                )),
                StageRule::AnySurvey => None,
            })
            .collect();
        Self { table }
    }
}

impl DeedClassifier {
    /// Registry table extended with configured aliases
    ///
    /// # Errors
    /// - unknown stage key
    /// - stage that is not deed-backed (`ficha_campo`)
    /// - alias already mapped to a different stage
    pub fn with_extra_aliases(extra: &BTreeMap<String, Vec<String>>) -> Result<Self> {
        let mut classifier = Self::default();

        for (stage_name, aliases) in extra {
            let key: StageKey = stage_name
                .parse()
                .map_err(|e: String| Error::Config(format!("classifier.extra_aliases: {}", e)))?;

            for alias in aliases {
                if let Some(existing) = classifier.match_value(alias) {
                    if existing != key {
                        return Err(Error::Config(format!(
                            "classifier.extra_aliases: '{}' already maps to {}",
                            alias, existing
                        )));
                    }
                    continue;
                }

                let entry = classifier
                    .table
                    .iter_mut()
                    .find(|(k, _)| *k == key)
                    .ok_or_else(|| {
                        Error::Config(format!(
                            "classifier.extra_aliases: stage {} is not detected from deeds",
                            key
                        ))
                    })?;
                entry.1.push(alias.clone());
            }
        }

        Ok(classifier)
    }

    /// Stage for `deed`, or `None` when unclassified
    pub fn classify(&self, deed: &Deed) -> Option<StageKey> {
        let stage = deed
            .tipo_acta
            .as_deref()
            .and_then(|value| self.match_value(value))
            .or_else(|| deed.tipo.as_deref().and_then(|value| self.match_value(value)));

        if stage.is_none() {
            debug!(
                deed_id = ?deed.id,
                tipo_acta = ?deed.tipo_acta,
                tipo = ?deed.tipo,
                "Unclassified deed dropped"
            );
        }
        stage
    }

    /// Stage whose alias list contains `value`
    pub fn match_value(&self, value: &str) -> Option<StageKey> {
        self.table
            .iter()
            .find(|(_, aliases)| aliases.iter().any(|alias| alias == value))
            .map(|(key, _)| *key)
    }

    /// Current alias table, in registry order
    pub fn table(&self) -> &[(StageKey, Vec<String>)] {
        &self.table
    }
}
