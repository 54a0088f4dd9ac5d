//! Stage Registry
//!
//! Static, ordered definition of every stage a finca passes through.
//! The ordinal is for display only: stages may complete in any order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical stage key
///
/// Variant order matches registry order, so ordered maps keyed by `StageKey`
/// iterate in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKey {
    FichaCampo,
    ActaPrevia,
    ActaOcupacion,
    ActaJustiprecio,
    ActaComparecencia,
}

impl StageKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FichaCampo => "ficha_campo",
            Self::ActaPrevia => "acta_previa",
            Self::ActaOcupacion => "acta_ocupacion",
            Self::ActaJustiprecio => "acta_justiprecio",
            Self::ActaComparecencia => "acta_comparecencia",
        }
    }
}

impl fmt::Display for StageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        STAGE_REGISTRY
            .iter()
            .map(|def| def.key)
            .find(|key| key.as_str() == s)
            .ok_or_else(|| format!("Unknown stage '{}'", s))
    }
}

/// How a stage is detected from source records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageRule {
    /// Satisfied by any parcel or construction survey
    AnySurvey,
    /// Satisfied by a deed whose type equals one of these values
    DeedType(&'static [&'static str]),
}

/// Registry entry
#[derive(Debug, Clone, Copy)]
pub struct StageDefinition {
    pub key: StageKey,
    pub ordinal: u8,
    pub label: &'static str,
    /// Counted stages form the progress denominator; the rest are wildcard stages
    pub counted: bool,
    pub rule: StageRule,
}

/// Every stage, in display order
pub static STAGE_REGISTRY: [StageDefinition; 5] = [
    StageDefinition {
        key: StageKey::FichaCampo,
        ordinal: 1,
        label: "Ficha de campo",
        counted: true,
        rule: StageRule::AnySurvey,
    },
    StageDefinition {
        key: StageKey::ActaPrevia,
        ordinal: 2,
        label: "Acta previa",
        counted: true,
        rule: StageRule::DeedType(&["previa"]),
    },
    StageDefinition {
        key: StageKey::ActaOcupacion,
        ordinal: 3,
        label: "Acta de ocupación",
        counted: true,
        rule: StageRule::DeedType(&["ocupacion"]),
    },
    StageDefinition {
        key: StageKey::ActaJustiprecio,
        ordinal: 4,
        label: "Acta de justiprecio / mutuo acuerdo",
        counted: true,
        // Two legacy vocabularies for the same instrument
        rule: StageRule::DeedType(&["justiprecio", "mutuo_acuerdo"]),
    },
    StageDefinition {
        key: StageKey::ActaComparecencia,
        ordinal: 5,
        label: "Acta de comparecencia",
        counted: false,
        rule: StageRule::DeedType(&["comparecencia"]),
    },
];

/// All registry entries
pub fn registry() -> &'static [StageDefinition] {
    &STAGE_REGISTRY
}

/// Entries that count toward the progress percentage
pub fn counted_stages() -> impl Iterator<Item = &'static StageDefinition> {
    STAGE_REGISTRY.iter().filter(|def| def.counted)
}

/// Number of counted stages (the progress denominator)
pub fn counted_stage_count() -> u32 {
    counted_stages().count() as u32
}

/// Registry entry for `key`
pub fn definition(key: StageKey) -> &'static StageDefinition {
    // Variant order and registry order are the same
    &STAGE_REGISTRY[key as usize]
}
