//! The peptide identification record localization reads from and writes to
use std::collections::BTreeMap;
use std::fmt::{self, Display};

use crate::peptide::Peptide;
use crate::scorer::ScoreType;

/// The meta key holding the sequence as it was before localization
pub const SEARCH_ENGINE_SEQUENCE: &str = "search_engine_sequence";
/// The meta key holding the hit's score before localization
pub const SEARCH_ENGINE_SCORE: &str = "search_engine_score";
/// The meta key holding the weighted score of the winning permutation
pub const ASCORE_PEPTIDE_SCORE: &str = "AScore_pep_score";

/// The meta key holding the AScore of the `rank`-th phosphorylation site, counting from 1
pub fn ascore_key(rank: usize) -> String {
    format!("AScore_{rank}")
}

/// A value attached to a [`PeptideHit`] as auxiliary metadata
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum MetaValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl MetaValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<f64> for MetaValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<i64> for MetaValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// A peptide-spectrum match: a sequence, the precursor charge it was observed at,
/// a score and free-form metadata.
///
/// Metadata is kept in key order so that two equal hits always serialize identically.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeptideHit {
    pub sequence: Peptide,
    pub charge: i32,
    pub score: ScoreType,
    pub meta: BTreeMap<String, MetaValue>,
}

impl PeptideHit {
    pub fn new(sequence: Peptide, charge: i32, score: ScoreType) -> Self {
        Self {
            sequence,
            charge,
            score,
            meta: BTreeMap::new(),
        }
    }

    pub fn get_meta(&self, key: &str) -> Option<&MetaValue> {
        self.meta.get(key)
    }

    pub fn set_meta<K: Into<String>, V: Into<MetaValue>>(&mut self, key: K, value: V) {
        self.meta.insert(key.into(), value.into());
    }

    /// The per-site AScores stored on this hit, in site order
    pub fn ascores(&self) -> Vec<ScoreType> {
        (1..)
            .map(|rank| self.meta.get(&ascore_key(rank)).and_then(MetaValue::as_f64))
            .take_while(Option::is_some)
            .flatten()
            .collect()
    }
}
