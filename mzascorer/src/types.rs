use std::fmt::{self, Display};

use mzdata::spectrum::utils::Collator;
use mzpeaks::CentroidPeak;
use serde::{Deserialize, Serialize};

use mzascore::PeptideHit;

pub(crate) type CPeak = CentroidPeak;
pub(crate) type ResultCollator = Collator<ScoredPSM>;
pub(crate) const BUFFER_SIZE: usize = 10_000;

/// What happened to a single peptide-spectrum match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PSMStatus {
    Scored,
    Skipped,
    Failed(String),
}

impl Display for PSMStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scored => f.write_str("scored"),
            Self::Skipped => f.write_str("skipped"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// A peptide-spectrum match after localization was attempted, keyed by its row in
/// the input table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPSM {
    pub index: usize,
    pub spectrum: String,
    /// The sequence exactly as it was read
    pub input_sequence: String,
    pub status: PSMStatus,
    /// The localized hit, or the unchanged hit when skipped
    pub hit: Option<PeptideHit>,
}

impl ScoredPSM {
    pub fn new(
        index: usize,
        spectrum: String,
        input_sequence: String,
        status: PSMStatus,
        hit: Option<PeptideHit>,
    ) -> Self {
        Self {
            index,
            spectrum,
            input_sequence,
            status,
            hit,
        }
    }
}
