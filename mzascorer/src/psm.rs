use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use mzascore::{Peptide, PeptideHit, PeptideParseError};

/// One row of the tab-separated peptide-spectrum match table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PSMRecord {
    /// The native ID of the spectrum, or its zero-based index in the file
    pub spectrum: String,
    pub sequence: String,
    pub charge: i32,
    #[serde(default)]
    pub score: Option<f64>,
    /// The number of phosphorylations to place. When absent, the number already
    /// present in `sequence` is used.
    #[serde(default)]
    pub phospho_count: Option<usize>,
}

impl PSMRecord {
    pub fn to_hit(&self) -> Result<PeptideHit, PeptideParseError> {
        let sequence: Peptide = self.sequence.parse()?;
        Ok(PeptideHit::new(
            sequence,
            self.charge,
            self.score.unwrap_or_default(),
        ))
    }

    /// The number of phosphorylations to localize on `hit`
    pub fn phospho_count_for(&self, hit: &PeptideHit) -> usize {
        self.phospho_count
            .unwrap_or_else(|| hit.sequence.phospho_count())
    }
}

pub fn read_psms_from<R: io::Read>(reader: R) -> Result<Vec<PSMRecord>, csv::Error> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .trim(csv::Trim::All)
        .from_reader(reader);
    rdr.deserialize().collect()
}

pub fn read_psms<P: AsRef<Path>>(path: P) -> Result<Vec<PSMRecord>, csv::Error> {
    let handle = io::BufReader::new(fs::File::open(path.as_ref())?);
    let records = read_psms_from(handle)?;
    debug!(
        "Read {} PSMs from {}",
        records.len(),
        path.as_ref().display()
    );
    Ok(records)
}
