//! `mzascore` localizes phosphorylations on peptides identified from tandem mass
//! spectra using the AScore algorithm.
//!
//! Every way of placing the assumed number of phosphates on the candidate serine,
//! threonine and tyrosine residues is scored against the experimental spectrum at
//! several peak depths. The best placement is then compared site by site with its
//! closest competitor using only the fragment ions that tell the two apart.
//!
//! ```rust
//! use mzpeaks::CentroidPeak;
//! use mzascore::prelude::*;
//!
//! let hit = PeptideHit::new("AST(Phospho)PK".parse().unwrap(), 2, 30.0);
//! let peaks = vec![
//!     CentroidPeak::new(147.11, 100.0, 0),
//!     CentroidPeak::new(239.05, 1000.0, 1),
//!     CentroidPeak::new(345.19, 1000.0, 2),
//! ];
//! let engine = AScoreEngine::default();
//! let localized = engine.compute_inferred(&hit, &peaks).unwrap();
//! assert_eq!(localized.sequence.to_string(), "AS(Phospho)TPK");
//! ```
pub mod api;
pub mod error;
pub mod generator;
pub mod hit;
pub mod matching;
pub mod peptide;
pub mod ranking;
pub mod scorer;
pub mod site_determining;
pub mod sites;

pub use crate::api::{compute, AScoreEngine, AScoreParams, Localization, ToleranceUnit};
pub use crate::error::{AScoreError, GeneratorError, InvalidInput, ResourceLimit};
pub use crate::generator::{
    BYIonGenerator, FragmentIon, FragmentationParams, IonSeries, TheoreticalSpectrum,
    TheoreticalSpectrumGenerator,
};
pub use crate::hit::{MetaValue, PeptideHit};
pub use crate::peptide::{Modification, Peptide, PeptideParseError, Residue};
pub use crate::scorer::{DepthWeights, ScoreType};

pub mod prelude {
    pub use crate::api::{AScoreEngine, AScoreParams, ToleranceUnit};
    pub use crate::generator::TheoreticalSpectrumGenerator;
    pub use crate::hit::{MetaValue, PeptideHit};
    pub use crate::peptide::Peptide;
}
