//! Failure conditions for phosphorylation site localization
use thiserror::Error;

/// A precondition on the inputs to [`AScoreEngine::compute`](crate::api::AScoreEngine::compute)
/// that was not satisfied.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidInput {
    #[error("The experimental spectrum is empty")]
    EmptySpectrum,
    #[error("The experimental spectrum is not sorted by m/z at peak {index} ({previous} > {current})")]
    UnsortedSpectrum {
        index: usize,
        previous: f64,
        current: f64,
    },
    #[error("The experimental spectrum has a non-finite m/z {mz} at peak {index}")]
    NonFiniteSpectrum { index: usize, mz: f64 },
    #[error("The fragment mass tolerance must be positive and finite, got {0}")]
    NonPositiveTolerance(f64),
    #[error("The number of phosphorylation sites must be positive")]
    NoPhosphorylationSites,
    #[error("{sites} phosphorylation sites cannot be disambiguated over {candidates} candidate residues")]
    TooFewCandidateSites { sites: usize, candidates: usize },
    #[error("The peak depth count must be positive and below the window width {window_width}, got {max_depth}")]
    InvalidDepthRange { max_depth: usize, window_width: f64 },
    #[error("The depth weights must be finite and non-negative with at least one positive entry")]
    InvalidDepthWeights,
    #[error("The window width must be positive and finite, got {0}")]
    InvalidWindowWidth(f64),
}

/// A bound on the amount of work a single computation is allowed to do
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResourceLimit {
    #[error("The peptide has {length} residues, exceeding the limit of {limit}")]
    PeptideTooLong { length: usize, limit: usize },
    #[error("Placing {sites} sites on {candidates} candidates requires {permutations:?} permutations, exceeding the limit of {limit}")]
    TooManyPermutations {
        candidates: usize,
        sites: usize,
        /// `None` when the count does not fit in a `usize`
        permutations: Option<usize>,
        limit: usize,
    },
    #[error("The spectrum spans {windows:?} m/z windows, exceeding the limit of {limit}")]
    TooManyWindows {
        /// `None` when the count does not fit in a `usize`
        windows: Option<usize>,
        limit: usize,
    },
}

/// A failure reported by, or detected in the output of, a
/// [`TheoreticalSpectrumGenerator`](crate::generator::TheoreticalSpectrumGenerator)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeneratorError {
    #[error("No mass is known for residue '{0}'")]
    UnknownResidue(char),
    #[error("No mass is known for modification {0}")]
    UnknownModification(String),
    #[error("Failed to build a chemical composition for {0}")]
    InvalidComposition(String),
    #[error("The theoretical spectrum for {0} contains no fragment ions")]
    EmptySpectrum(String),
    #[error("The theoretical spectrum for {sequence} is not sorted by m/z at ion {index}")]
    UnsortedSpectrum { sequence: String, index: usize },
    #[error("Charge state {0} is not supported")]
    UnsupportedCharge(i32),
}

/// An error that might occur while localizing phosphorylation sites
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AScoreError {
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] InvalidInput),
    #[error("{permutations} permutations are too few to compare {sites} phosphorylation sites")]
    InsufficientPermutations { permutations: usize, sites: usize },
    #[error("Resource limit exceeded: {0}")]
    ResourceLimit(#[from] ResourceLimit),
    #[error("Theoretical spectrum generation failed: {0}")]
    GeneratorFailure(#[from] GeneratorError),
}
