//! * High level APIs for localizing phosphorylation sites
#![allow(clippy::too_many_arguments)]

use std::fmt::{self, Display};

use mzpeaks::{CentroidLike, MZLocated, Tolerance};
use tracing::{debug, trace};

use crate::error::{AScoreError, InvalidInput, ResourceLimit};
use crate::generator::{BYIonGenerator, TheoreticalSpectrumGenerator};
use crate::hit::{
    ascore_key, PeptideHit, ASCORE_PEPTIDE_SCORE, SEARCH_ENGINE_SCORE, SEARCH_ENGINE_SEQUENCE,
};
use crate::matching::{PeakDepthWindows, DEFAULT_WINDOW_WIDTH};
use crate::peptide::Peptide;
use crate::ranking::{
    determine_highest_scoring_permutations, rank_permutations, PermutationScoreTable,
    ProbablePhosphoSites, RankedPermutation,
};
use crate::scorer::{DepthWeights, ScoreType};
use crate::site_determining::{score_site_determining_ions, site_determining_ions};
use crate::sites::{find_candidate_sites, PermutationSet};

/// The unit a fragment mass tolerance is expressed in
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ToleranceUnit {
    #[default]
    Da,
    PPM,
}

impl Display for ToleranceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Da => f.write_str("Da"),
            Self::PPM => f.write_str("ppm"),
        }
    }
}

/// The tunable parameters of a localization run
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AScoreParams {
    /// The fragment mass accuracy constraint, in units of `tolerance_unit`
    pub fragment_tolerance: f64,
    pub tolerance_unit: ToleranceUnit,
    /// The width of the m/z windows peaks are picked from
    pub window_width: f64,
    /// The weight of each peak depth in the peptide score. Its length sets the
    /// number of depths evaluated.
    pub depth_weights: DepthWeights,
    /// The longest peptide accepted
    pub max_peptide_length: usize,
    /// The largest number of permutations one computation may enumerate
    pub max_permutations: usize,
    /// The largest number of m/z windows the experimental spectrum may span
    pub max_windows: usize,
}

impl Default for AScoreParams {
    fn default() -> Self {
        Self {
            fragment_tolerance: 0.5,
            tolerance_unit: ToleranceUnit::Da,
            window_width: DEFAULT_WINDOW_WIDTH,
            depth_weights: DepthWeights::default(),
            max_peptide_length: 40,
            max_permutations: 16384,
            max_windows: 10_000,
        }
    }
}

impl AScoreParams {
    pub fn with_fragment_tolerance(mut self, fragment_tolerance: f64, unit: ToleranceUnit) -> Self {
        self.fragment_tolerance = fragment_tolerance;
        self.tolerance_unit = unit;
        self
    }

    pub fn with_window_width(mut self, window_width: f64) -> Self {
        self.window_width = window_width;
        self
    }

    pub fn with_depth_weights(mut self, depth_weights: DepthWeights) -> Self {
        self.depth_weights = depth_weights;
        self
    }

    pub fn with_max_peptide_length(mut self, max_peptide_length: usize) -> Self {
        self.max_peptide_length = max_peptide_length;
        self
    }

    pub fn with_max_permutations(mut self, max_permutations: usize) -> Self {
        self.max_permutations = max_permutations;
        self
    }

    pub fn with_max_windows(mut self, max_windows: usize) -> Self {
        self.max_windows = max_windows;
        self
    }

    pub fn tolerance(&self) -> Tolerance {
        match self.tolerance_unit {
            ToleranceUnit::Da => Tolerance::Da(self.fragment_tolerance),
            ToleranceUnit::PPM => Tolerance::PPM(self.fragment_tolerance),
        }
    }

    /// The number of peak depths evaluated
    pub fn depths(&self) -> usize {
        self.depth_weights.depths()
    }

    pub fn validate(&self) -> Result<(), InvalidInput> {
        if !(self.fragment_tolerance.is_finite() && self.fragment_tolerance > 0.0) {
            return Err(InvalidInput::NonPositiveTolerance(self.fragment_tolerance));
        }
        if !(self.window_width.is_finite() && self.window_width > 0.0) {
            return Err(InvalidInput::InvalidWindowWidth(self.window_width));
        }
        self.depth_weights.validate()?;
        if self.depths() as f64 >= self.window_width {
            return Err(InvalidInput::InvalidDepthRange {
                max_depth: self.depths(),
                window_width: self.window_width,
            });
        }
        Ok(())
    }
}

/// Check that `spectrum` is non-empty, has finite m/z values and is sorted by m/z
pub fn validate_spectrum<C: CentroidLike>(spectrum: &[C]) -> Result<(), InvalidInput> {
    if spectrum.is_empty() {
        return Err(InvalidInput::EmptySpectrum);
    }
    if let Some((index, mz)) = spectrum
        .iter()
        .map(|p| p.mz())
        .enumerate()
        .find(|(_, mz)| !mz.is_finite())
    {
        return Err(InvalidInput::NonFiniteSpectrum { index, mz });
    }
    for (i, pair) in spectrum.windows(2).enumerate() {
        let (previous, current) = (pair[0].mz(), pair[1].mz());
        if !(previous <= current) {
            return Err(InvalidInput::UnsortedSpectrum {
                index: i + 1,
                previous,
                current,
            });
        }
    }
    Ok(())
}

/// Everything learned while localizing the phosphorylations of one peptide
#[derive(Debug, Clone, PartialEq)]
pub struct Localization {
    /// The sequence with phosphates on the best permutation
    pub sequence: Peptide,
    /// The index of the best permutation
    pub best: usize,
    /// The weighted score of the best permutation
    pub peptide_score: ScoreType,
    /// One entry per phosphorylation site of the best permutation, in residue order
    pub sites: Vec<ProbablePhosphoSites>,
    pub permutations: PermutationSet,
    pub table: PermutationScoreTable,
    pub ranking: Vec<RankedPermutation>,
}

impl Localization {
    /// The per-site AScores, in residue order
    pub fn ascores(&self) -> Vec<ScoreType> {
        self.sites.iter().map(|s| s.ascore).collect()
    }

    /// The weakest per-site AScore
    pub fn min_ascore(&self) -> ScoreType {
        self.sites
            .iter()
            .map(|s| s.ascore)
            .min_by(|a, b| a.total_cmp(b))
            .unwrap_or_default()
    }
}

/// A single-shot localization of `phospho_count` phosphorylations on `hit` against
/// the centroided `spectrum`, using the default [`BYIonGenerator`].
///
/// # Arguments
/// - `hit`: The peptide-spectrum match to localize. It is not modified.
/// - `spectrum`: The experimental peak list, sorted by m/z
/// - `phospho_count`: The number of phosphorylations assumed to be present
/// - `params`: The tolerance, window and depth settings to use
///
/// # See also
/// [`AScoreEngine::compute`]
pub fn compute<C: CentroidLike>(
    hit: &PeptideHit,
    spectrum: &[C],
    phospho_count: usize,
    params: AScoreParams,
) -> Result<PeptideHit, AScoreError> {
    let engine = AScoreEngine::new(params, BYIonGenerator::default());
    engine.compute(hit, spectrum, phospho_count)
}

/// A reusable localization configuration: parameters plus a theoretical spectrum
/// generator.
///
/// An engine holds no per-call state, so one instance can be shared by reference
/// across threads scoring different peptide-spectrum matches.
#[derive(Debug, Clone)]
pub struct AScoreEngine<G: TheoreticalSpectrumGenerator = BYIonGenerator> {
    /// The tolerance, window and depth settings
    params: AScoreParams,
    /// The source of theoretical fragment spectra for each permutation
    generator: G,
}

impl Default for AScoreEngine<BYIonGenerator> {
    fn default() -> Self {
        Self::new(AScoreParams::default(), BYIonGenerator::default())
    }
}

impl<G: TheoreticalSpectrumGenerator> AScoreEngine<G> {
    pub fn new(params: AScoreParams, generator: G) -> Self {
        Self { params, generator }
    }

    pub fn params(&self) -> &AScoreParams {
        &self.params
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Localize `phospho_count` phosphorylations on `hit`, returning a new hit whose
    /// sequence carries the winning placement.
    ///
    /// The returned hit's score is the weakest per-site AScore, and its metadata holds
    /// the original sequence and score, one `AScore_<i>` entry per site in residue
    /// order and the winning permutation's weighted score.
    ///
    /// # Arguments
    /// - `hit`: The peptide-spectrum match to localize. It is not modified.
    /// - `spectrum`: The experimental peak list, sorted by m/z
    /// - `phospho_count`: The number of phosphorylations assumed to be present
    pub fn compute<C: CentroidLike>(
        &self,
        hit: &PeptideHit,
        spectrum: &[C],
        phospho_count: usize,
    ) -> Result<PeptideHit, AScoreError> {
        let localization = self.localize(&hit.sequence, hit.charge, spectrum, phospho_count)?;

        let mut result = hit.clone();
        result.set_meta(SEARCH_ENGINE_SEQUENCE, hit.sequence.to_string());
        result.set_meta(SEARCH_ENGINE_SCORE, hit.score);
        for (i, site) in localization.sites.iter().enumerate() {
            result.set_meta(ascore_key(i + 1), site.ascore);
        }
        result.set_meta(ASCORE_PEPTIDE_SCORE, localization.peptide_score);
        result.score = localization.min_ascore();
        result.sequence = localization.sequence;
        Ok(result)
    }

    /// As [`AScoreEngine::compute`], assuming as many phosphorylations as `hit`
    /// currently carries
    pub fn compute_inferred<C: CentroidLike>(
        &self,
        hit: &PeptideHit,
        spectrum: &[C],
    ) -> Result<PeptideHit, AScoreError> {
        self.compute(hit, spectrum, hit.sequence.phospho_count())
    }

    /// Run the full localization procedure and return every intermediate result.
    pub fn localize<C: CentroidLike>(
        &self,
        sequence: &Peptide,
        charge: i32,
        spectrum: &[C],
        phospho_count: usize,
    ) -> Result<Localization, AScoreError> {
        let span = tracing::debug_span!("localize", sequence = %sequence, charge);
        let _entered = span.enter();

        self.params.validate()?;
        validate_spectrum(spectrum)?;
        if phospho_count == 0 {
            return Err(InvalidInput::NoPhosphorylationSites.into());
        }
        if sequence.len() > self.params.max_peptide_length {
            return Err(ResourceLimit::PeptideTooLong {
                length: sequence.len(),
                limit: self.params.max_peptide_length,
            }
            .into());
        }

        let base = sequence.without_phosphorylation();
        let candidates = find_candidate_sites(&base);
        let permutations = PermutationSet::enumerate_ambiguous(
            &candidates,
            phospho_count,
            self.params.max_permutations,
        )?;
        if permutations.len() <= phospho_count {
            return Err(AScoreError::InsufficientPermutations {
                permutations: permutations.len(),
                sites: phospho_count,
            });
        }
        debug!(
            "Scoring {} permutations of {phospho_count} sites over candidates {candidates:?}",
            permutations.len()
        );

        let depths = self.params.depths();
        let tolerance = self.params.tolerance();
        let windows = PeakDepthWindows::try_from_peaks(
            spectrum,
            self.params.window_width,
            depths,
            self.params.max_windows,
        )?;
        let (table, spectra) = PermutationScoreTable::score_permutations(
            &self.generator,
            &base,
            charge,
            &permutations,
            &windows,
            tolerance,
            depths,
        )?;
        let ranking = rank_permutations(&table, &self.params.depth_weights);
        let mut sites = determine_highest_scoring_permutations(&table, &permutations, &ranking)?;

        let weighted_score_of = |index: usize| {
            ranking
                .iter()
                .find(|r| r.index == index)
                .map(|r| r.weighted_score)
                .unwrap_or_default()
        };

        for site in sites.iter_mut() {
            if weighted_score_of(site.seq_1) == weighted_score_of(site.seq_2) {
                trace!(
                    "Permutations {} and {} are indistinguishable",
                    site.seq_1,
                    site.seq_2
                );
                site.ascore = 0.0;
                continue;
            }
            let (first_ions, second_ions) = site_determining_ions(
                spectra[site.seq_1].as_slice(),
                spectra[site.seq_2].as_slice(),
                tolerance,
            );
            let scored = score_site_determining_ions(
                &first_ions,
                &second_ions,
                &windows,
                tolerance,
                depths,
                site.peak_depth,
            );
            site.peak_depth = scored.peak_depth;
            site.ascore = scored.ascore();
        }

        let best = ranking
            .first()
            .ok_or(AScoreError::InsufficientPermutations {
                permutations: permutations.len(),
                sites: phospho_count,
            })?;
        let localized = sequence.with_phosphosites(&permutations[best.index]);
        debug!("Localized {sequence} to {localized} with site scores {sites:?}");
        Ok(Localization {
            sequence: localized,
            best: best.index,
            peptide_score: best.weighted_score,
            sites,
            permutations,
            table,
            ranking,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_params_validation() {
        assert!(AScoreParams::default().validate().is_ok());
        assert_eq!(
            AScoreParams::default()
                .with_fragment_tolerance(0.0, ToleranceUnit::Da)
                .validate(),
            Err(InvalidInput::NonPositiveTolerance(0.0))
        );
        assert!(matches!(
            AScoreParams::default()
                .with_fragment_tolerance(f64::NAN, ToleranceUnit::Da)
                .validate(),
            Err(InvalidInput::NonPositiveTolerance(_))
        ));
        assert_eq!(
            AScoreParams::default().with_window_width(-1.0).validate(),
            Err(InvalidInput::InvalidWindowWidth(-1.0))
        );
        assert_eq!(
            AScoreParams::default().with_window_width(5.0).validate(),
            Err(InvalidInput::InvalidDepthRange {
                max_depth: 10,
                window_width: 5.0
            })
        );
        assert!(matches!(
            AScoreParams::default()
                .with_fragment_tolerance(10.0, ToleranceUnit::PPM)
                .tolerance(),
            Tolerance::PPM(t) if t == 10.0
        ));
    }

    #[test]
    fn test_validate_spectrum() {
        use mzpeaks::CentroidPeak;
        let empty: Vec<CentroidPeak> = Vec::new();
        assert_eq!(validate_spectrum(&empty), Err(InvalidInput::EmptySpectrum));
        let unsorted = vec![
            CentroidPeak::new(200.0, 1.0, 0),
            CentroidPeak::new(100.0, 1.0, 1),
        ];
        let infinite = vec![
            CentroidPeak::new(100.0, 1.0, 0),
            CentroidPeak::new(f64::INFINITY, 1.0, 1),
        ];
        assert_eq!(
            validate_spectrum(&infinite),
            Err(InvalidInput::NonFiniteSpectrum {
                index: 1,
                mz: f64::INFINITY
            })
        );
        let nan = vec![CentroidPeak::new(f64::NAN, 1.0, 0)];
        assert!(matches!(
            validate_spectrum(&nan),
            Err(InvalidInput::NonFiniteSpectrum { index: 0, .. })
        ));
        assert_eq!(
            validate_spectrum(&unsorted),
            Err(InvalidInput::UnsortedSpectrum {
                index: 1,
                previous: 200.0,
                current: 100.0
            })
        );
    }
}
