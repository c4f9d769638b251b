//! Scoring every permutation across peak depths and picking the competing pairs
//! of permutations for each phosphorylation site.
use mzpeaks::Tolerance;
use tracing::{debug, trace};

use crate::error::AScoreError;
use crate::generator::{TheoreticalSpectrum, TheoreticalSpectrumGenerator};
use crate::matching::PeakDepthWindows;
use crate::peptide::Peptide;
use crate::scorer::{binomial_score, match_probability, DepthWeights, ScoreType};
use crate::sites::PermutationSet;

/// The per-depth scores of every permutation, `scores[permutation][depth - 1]`,
/// stored row-major in one buffer.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PermutationScoreTable {
    depths: usize,
    scores: Vec<ScoreType>,
}

impl PermutationScoreTable {
    pub fn new(depths: usize) -> Self {
        Self {
            depths,
            scores: Vec::new(),
        }
    }

    pub fn with_capacity(depths: usize, permutations: usize) -> Self {
        Self {
            depths,
            scores: Vec::with_capacity(depths * permutations),
        }
    }

    /// Build a table from explicit rows, which must all have the same length
    pub fn from_rows<R: AsRef<[ScoreType]>>(rows: &[R]) -> Option<Self> {
        let depths = rows.first().map(|r| r.as_ref().len())?;
        let mut table = Self::with_capacity(depths, rows.len());
        for row in rows {
            if row.as_ref().len() != depths {
                return None;
            }
            table.scores.extend_from_slice(row.as_ref());
        }
        Some(table)
    }

    pub fn push_row(&mut self, row: &[ScoreType]) {
        debug_assert_eq!(row.len(), self.depths);
        self.scores.extend_from_slice(row);
    }

    pub fn depths(&self) -> usize {
        self.depths
    }

    pub fn len(&self) -> usize {
        if self.depths == 0 {
            0
        } else {
            self.scores.len() / self.depths
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn row(&self, permutation: usize) -> &[ScoreType] {
        &self.scores[permutation * self.depths..(permutation + 1) * self.depths]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[ScoreType]> + '_ {
        self.scores.chunks_exact(self.depths.max(1))
    }

    /// Generate the theoretical spectrum of every permutation and score it at every depth.
    ///
    /// Returns the score table and the theoretical spectra, indexed like `permutations`.
    /// Generator output is validated here, so a malformed spectrum surfaces as
    /// [`AScoreError::GeneratorFailure`].
    ///
    /// # Arguments
    /// - `generator`: The source of theoretical spectra
    /// - `peptide`: The sequence with every phosphorylation removed
    /// - `charge`: The precursor charge state
    /// - `permutations`: The site placements to score
    /// - `windows`: The experimental spectrum, partitioned by window
    /// - `tolerance`: The fragment mass accuracy constraint
    /// - `depths`: The number of peak depths to score, starting from 1
    pub fn score_permutations<G: TheoreticalSpectrumGenerator + ?Sized>(
        generator: &G,
        peptide: &Peptide,
        charge: i32,
        permutations: &PermutationSet,
        windows: &PeakDepthWindows,
        tolerance: Tolerance,
        depths: usize,
    ) -> Result<(Self, Vec<TheoreticalSpectrum>), AScoreError> {
        let mut table = Self::with_capacity(depths, permutations.len());
        let mut spectra = Vec::with_capacity(permutations.len());
        for sites in permutations.iter() {
            let candidate = peptide.with_phosphosites(sites);
            let spectrum = generator.generate(&candidate, charge)?;
            spectrum.validate(&candidate)?;
            let row = score_spectrum_across_depths(&spectrum, windows, tolerance, depths);
            trace!("{candidate} scored {row:?}");
            table.push_row(&row);
            spectra.push(spectrum);
        }
        Ok((table, spectra))
    }
}

/// Score one theoretical spectrum at every depth from 1 through `depths`
pub fn score_spectrum_across_depths(
    spectrum: &TheoreticalSpectrum,
    windows: &PeakDepthWindows,
    tolerance: Tolerance,
    depths: usize,
) -> Vec<ScoreType> {
    let total = spectrum.len();
    (1..=depths)
        .map(|depth| {
            let n = windows.count_matches(spectrum.as_slice(), depth, tolerance);
            binomial_score(total, n, match_probability(depth, windows.window_width))
        })
        .collect()
}

/// A permutation's position in the ranking
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RankedPermutation {
    pub index: usize,
    pub weighted_score: ScoreType,
}

/// Order permutations from best to worst by their weighted peptide score.
///
/// Ties are broken in favor of the permutation with the larger index so the
/// ranking is fully deterministic.
pub fn rank_permutations(
    table: &PermutationScoreTable,
    weights: &DepthWeights,
) -> Vec<RankedPermutation> {
    let mut ranking: Vec<RankedPermutation> = table
        .rows()
        .take(table.len())
        .enumerate()
        .map(|(index, row)| RankedPermutation {
            index,
            weighted_score: weights.peptide_score(row),
        })
        .collect();
    ranking.sort_by(|a, b| {
        b.weighted_score
            .total_cmp(&a.weighted_score)
            .then(b.index.cmp(&a.index))
    });
    ranking
}

/// The best permutation and the best competitor that differs from it only at one site.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProbablePhosphoSites {
    /// The site occupied in the best permutation
    pub first: usize,
    /// The site occupied instead in the competing permutation
    pub second: usize,
    /// The index of the best permutation
    pub seq_1: usize,
    /// The index of the competing permutation
    pub seq_2: usize,
    /// The peak depth at which the two permutations are best separated
    pub peak_depth: usize,
    pub ascore: ScoreType,
}

/// The first depth at which `best` outscores `other` by the largest margin,
/// or depth 1 if it never outscores it.
pub fn most_discriminating_depth(best: &[ScoreType], other: &[ScoreType]) -> usize {
    let mut peak_depth = 1;
    let mut largest = 0.0;
    for (i, (a, b)) in best.iter().zip(other.iter()).enumerate() {
        let difference = a - b;
        if difference > largest {
            largest = difference;
            peak_depth = i + 1;
        }
    }
    peak_depth
}

/// For each site of the top-ranked permutation, find the highest-ranked permutation
/// which moves only that site, and the depth which best separates the two.
///
/// Fails with [`AScoreError::InsufficientPermutations`] when there are not more
/// permutations than sites, or when no such competitor exists.
pub fn determine_highest_scoring_permutations(
    table: &PermutationScoreTable,
    permutations: &PermutationSet,
    ranking: &[RankedPermutation],
) -> Result<Vec<ProbablePhosphoSites>, AScoreError> {
    let k = permutations.sites_per_permutation();
    let insufficient = || AScoreError::InsufficientPermutations {
        permutations: permutations.len(),
        sites: k,
    };
    if permutations.len() <= k || table.len() != permutations.len() {
        return Err(insufficient());
    }
    let best = ranking.first().ok_or_else(insufficient)?.index;
    let best_sites = &permutations[best];

    let mut sites = Vec::with_capacity(k);
    for (i, site) in best_sites.iter().copied().enumerate() {
        let competitor = ranking
            .iter()
            .find(|r| {
                let candidate = &permutations[r.index];
                !candidate.contains(&site)
                    && best_sites
                        .iter()
                        .enumerate()
                        .all(|(j, s)| j == i || candidate.contains(s))
            })
            .ok_or_else(insufficient)?;
        let seq_2 = competitor.index;
        let second = permutations[seq_2]
            .iter()
            .copied()
            .find(|s| !best_sites.contains(s))
            .ok_or_else(insufficient)?;
        let peak_depth = most_discriminating_depth(table.row(best), table.row(seq_2));
        debug!(
            "Site {site} of permutation {best} competes with site {second} of permutation {seq_2} at depth {peak_depth}"
        );
        sites.push(ProbablePhosphoSites {
            first: site,
            second,
            seq_1: best,
            seq_2,
            peak_depth,
            ascore: 0.0,
        });
    }
    Ok(sites)
}
