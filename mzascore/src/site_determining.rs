//! Site-determining ions: the fragments whose mass depends on which of two
//! competing residues carries the phosphate, and the AScore derived from them.
use mzpeaks::Tolerance;
use tracing::debug;

use crate::generator::FragmentIon;
use crate::matching::{has_match, PeakDepthWindows};
use crate::scorer::{binomial_score, match_probability, ScoreType};

/// Split two theoretical spectra into the ions unique to each.
///
/// An ion of `first` is site-determining if no ion of `second` lies within
/// `tolerance` of it, and vice versa. Both inputs must be sorted by m/z, and so
/// are both outputs.
pub fn site_determining_ions(
    first: &[FragmentIon],
    second: &[FragmentIon],
    tolerance: Tolerance,
) -> (Vec<FragmentIon>, Vec<FragmentIon>) {
    let only_in = |ions: &[FragmentIon], others: &[FragmentIon]| -> Vec<FragmentIon> {
        ions.iter()
            .filter(|ion| !has_match(ion.mz, others, tolerance))
            .copied()
            .collect()
    };
    (only_in(first, second), only_in(second, first))
}

/// The scores of both competitors' site-determining ions at the depth that
/// separates them best
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SiteDeterminingScore {
    pub peak_depth: usize,
    pub first_score: ScoreType,
    pub second_score: ScoreType,
}

impl SiteDeterminingScore {
    /// The signed score difference, positive when the first site is supported
    pub fn ascore(&self) -> ScoreType {
        self.first_score - self.second_score
    }
}

/// Score the site-determining ions of two competing placements at every depth
/// and keep the depth with the largest absolute score difference.
///
/// When no depth separates them, `fallback_depth` is reported and both scores are
/// taken at that depth.
pub fn score_site_determining_ions(
    first: &[FragmentIon],
    second: &[FragmentIon],
    windows: &PeakDepthWindows,
    tolerance: Tolerance,
    depths: usize,
    fallback_depth: usize,
) -> SiteDeterminingScore {
    let score_at = |depth: usize| {
        let p = match_probability(depth, windows.window_width);
        let n_first = windows.count_matches(first, depth, tolerance);
        let n_second = windows.count_matches(second, depth, tolerance);
        SiteDeterminingScore {
            peak_depth: depth,
            first_score: binomial_score(first.len(), n_first, p),
            second_score: binomial_score(second.len(), n_second, p),
        }
    };

    let mut best: Option<SiteDeterminingScore> = None;
    let mut largest = 0.0;
    for depth in 1..=depths {
        let current = score_at(depth);
        let difference = current.ascore().abs();
        if difference > largest {
            largest = difference;
            best = Some(current);
        }
    }
    let result = best.unwrap_or_else(|| score_at(fallback_depth.clamp(1, depths.max(1))));
    debug!(
        "{} vs {} site-determining ions, best separated at depth {} ({:0.3} vs {:0.3})",
        first.len(),
        second.len(),
        result.peak_depth,
        result.first_score,
        result.second_score
    );
    result
}

#[cfg(test)]
mod test {
    use mzpeaks::CentroidPeak;

    use super::*;
    use crate::generator::{BYIonGenerator, TheoreticalSpectrumGenerator};
    use crate::peptide::Peptide;

    fn spectra_for(sequence: &str, first: usize, second: usize) -> (Vec<FragmentIon>, Vec<FragmentIon>) {
        let generator = BYIonGenerator::default();
        let base: Peptide = sequence.parse().unwrap();
        let a = generator.generate(&base.with_phosphosites(&[first]), 1).unwrap();
        let b = generator.generate(&base.with_phosphosites(&[second]), 1).unwrap();
        (a.ions, b.ions)
    }

    #[test_log::test]
    fn test_site_determining_ion_counts() {
        let tol = Tolerance::Da(0.5);
        for (sequence, first, second, expected) in [
            ("VTEQSP", 1, 4, 6),
            ("TYQYS", 0, 4, 7),
            ("TSTYQYSYPP", 2, 6, 8),
        ] {
            let (a, b) = spectra_for(sequence, first, second);
            let (only_a, only_b) = site_determining_ions(&a, &b, tol);
            assert_eq!(only_a.len(), expected, "{sequence} {first}");
            assert_eq!(only_b.len(), expected, "{sequence} {second}");
            assert!(only_a.windows(2).all(|w| w[0].mz <= w[1].mz));
        }
    }

    #[test]
    fn test_identical_spectra_have_no_site_determining_ions() {
        let (a, _) = spectra_for("VTEQSP", 1, 4);
        let (only_a, only_b) = site_determining_ions(&a, &a, Tolerance::Da(0.5));
        assert!(only_a.is_empty());
        assert!(only_b.is_empty());
    }

    #[test]
    fn test_score_site_determining_ions() {
        let (a, b) = spectra_for("TYQYS", 0, 4);
        let tol = Tolerance::Da(0.5);
        let (only_a, only_b) = site_determining_ions(&a, &b, tol);
        let peaks: Vec<CentroidPeak> = a
            .iter()
            .enumerate()
            .map(|(i, ion)| CentroidPeak::new(ion.mz, 100.0, i as u32))
            .collect();
        let windows = PeakDepthWindows::from_peaks(&peaks, 100.0, 10);

        let result = score_site_determining_ions(&only_a, &only_b, &windows, tol, 10, 1);
        assert!(result.ascore() > 0.0);
        assert_eq!(result.second_score, 0.0);

        let reversed = score_site_determining_ions(&only_b, &only_a, &windows, tol, 10, 1);
        assert!((reversed.ascore() + result.ascore()).abs() < 1e-9);
    }

    #[test]
    fn test_no_discrimination_falls_back() {
        let (a, b) = spectra_for("TYQYS", 0, 4);
        let tol = Tolerance::Da(0.5);
        let (only_a, only_b) = site_determining_ions(&a, &b, tol);
        let peaks = vec![CentroidPeak::new(1500.0, 10.0, 0)];
        let windows = PeakDepthWindows::from_peaks(&peaks, 100.0, 10);
        let result = score_site_determining_ions(&only_a, &only_b, &windows, tol, 10, 4);
        assert_eq!(result.peak_depth, 4);
        assert_eq!(result.ascore(), 0.0);
    }
}
