/*! Depth-limited matching of theoretical ions against an experimental spectrum.

The experimental spectrum is cut into fixed-width m/z windows, and only the `d` most
intense peaks of each window are "visible" at peak depth `d`.
*/
use std::cmp::Ordering;

use mzpeaks::{CentroidLike, MZLocated, Tolerance};
use tracing::trace;

use crate::error::ResourceLimit;
use crate::generator::FragmentIon;

/// The width of the m/z windows peaks are picked from
pub const DEFAULT_WINDOW_WIDTH: f64 = 100.0;

/// A peak retained inside a window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowPeak {
    pub mz: f64,
    pub intensity: f32,
}

impl WindowPeak {
    pub fn new(mz: f64, intensity: f32) -> Self {
        Self { mz, intensity }
    }

    /// Most intense first, then lowest m/z first
    fn by_intensity_desc(a: &Self, b: &Self) -> Ordering {
        b.intensity
            .total_cmp(&a.intensity)
            .then(a.mz.total_cmp(&b.mz))
    }
}

/// The top `max_depth` peaks of each m/z window of an experimental spectrum, plus the
/// merged, m/z-sorted set of visible peaks for every depth.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PeakDepthWindows {
    /// The lower m/z bound of the first window
    pub lower_bound: f64,
    pub window_width: f64,
    /// Each window's retained peaks, most intense first
    pub windows: Vec<Vec<WindowPeak>>,
    visible: Vec<Vec<f64>>,
}

/// The number of `window_width` wide windows needed to cover `first_mz..=last_mz`.
///
/// Returns `None` when the bounds or the width are not finite, or when the count does
/// not fit in a `usize`.
pub fn window_count(first_mz: f64, last_mz: f64, window_width: f64) -> Option<usize> {
    if !(first_mz.is_finite() && last_mz.is_finite() && window_width.is_finite())
        || window_width <= 0.0
    {
        return None;
    }
    let lower_bound = (first_mz / window_width).floor() * window_width;
    let upper_bound = (last_mz / window_width).ceil() * window_width;
    let count = ((upper_bound - lower_bound) / window_width).ceil();
    if !count.is_finite() || count >= usize::MAX as f64 {
        return None;
    }
    Some((count as usize).max(1))
}

impl PeakDepthWindows {
    fn empty(window_width: f64) -> Self {
        Self {
            window_width,
            ..Default::default()
        }
    }

    /// Partition `peaks`, which must be sorted by m/z, into windows of `window_width` m/z
    /// and keep the `max_depth` most intense peaks of each.
    ///
    /// The window count is not bounded here, see [`PeakDepthWindows::try_from_peaks`].
    /// A spectrum with a non-finite m/z yields no windows.
    pub fn from_peaks<C: CentroidLike>(peaks: &[C], window_width: f64, max_depth: usize) -> Self {
        let (first, last) = match (peaks.first(), peaks.last()) {
            (Some(first), Some(last)) => (first.mz(), last.mz()),
            _ => return Self::empty(window_width),
        };
        match window_count(first, last, window_width) {
            Some(n_windows) => Self::build(peaks, window_width, max_depth, first, n_windows),
            None => Self::empty(window_width),
        }
    }

    /// As [`PeakDepthWindows::from_peaks`], refusing to allocate more than `max_windows`
    /// windows.
    pub fn try_from_peaks<C: CentroidLike>(
        peaks: &[C],
        window_width: f64,
        max_depth: usize,
        max_windows: usize,
    ) -> Result<Self, ResourceLimit> {
        let (first, last) = match (peaks.first(), peaks.last()) {
            (Some(first), Some(last)) => (first.mz(), last.mz()),
            _ => return Ok(Self::empty(window_width)),
        };
        match window_count(first, last, window_width) {
            Some(n_windows) if n_windows <= max_windows => {
                Ok(Self::build(peaks, window_width, max_depth, first, n_windows))
            }
            windows => Err(ResourceLimit::TooManyWindows {
                windows,
                limit: max_windows,
            }),
        }
    }

    fn build<C: CentroidLike>(
        peaks: &[C],
        window_width: f64,
        max_depth: usize,
        first: f64,
        n_windows: usize,
    ) -> Self {
        let lower_bound = (first / window_width).floor() * window_width;

        let mut windows: Vec<Vec<WindowPeak>> = vec![Vec::new(); n_windows];
        for peak in peaks.iter() {
            let offset = ((peak.mz() - lower_bound) / window_width).floor();
            let index = if offset <= 0.0 {
                0
            } else {
                (offset as usize).min(n_windows - 1)
            };
            windows[index].push(WindowPeak::new(peak.mz(), peak.intensity()));
        }
        for window in windows.iter_mut() {
            window.sort_by(WindowPeak::by_intensity_desc);
            window.truncate(max_depth);
        }

        let visible = (1..=max_depth)
            .map(|depth| {
                let mut mzs: Vec<f64> = windows
                    .iter()
                    .flat_map(|w| w.iter().take(depth).map(|p| p.mz))
                    .collect();
                mzs.sort_by(f64::total_cmp);
                mzs
            })
            .collect();

        trace!(
            "Partitioned {} peaks into {n_windows} windows starting at {lower_bound}",
            peaks.len()
        );
        Self {
            lower_bound,
            window_width,
            windows,
            visible,
        }
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// The deepest depth these windows were built for
    pub fn max_depth(&self) -> usize {
        self.visible.len()
    }

    /// The m/z-sorted positions of every peak visible at `depth`.
    ///
    /// Depths past [`PeakDepthWindows::max_depth`] see the deepest layer.
    pub fn visible_peaks(&self, depth: usize) -> &[f64] {
        if depth == 0 || self.visible.is_empty() {
            return &[];
        }
        let layer = depth.min(self.visible.len()) - 1;
        &self.visible[layer]
    }

    /// Count the theoretical ions matched by a peak visible at `depth`.
    pub fn count_matches(&self, ions: &[FragmentIon], depth: usize, tolerance: Tolerance) -> usize {
        count_matches_in(ions, self.visible_peaks(depth), tolerance)
    }
}

/// Count the `ions` which have at least one peak of `visible` within `tolerance`.
///
/// Both inputs must be sorted by m/z. Each ion is counted at most once, and a peak
/// exactly at the tolerance boundary matches.
pub fn count_matches_in(ions: &[FragmentIon], visible: &[f64], tolerance: Tolerance) -> usize {
    if visible.is_empty() {
        return 0;
    }
    let mut start = 0;
    let mut matched = 0;
    for ion in ions.iter() {
        let (low, high) = tolerance.bounds(ion.mz);
        while start < visible.len() && visible[start] < low {
            start += 1;
        }
        if start == visible.len() {
            break;
        }
        if visible[start] <= high {
            matched += 1;
        }
    }
    matched
}

/// Test whether any of `others`, sorted by m/z, lies within `tolerance` of `mz`
pub(crate) fn has_match(mz: f64, others: &[FragmentIon], tolerance: Tolerance) -> bool {
    let (low, high) = tolerance.bounds(mz);
    let i = others.partition_point(|o| o.mz < low);
    others.get(i).is_some_and(|o| o.mz <= high)
}

#[cfg(test)]
mod test {
    use mzpeaks::CentroidPeak;

    use super::*;
    use crate::generator::IonSeries;

    fn make_spectrum() -> Vec<CentroidPeak> {
        vec![
            CentroidPeak::new(303.1, 1.0, 0),
            CentroidPeak::new(411.1, 1.0, 1),
            CentroidPeak::new(539.2, 1.0, 2),
            CentroidPeak::new(668.3, 1.0, 3),
            CentroidPeak::new(960.5, 1.0, 4),
            CentroidPeak::new(1088.5, 1.0, 5),
        ]
    }

    fn ions(mzs: &[f64]) -> Vec<FragmentIon> {
        mzs.iter()
            .enumerate()
            .map(|(i, mz)| FragmentIon::new(*mz, IonSeries::B, i as u16 + 1, 1))
            .collect()
    }

    #[test]
    fn test_peak_picking_per_window() {
        let windows = PeakDepthWindows::from_peaks(&make_spectrum(), 100.0, 10);
        assert_eq!(windows.len(), 8);
        assert_eq!(windows.lower_bound, 300.0);
        let sizes: Vec<usize> = windows.windows.iter().map(|w| w.len()).collect();
        assert_eq!(sizes, vec![1, 1, 1, 1, 0, 0, 1, 1]);
        assert_eq!(windows.windows[7][0].mz, 1088.5);
    }

    #[test]
    fn test_depth_truncation() {
        let peaks: Vec<CentroidPeak> = (0..15)
            .map(|i| CentroidPeak::new(200.0 + i as f64 * 5.0, (i + 1) as f32, i))
            .collect();
        let windows = PeakDepthWindows::from_peaks(&peaks, 100.0, 10);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows.windows[0].len(), 10);
        // most intense first
        assert_eq!(windows.windows[0][0].mz, 270.0);
        assert_eq!(windows.visible_peaks(1), &[270.0]);
        assert_eq!(windows.visible_peaks(2), &[265.0, 270.0]);
        assert_eq!(windows.visible_peaks(0).len(), 0);
        assert_eq!(windows.visible_peaks(42).len(), 10);
    }

    #[test]
    fn test_peak_on_window_edge() {
        let peaks = vec![
            CentroidPeak::new(150.0, 5.0, 0),
            CentroidPeak::new(200.0, 1.0, 1),
        ];
        let windows = PeakDepthWindows::from_peaks(&peaks, 100.0, 10);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows.windows[0].len(), 2);

        let peaks = vec![CentroidPeak::new(300.0, 5.0, 0)];
        let windows = PeakDepthWindows::from_peaks(&peaks, 100.0, 10);
        assert_eq!(windows.len(), 1);
    }

    #[test]
    fn test_count_matches() {
        let windows = PeakDepthWindows::from_peaks(&make_spectrum(), 100.0, 10);
        let theoretical = ions(&[303.15, 411.05, 500.0, 668.7, 1088.5]);
        let tol = Tolerance::Da(0.1);
        assert_eq!(windows.count_matches(&theoretical, 1, tol), 3);
        assert_eq!(windows.count_matches(&theoretical, 10, tol), 3);
        assert_eq!(windows.count_matches(&theoretical, 1, Tolerance::Da(0.5)), 4);
        assert_eq!(windows.count_matches(&[], 1, tol), 0);
    }

    #[test]
    fn test_ion_counted_once() {
        let visible = [499.9, 500.0, 500.1];
        let theoretical = ions(&[500.0]);
        assert_eq!(count_matches_in(&theoretical, &visible, Tolerance::Da(0.5)), 1);
        let theoretical = ions(&[499.95, 500.05]);
        assert_eq!(count_matches_in(&theoretical, &[500.0], Tolerance::Da(0.5)), 2);
    }

    #[test]
    fn test_tolerance_boundary() {
        let theoretical = ions(&[500.0]);
        assert_eq!(count_matches_in(&theoretical, &[500.5], Tolerance::Da(0.5)), 1);
        assert_eq!(count_matches_in(&theoretical, &[499.5], Tolerance::Da(0.5)), 1);
        assert_eq!(
            count_matches_in(&theoretical, &[500.5 + 1e-9], Tolerance::Da(0.5)),
            0
        );
        assert_eq!(
            count_matches_in(&theoretical, &[499.5 - 1e-9], Tolerance::Da(0.5)),
            0
        );
    }

    #[test]
    fn test_ppm_tolerance() {
        let theoretical = ions(&[1000.0]);
        assert_eq!(
            count_matches_in(&theoretical, &[1000.009], Tolerance::PPM(10.0)),
            1
        );
        assert_eq!(
            count_matches_in(&theoretical, &[1000.02], Tolerance::PPM(10.0)),
            0
        );
    }

    #[test]
    fn test_has_match() {
        let others = ions(&[100.0, 200.0, 300.0]);
        assert!(has_match(200.2, &others, Tolerance::Da(0.5)));
        assert!(!has_match(250.0, &others, Tolerance::Da(0.5)));
        assert!(!has_match(301.0, &others, Tolerance::Da(0.5)));
    }

    #[test]
    fn test_window_count() {
        assert_eq!(window_count(303.1, 1088.5, 100.0), Some(8));
        assert_eq!(window_count(300.0, 300.0, 100.0), Some(1));
        assert_eq!(window_count(239.05, f64::INFINITY, 100.0), None);
        assert_eq!(window_count(f64::NAN, 500.0, 100.0), None);
        assert_eq!(window_count(200.0, 500.0, 0.0), None);
        assert_eq!(window_count(239.05, 1e13, 100.0), Some(99_999_999_998));
    }

    #[test]
    fn test_try_from_peaks_limits_windows() {
        let peaks = vec![
            CentroidPeak::new(239.05, 1.0, 0),
            CentroidPeak::new(1e13, 1.0, 1),
        ];
        assert_eq!(
            PeakDepthWindows::try_from_peaks(&peaks, 100.0, 10, 1000),
            Err(ResourceLimit::TooManyWindows {
                windows: Some(99_999_999_998),
                limit: 1000
            })
        );
        let peaks = vec![
            CentroidPeak::new(239.05, 1.0, 0),
            CentroidPeak::new(f64::INFINITY, 1.0, 1),
        ];
        assert_eq!(
            PeakDepthWindows::try_from_peaks(&peaks, 100.0, 10, 1000),
            Err(ResourceLimit::TooManyWindows {
                windows: None,
                limit: 1000
            })
        );
        assert!(PeakDepthWindows::from_peaks(&peaks, 100.0, 10).is_empty());

        let windows = PeakDepthWindows::try_from_peaks(&make_spectrum(), 100.0, 10, 8).unwrap();
        assert_eq!(windows.len(), 8);
    }
}
