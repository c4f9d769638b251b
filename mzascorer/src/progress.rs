use std::ops::{Add, AddAssign};

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ProgressRecord {
    pub psms: usize,
    pub scored: usize,
    pub skipped: usize,
    pub failed: usize,
    pub spectra_missing: usize,
}

impl ProgressRecord {
    pub fn sum(self, other: Self) -> Self {
        self + other
    }
}

impl Add for ProgressRecord {
    type Output = ProgressRecord;

    fn add(self, rhs: Self) -> Self::Output {
        let mut dup = self;
        dup += rhs;
        dup
    }
}

impl AddAssign for ProgressRecord {
    fn add_assign(&mut self, rhs: Self) {
        self.psms += rhs.psms;
        self.scored += rhs.scored;
        self.skipped += rhs.skipped;
        self.failed += rhs.failed;
        self.spectra_missing += rhs.spectra_missing;
    }
}

impl std::iter::Sum for ProgressRecord {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Self::add)
    }
}
