//! Candidate phosphorylation sites and the permutations of phosphates over them
use std::ops::Index;

use itertools::Itertools;
use tracing::trace;

use crate::error::{AScoreError, InvalidInput, ResourceLimit};
use crate::peptide::Peptide;

/// Find every residue position which could carry a phosphate, in sequence order.
///
/// Existing phosphorylations are ignored, while residues bearing any other
/// modification are not candidates.
pub fn find_candidate_sites(peptide: &Peptide) -> Vec<usize> {
    peptide
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_phospho_acceptor())
        .map(|(i, _)| i)
        .collect()
}

/// Compute `C(n, k)`, returning `None` on overflow
pub fn binomial_coefficient(n: usize, k: usize) -> Option<usize> {
    if k > n {
        return Some(0);
    }
    let k = k.min(n - k);
    let mut acc: usize = 1;
    for i in 0..k {
        // acc * (n - i) is always divisible by (i + 1) at this point
        acc = acc.checked_mul(n - i)? / (i + 1);
    }
    Some(acc)
}

/// Every placement of `k` phosphates over a set of candidate sites, stored in a
/// single pre-sized buffer.
///
/// Permutations are in lexicographic order of their (sorted) site lists, so the
/// index of a permutation is stable for a given input.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PermutationSet {
    sites_per_permutation: usize,
    positions: Vec<usize>,
}

impl PermutationSet {
    /// Enumerate all `C(n, k)` subsets of `candidates` of size `k`.
    ///
    /// Fails with [`ResourceLimit::TooManyPermutations`] when the count would exceed
    /// `max_permutations` or overflow.
    pub fn enumerate(
        candidates: &[usize],
        k: usize,
        max_permutations: usize,
    ) -> Result<Self, AScoreError> {
        let n = candidates.len();
        let count = binomial_coefficient(n, k);
        match count {
            Some(count) if count <= max_permutations => {}
            _ => {
                return Err(ResourceLimit::TooManyPermutations {
                    candidates: n,
                    sites: k,
                    permutations: count,
                    limit: max_permutations,
                }
                .into())
            }
        }
        let count = count.unwrap_or_default();
        if k == 0 {
            return Ok(Self {
                sites_per_permutation: 0,
                positions: Vec::new(),
            });
        }
        trace!("Enumerating {count} permutations of {k} sites over {n} candidates");
        let mut positions = Vec::with_capacity(count * k);
        for combination in candidates.iter().copied().combinations(k) {
            positions.extend(combination);
        }
        Ok(Self {
            sites_per_permutation: k,
            positions,
        })
    }

    /// Like [`PermutationSet::enumerate`] but enforcing that the placement is
    /// actually ambiguous, `0 < k < n`.
    pub fn enumerate_ambiguous(
        candidates: &[usize],
        k: usize,
        max_permutations: usize,
    ) -> Result<Self, AScoreError> {
        if k == 0 {
            return Err(InvalidInput::NoPhosphorylationSites.into());
        }
        if k >= candidates.len() {
            return Err(InvalidInput::TooFewCandidateSites {
                sites: k,
                candidates: candidates.len(),
            }
            .into());
        }
        Self::enumerate(candidates, k, max_permutations)
    }

    /// Build a set from explicit permutations, each of which must have `k` sites
    pub fn from_permutations<I: IntoIterator<Item = Vec<usize>>>(
        k: usize,
        permutations: I,
    ) -> Option<Self> {
        let mut positions = Vec::new();
        for mut perm in permutations {
            if perm.len() != k {
                return None;
            }
            perm.sort_unstable();
            positions.extend(perm);
        }
        Some(Self {
            sites_per_permutation: k,
            positions,
        })
    }

    pub fn sites_per_permutation(&self) -> usize {
        self.sites_per_permutation
    }

    pub fn len(&self) -> usize {
        if self.sites_per_permutation == 0 {
            0
        } else {
            self.positions.len() / self.sites_per_permutation
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&[usize]> {
        let k = self.sites_per_permutation;
        let start = index.checked_mul(k)?;
        self.positions.get(start..start + k).filter(|_| k > 0)
    }

    pub fn iter(&self) -> PermutationIter<'_> {
        PermutationIter {
            set: self,
            index: 0,
        }
    }
}

impl Index<usize> for PermutationSet {
    type Output = [usize];

    fn index(&self, index: usize) -> &Self::Output {
        let k = self.sites_per_permutation;
        &self.positions[index * k..(index + 1) * k]
    }
}

/// An iterator over the site lists of a [`PermutationSet`]
#[derive(Debug, Clone)]
pub struct PermutationIter<'a> {
    set: &'a PermutationSet,
    index: usize,
}

impl<'a> Iterator for PermutationIter<'a> {
    type Item = &'a [usize];

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.set.get(self.index)?;
        self.index += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.set.len().saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PermutationIter<'_> {}

impl<'a> IntoIterator for &'a PermutationSet {
    type Item = &'a [usize];
    type IntoIter = PermutationIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
