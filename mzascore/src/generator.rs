//! Theoretical fragment ion spectra for candidate phosphorylation placements
use std::fmt::{self, Display};

use chemical_elements::{ChemicalComposition, ElementSpecification, PROTON};

use crate::error::GeneratorError;
use crate::peptide::{Modification, Peptide, RESIDUE_FORMULAS};

const WATER: &[(&str, i32)] = &[("H", 2), ("O", 1)];

/// Compute the monoisotopic mass of an elemental formula given as `(symbol, count)` pairs
pub fn formula_mass(formula: &[(&str, i32)]) -> Option<f64> {
    let mut composition = ChemicalComposition::new();
    for (symbol, count) in formula.iter() {
        let element = ElementSpecification::parse(symbol).ok()?;
        composition.set(element, *count);
    }
    Some(composition.mass())
}

/// The backbone cleavage series a fragment ion belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IonSeries {
    B,
    Y,
}

impl Display for IonSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::B => f.write_str("b"),
            Self::Y => f.write_str("y"),
        }
    }
}

/// A single theoretical fragment ion
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FragmentIon {
    pub mz: f64,
    pub series: IonSeries,
    /// The number of residues covered by the fragment
    pub ordinal: u16,
    pub charge: i32,
}

impl FragmentIon {
    pub fn new(mz: f64, series: IonSeries, ordinal: u16, charge: i32) -> Self {
        Self {
            mz,
            series,
            ordinal,
            charge,
        }
    }
}

impl Display for FragmentIon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.series, self.ordinal)?;
        if self.charge > 1 {
            write!(f, "^{}", self.charge)?;
        }
        write!(f, "@{:0.4}", self.mz)
    }
}

/// A list of fragment ions that is expected to be sorted by m/z
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TheoreticalSpectrum {
    pub ions: Vec<FragmentIon>,
}

impl TheoreticalSpectrum {
    pub fn new(ions: Vec<FragmentIon>) -> Self {
        Self { ions }
    }

    pub fn len(&self) -> usize {
        self.ions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FragmentIon> {
        self.ions.iter()
    }

    pub fn as_slice(&self) -> &[FragmentIon] {
        &self.ions
    }

    /// Sort the ions by m/z, breaking ties by series, ordinal and charge
    pub fn sort(&mut self) {
        self.ions.sort_by(|a, b| {
            a.mz.total_cmp(&b.mz)
                .then(a.series.cmp(&b.series))
                .then(a.ordinal.cmp(&b.ordinal))
                .then(a.charge.cmp(&b.charge))
        });
    }

    /// The index of the first ion that is out of m/z order, if any
    pub fn first_unsorted(&self) -> Option<usize> {
        self.ions
            .windows(2)
            .position(|w| !(w[0].mz <= w[1].mz))
            .map(|i| i + 1)
    }

    /// Check the contract every generator must uphold: a non-empty list sorted by m/z
    pub fn validate(&self, sequence: &Peptide) -> Result<(), GeneratorError> {
        if self.is_empty() {
            return Err(GeneratorError::EmptySpectrum(sequence.to_string()));
        }
        if let Some(index) = self.first_unsorted() {
            return Err(GeneratorError::UnsortedSpectrum {
                sequence: sequence.to_string(),
                index,
            });
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a TheoreticalSpectrum {
    type Item = &'a FragmentIon;
    type IntoIter = std::slice::Iter<'a, FragmentIon>;

    fn into_iter(self) -> Self::IntoIter {
        self.ions.iter()
    }
}

impl FromIterator<FragmentIon> for TheoreticalSpectrum {
    fn from_iter<T: IntoIterator<Item = FragmentIon>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// A source of theoretical fragment spectra for a fully specified peptide.
///
/// Implementations must be deterministic and return ions sorted by m/z. They
/// are shared read-only across a batch, hence `Send + Sync`.
pub trait TheoreticalSpectrumGenerator: Send + Sync {
    /// Generate the fragment ions of `peptide` observed from a precursor of charge `charge`
    fn generate(&self, peptide: &Peptide, charge: i32) -> Result<TheoreticalSpectrum, GeneratorError>;
}

impl<T: TheoreticalSpectrumGenerator + ?Sized> TheoreticalSpectrumGenerator for &T {
    fn generate(&self, peptide: &Peptide, charge: i32) -> Result<TheoreticalSpectrum, GeneratorError> {
        (**self).generate(peptide, charge)
    }
}

/// Parameters controlling which fragment ions [`BYIonGenerator`] produces
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FragmentationParams {
    /// Whether to include the b1 ion, which is rarely observed
    pub add_first_prefix_ion: bool,
    /// The highest fragment charge state to produce. Fragments are produced
    /// up to one less than the precursor charge, and at least at charge 1.
    pub max_fragment_charge: i32,
    /// The mass of the charge carrier, e.g. proton mass
    pub charge_carrier: f64,
}

impl Default for FragmentationParams {
    fn default() -> Self {
        Self {
            add_first_prefix_ion: false,
            max_fragment_charge: 3,
            charge_carrier: PROTON,
        }
    }
}

impl FragmentationParams {
    /// The fragment charge states used for a precursor of charge `charge`
    pub fn fragment_charges(&self, charge: i32) -> std::ops::RangeInclusive<i32> {
        1..=(charge - 1).max(1).min(self.max_fragment_charge.max(1))
    }
}

/// A generator of singly and multiply charged b and y ions from residue compositions
#[derive(Debug, Clone)]
pub struct BYIonGenerator {
    pub params: FragmentationParams,
    residue_masses: [Option<f64>; 26],
    modification_masses: Vec<(Modification, Option<f64>)>,
    water_mass: Option<f64>,
}

impl Default for BYIonGenerator {
    fn default() -> Self {
        Self::new(FragmentationParams::default())
    }
}

impl BYIonGenerator {
    pub fn new(params: FragmentationParams) -> Self {
        let mut residue_masses = [None; 26];
        for (code, formula) in RESIDUE_FORMULAS.iter() {
            residue_masses[(*code as u8 - b'A') as usize] = formula_mass(formula);
        }
        let modification_masses = [
            Modification::Phospho,
            Modification::Oxidation,
            Modification::Carbamidomethyl,
            Modification::Acetyl,
            Modification::Deamidated,
            Modification::Methyl,
            Modification::Dimethyl,
        ]
        .into_iter()
        .map(|m| (m, m.formula().and_then(formula_mass)))
        .collect();
        Self {
            params,
            residue_masses,
            modification_masses,
            water_mass: formula_mass(WATER),
        }
    }

    pub fn residue_mass(&self, code: char) -> Result<f64, GeneratorError> {
        if !code.is_ascii_uppercase() {
            return Err(GeneratorError::UnknownResidue(code));
        }
        self.residue_masses[(code as u8 - b'A') as usize].ok_or(GeneratorError::UnknownResidue(code))
    }

    pub fn modification_mass(&self, modification: &Modification) -> Result<f64, GeneratorError> {
        if let Modification::MassDelta(delta) = modification {
            return Ok(*delta);
        }
        self.modification_masses
            .iter()
            .find(|(m, _)| m == modification)
            .and_then(|(_, mass)| *mass)
            .ok_or_else(|| GeneratorError::UnknownModification(modification.to_string()))
    }

    /// The mass each residue contributes to a fragment, with modifications and
    /// the N-terminal modification folded into the first residue.
    fn residue_increments(&self, peptide: &Peptide) -> Result<Vec<f64>, GeneratorError> {
        let mut increments = Vec::with_capacity(peptide.len());
        for residue in peptide.iter() {
            let mut mass = self.residue_mass(residue.code)?;
            if let Some(modification) = residue.modification.as_ref() {
                mass += self.modification_mass(modification)?;
            }
            increments.push(mass);
        }
        if let (Some(first), Some(n_term)) = (increments.first_mut(), peptide.n_term.as_ref()) {
            *first += self.modification_mass(n_term)?;
        }
        Ok(increments)
    }
}

impl TheoreticalSpectrumGenerator for BYIonGenerator {
    fn generate(&self, peptide: &Peptide, charge: i32) -> Result<TheoreticalSpectrum, GeneratorError> {
        if charge < 1 {
            return Err(GeneratorError::UnsupportedCharge(charge));
        }
        let water = self
            .water_mass
            .ok_or_else(|| GeneratorError::InvalidComposition("H2O".to_string()))?;
        let increments = self.residue_increments(peptide)?;
        let n = increments.len();
        let charges = self.params.fragment_charges(charge);
        let carrier = self.params.charge_carrier;
        let first_prefix = if self.params.add_first_prefix_ion { 1 } else { 2 };

        let mut suffix_masses = vec![0.0; n + 1];
        for i in (0..n).rev() {
            suffix_masses[i] = suffix_masses[i + 1] + increments[i];
        }

        let mut ions = Vec::with_capacity(2 * n * charges.clone().count());
        let mut prefix = 0.0;
        for (i, increment) in increments.iter().enumerate().take(n.saturating_sub(1)) {
            prefix += increment;
            let b_ordinal = i + 1;
            let y_ordinal = n - b_ordinal;
            let suffix = suffix_masses[b_ordinal] + water;
            for z in charges.clone() {
                let zf = z as f64;
                if b_ordinal >= first_prefix {
                    ions.push(FragmentIon::new(
                        (prefix + zf * carrier) / zf,
                        IonSeries::B,
                        b_ordinal as u16,
                        z,
                    ));
                }
                ions.push(FragmentIon::new(
                    (suffix + zf * carrier) / zf,
                    IonSeries::Y,
                    y_ordinal as u16,
                    z,
                ));
            }
        }
        let mut spectrum = TheoreticalSpectrum::new(ions);
        spectrum.sort();
        Ok(spectrum)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn ion_of(spectrum: &TheoreticalSpectrum, series: IonSeries, ordinal: u16) -> f64 {
        spectrum
            .iter()
            .find(|i| i.series == series && i.ordinal == ordinal && i.charge == 1)
            .map(|i| i.mz)
            .unwrap()
    }

    #[test]
    fn test_residue_masses() {
        let generator = BYIonGenerator::default();
        assert!((generator.residue_mass('G').unwrap() - 57.021464).abs() < 1e-4);
        assert!((generator.residue_mass('S').unwrap() - 87.032028).abs() < 1e-4);
        assert!((generator.residue_mass('W').unwrap() - 186.079313).abs() < 1e-4);
        assert!(
            (generator.modification_mass(&Modification::Phospho).unwrap() - 79.966331).abs()
                < 1e-4
        );
        assert!(matches!(
            generator.residue_mass('X'),
            Err(GeneratorError::UnknownResidue('X'))
        ));
    }

    #[test]
    fn test_by_ions() {
        let generator = BYIonGenerator::default();
        let peptide: Peptide = "PEPTIDE".parse().unwrap();
        let spectrum = generator.generate(&peptide, 1).unwrap();
        // no b1, six y ions and five b ions
        assert_eq!(spectrum.len(), 11);
        assert!(spectrum.first_unsorted().is_none());
        assert!((ion_of(&spectrum, IonSeries::B, 2) - 227.102634).abs() < 1e-3);
        assert!((ion_of(&spectrum, IonSeries::Y, 1) - 148.060434).abs() < 1e-3);
        assert!((ion_of(&spectrum, IonSeries::Y, 6) - 703.314435).abs() < 1e-3);

        let mut params = FragmentationParams::default();
        params.add_first_prefix_ion = true;
        let spectrum = BYIonGenerator::new(params).generate(&peptide, 1).unwrap();
        assert_eq!(spectrum.len(), 12);
        assert!((ion_of(&spectrum, IonSeries::B, 1) - 98.060040).abs() < 1e-3);
    }

    #[test]
    fn test_fragment_charges() {
        let generator = BYIonGenerator::default();
        let peptide: Peptide = "PEPTIDE".parse().unwrap();
        assert_eq!(generator.generate(&peptide, 2).unwrap().len(), 11);
        let spectrum = generator.generate(&peptide, 3).unwrap();
        assert_eq!(spectrum.len(), 22);
        let b2_2 = spectrum
            .iter()
            .find(|i| i.series == IonSeries::B && i.ordinal == 2 && i.charge == 2)
            .unwrap();
        assert!((b2_2.mz - (227.102634 + PROTON) / 2.0).abs() < 1e-3);
        assert_eq!(generator.params.fragment_charges(10), 1..=3);
        assert!(matches!(
            generator.generate(&peptide, 0),
            Err(GeneratorError::UnsupportedCharge(0))
        ));
    }

    #[test]
    fn test_modified_ions() {
        let generator = BYIonGenerator::default();
        let plain = generator.generate(&"PEPSIDE".parse().unwrap(), 1).unwrap();
        let phospho = generator
            .generate(&"PEPS(Phospho)IDE".parse().unwrap(), 1)
            .unwrap();
        let delta = ion_of(&phospho, IonSeries::B, 4) - ion_of(&plain, IonSeries::B, 4);
        assert!((delta - 79.966331).abs() < 1e-4);
        let delta = ion_of(&phospho, IonSeries::B, 3) - ion_of(&plain, IonSeries::B, 3);
        assert!(delta.abs() < 1e-9);

        let acetyl = generator
            .generate(&".(Acetyl)PEPSIDE".parse().unwrap(), 1)
            .unwrap();
        let delta = ion_of(&acetyl, IonSeries::B, 2) - ion_of(&plain, IonSeries::B, 2);
        assert!((delta - 42.010565).abs() < 1e-4);
    }

    #[test]
    fn test_validate() {
        let peptide: Peptide = "PEPTIDE".parse().unwrap();
        let empty = TheoreticalSpectrum::default();
        assert!(matches!(
            empty.validate(&peptide),
            Err(GeneratorError::EmptySpectrum(_))
        ));
        let unsorted: TheoreticalSpectrum = [
            FragmentIon::new(300.0, IonSeries::B, 2, 1),
            FragmentIon::new(200.0, IonSeries::Y, 1, 1),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            unsorted.validate(&peptide),
            Err(GeneratorError::UnsortedSpectrum {
                sequence: "PEPTIDE".to_string(),
                index: 1
            })
        );
    }
}
