/*! A minimal modified peptide sequence model.

Sequences are written in the bracketed notation `QS(Phospho)SVTQVTEQSPK`, where a
named modification follows the residue it is attached to. A leading `(Name)` or
`.(Name)` marks an N-terminal modification, and a mass delta may be written as
`S[+79.966331]`.
*/
use std::fmt::{self, Display};
use std::str::FromStr;

use thiserror::Error;

/// The monoisotopic mass of HPO3, the neutral mass added by a phosphorylation
pub const PHOSPHO_MASS_DELTA: f64 = 79.966331;

/// A mass delta this close to [`PHOSPHO_MASS_DELTA`] is read as [`Modification::Phospho`]
const PHOSPHO_DELTA_MATCH: f64 = 0.005;

/// Residues which can accept a phosphorylation: serine, threonine and tyrosine
pub const PHOSPHO_ACCEPTORS: [char; 3] = ['S', 'T', 'Y'];

/// One-letter codes and elemental formulas of the residues this crate understands,
/// as the residue (amino acid less water) composition.
pub(crate) const RESIDUE_FORMULAS: [(char, &[(&str, i32)]); 22] = [
    ('G', &[("C", 2), ("H", 3), ("N", 1), ("O", 1)]),
    ('A', &[("C", 3), ("H", 5), ("N", 1), ("O", 1)]),
    ('S', &[("C", 3), ("H", 5), ("N", 1), ("O", 2)]),
    ('P', &[("C", 5), ("H", 7), ("N", 1), ("O", 1)]),
    ('V', &[("C", 5), ("H", 9), ("N", 1), ("O", 1)]),
    ('T', &[("C", 4), ("H", 7), ("N", 1), ("O", 2)]),
    ('C', &[("C", 3), ("H", 5), ("N", 1), ("O", 1), ("S", 1)]),
    ('L', &[("C", 6), ("H", 11), ("N", 1), ("O", 1)]),
    ('I', &[("C", 6), ("H", 11), ("N", 1), ("O", 1)]),
    ('N', &[("C", 4), ("H", 6), ("N", 2), ("O", 2)]),
    ('D', &[("C", 4), ("H", 5), ("N", 1), ("O", 3)]),
    ('Q', &[("C", 5), ("H", 8), ("N", 2), ("O", 2)]),
    ('K', &[("C", 6), ("H", 12), ("N", 2), ("O", 1)]),
    ('E', &[("C", 5), ("H", 7), ("N", 1), ("O", 3)]),
    ('M', &[("C", 5), ("H", 9), ("N", 1), ("O", 1), ("S", 1)]),
    ('H', &[("C", 6), ("H", 7), ("N", 3), ("O", 1)]),
    ('F', &[("C", 9), ("H", 9), ("N", 1), ("O", 1)]),
    ('R', &[("C", 6), ("H", 12), ("N", 4), ("O", 1)]),
    ('Y', &[("C", 9), ("H", 9), ("N", 1), ("O", 2)]),
    ('W', &[("C", 11), ("H", 10), ("N", 2), ("O", 1)]),
    ('U', &[("C", 3), ("H", 5), ("N", 1), ("O", 1), ("Se", 1)]),
    ('O', &[("C", 12), ("H", 19), ("N", 3), ("O", 2)]),
];

/// Test whether `code` is a residue with a known composition
pub fn is_known_residue(code: char) -> bool {
    RESIDUE_FORMULAS.iter().any(|(c, _)| *c == code)
}

/// A chemical modification attached to a residue or terminus
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Modification {
    Phospho,
    Oxidation,
    Carbamidomethyl,
    Acetyl,
    Deamidated,
    Methyl,
    Dimethyl,
    /// An unnamed modification given only by its monoisotopic mass shift
    MassDelta(f64),
}

impl Modification {
    const NAMED: [Modification; 7] = [
        Self::Phospho,
        Self::Oxidation,
        Self::Carbamidomethyl,
        Self::Acetyl,
        Self::Deamidated,
        Self::Methyl,
        Self::Dimethyl,
    ];

    /// Look up a named modification, ignoring ASCII case
    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMED
            .into_iter()
            .find(|m| m.name().is_some_and(|n| n.eq_ignore_ascii_case(name)))
    }

    /// Build a modification from a mass shift, recognizing phosphorylation
    pub fn from_mass_delta(delta: f64) -> Self {
        if (delta - PHOSPHO_MASS_DELTA).abs() <= PHOSPHO_DELTA_MATCH {
            Self::Phospho
        } else {
            Self::MassDelta(delta)
        }
    }

    pub fn name(&self) -> Option<&'static str> {
        match self {
            Self::Phospho => Some("Phospho"),
            Self::Oxidation => Some("Oxidation"),
            Self::Carbamidomethyl => Some("Carbamidomethyl"),
            Self::Acetyl => Some("Acetyl"),
            Self::Deamidated => Some("Deamidated"),
            Self::Methyl => Some("Methyl"),
            Self::Dimethyl => Some("Dimethyl"),
            Self::MassDelta(_) => None,
        }
    }

    /// The elemental formula this modification adds, or `None` for a bare mass delta
    pub fn formula(&self) -> Option<&'static [(&'static str, i32)]> {
        match self {
            Self::Phospho => Some(&[("H", 1), ("P", 1), ("O", 3)]),
            Self::Oxidation => Some(&[("O", 1)]),
            Self::Carbamidomethyl => Some(&[("C", 2), ("H", 3), ("N", 1), ("O", 1)]),
            Self::Acetyl => Some(&[("C", 2), ("H", 2), ("O", 1)]),
            Self::Deamidated => Some(&[("H", -1), ("N", -1), ("O", 1)]),
            Self::Methyl => Some(&[("C", 1), ("H", 2)]),
            Self::Dimethyl => Some(&[("C", 2), ("H", 4)]),
            Self::MassDelta(_) => None,
        }
    }

    pub fn is_phospho(&self) -> bool {
        matches!(self, Self::Phospho)
    }
}

impl Display for Modification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "({name})"),
            None => match self {
                Self::MassDelta(delta) => write!(f, "[{delta:+}]"),
                _ => Ok(()),
            },
        }
    }
}

/// A single amino acid with at most one modification
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Residue {
    /// The one-letter residue code
    pub code: char,
    pub modification: Option<Modification>,
}

impl Residue {
    pub fn new(code: char, modification: Option<Modification>) -> Self {
        Self { code, modification }
    }

    pub fn is_phosphorylated(&self) -> bool {
        self.modification.is_some_and(|m| m.is_phospho())
    }

    /// Whether this residue could carry a phosphate, i.e. it is an acceptor residue
    /// carrying nothing but possibly a phosphate already.
    pub fn is_phospho_acceptor(&self) -> bool {
        PHOSPHO_ACCEPTORS.contains(&self.code)
            && self.modification.map_or(true, |m| m.is_phospho())
    }
}

impl Display for Residue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)?;
        if let Some(m) = self.modification {
            write!(f, "{m}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PeptideParseError {
    #[error("The sequence is empty")]
    Empty,
    #[error("Unknown residue '{0}' at position {1}")]
    UnknownResidue(char, usize),
    #[error("Unexpected character '{0}' at position {1}")]
    UnexpectedCharacter(char, usize),
    #[error("Unknown modification \"{0}\"")]
    UnknownModification(String),
    #[error("Malformed mass delta \"{0}\"")]
    MalformedMassDelta(String),
    #[error("Unterminated modification starting at position {0}")]
    UnterminatedModification(usize),
    #[error("More than one modification on the same residue at position {0}")]
    MultipleModifications(usize),
}

/// An amino acid sequence with its modifications
///
/// With the `serde` feature, a peptide serializes as its bracketed notation string.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Peptide {
    pub n_term: Option<Modification>,
    pub residues: Vec<Residue>,
}

impl Peptide {
    pub fn new(n_term: Option<Modification>, residues: Vec<Residue>) -> Self {
        Self { n_term, residues }
    }

    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Residue> {
        self.residues.iter()
    }

    /// The bare one-letter sequence without any modifications
    pub fn unmodified(&self) -> String {
        self.residues.iter().map(|r| r.code).collect()
    }

    /// A copy of this peptide with every phosphorylation removed and all other
    /// modifications kept in place.
    pub fn without_phosphorylation(&self) -> Self {
        let mut dup = self.clone();
        for residue in dup.residues.iter_mut() {
            if residue.is_phosphorylated() {
                residue.modification = None;
            }
        }
        dup
    }

    pub fn phospho_count(&self) -> usize {
        self.residues.iter().filter(|r| r.is_phosphorylated()).count()
    }

    /// The positions of the phosphorylated residues in sequence order
    pub fn phosphosites(&self) -> Vec<usize> {
        self.residues
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_phosphorylated())
            .map(|(i, _)| i)
            .collect()
    }

    /// A copy of this peptide where exactly the residues at `sites` are phosphorylated.
    ///
    /// Existing phosphorylations are removed first. Positions out of range are ignored.
    pub fn with_phosphosites(&self, sites: &[usize]) -> Self {
        let mut dup = self.without_phosphorylation();
        for i in sites.iter().copied() {
            if let Some(residue) = dup.residues.get_mut(i) {
                residue.modification = Some(Modification::Phospho);
            }
        }
        dup
    }

    fn attach(&mut self, modification: Modification, position: usize) -> Result<(), PeptideParseError> {
        let slot = match self.residues.last_mut() {
            Some(residue) => &mut residue.modification,
            None => &mut self.n_term,
        };
        if slot.is_some() {
            return Err(PeptideParseError::MultipleModifications(position));
        }
        *slot = Some(modification);
        Ok(())
    }
}

fn read_enclosed(
    source: &str,
    start: usize,
    close: char,
) -> Result<(&str, usize), PeptideParseError> {
    let body_start = start + 1;
    match source[body_start..].find(close) {
        Some(offset) => Ok((
            &source[body_start..body_start + offset],
            body_start + offset + close.len_utf8(),
        )),
        None => Err(PeptideParseError::UnterminatedModification(start)),
    }
}

impl FromStr for Peptide {
    type Err = PeptideParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut peptide = Peptide::default();
        let mut position = if s.starts_with('.') { 1 } else { 0 };
        while let Some(c) = s[position..].chars().next() {
            match c {
                '(' => {
                    let (name, next) = read_enclosed(s, position, ')')?;
                    let modification = Modification::from_name(name)
                        .ok_or_else(|| PeptideParseError::UnknownModification(name.to_string()))?;
                    peptide.attach(modification, position)?;
                    position = next;
                }
                '[' => {
                    let (text, next) = read_enclosed(s, position, ']')?;
                    let delta: f64 = text
                        .parse()
                        .map_err(|_| PeptideParseError::MalformedMassDelta(text.to_string()))?;
                    if !delta.is_finite() {
                        return Err(PeptideParseError::MalformedMassDelta(text.to_string()));
                    }
                    peptide.attach(Modification::from_mass_delta(delta), position)?;
                    position = next;
                }
                c if c.is_ascii_uppercase() => {
                    if !is_known_residue(c) {
                        return Err(PeptideParseError::UnknownResidue(c, position));
                    }
                    peptide.residues.push(Residue::new(c, None));
                    position += 1;
                }
                c => return Err(PeptideParseError::UnexpectedCharacter(c, position)),
            }
        }
        if peptide.residues.is_empty() {
            return Err(PeptideParseError::Empty);
        }
        Ok(peptide)
    }
}

impl Display for Peptide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(m) = self.n_term {
            write!(f, ".{m}")?;
        }
        for residue in self.residues.iter() {
            write!(f, "{residue}")?;
        }
        Ok(())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Peptide {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Peptide {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

impl<'a> IntoIterator for &'a Peptide {
    type Item = &'a Residue;
    type IntoIter = std::slice::Iter<'a, Residue>;

    fn into_iter(self) -> Self::IntoIter {
        self.residues.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let peptide: Peptide = "QS(Phospho)SVTQVTEQSPK".parse().unwrap();
        assert_eq!(peptide.len(), 13);
        assert_eq!(peptide.residues[1].modification, Some(Modification::Phospho));
        assert_eq!(peptide.to_string(), "QS(Phospho)SVTQVTEQSPK");

        let peptide: Peptide = ".(Acetyl)PEPM(Oxidation)TIDE".parse().unwrap();
        assert_eq!(peptide.n_term, Some(Modification::Acetyl));
        assert_eq!(peptide.unmodified(), "PEPMTIDE");
        assert_eq!(peptide.to_string(), ".(Acetyl)PEPM(Oxidation)TIDE");

        let peptide: Peptide = "(Acetyl)PEPTIDE".parse().unwrap();
        assert_eq!(peptide.n_term, Some(Modification::Acetyl));
    }

    #[test]
    fn test_mass_delta() {
        let peptide: Peptide = "PEPT[+79.9663]IDE".parse().unwrap();
        assert_eq!(peptide.phosphosites(), vec![3]);
        let peptide: Peptide = "PEPTIDEK[+8.0142]".parse().unwrap();
        assert_eq!(
            peptide.residues[7].modification,
            Some(Modification::MassDelta(8.0142))
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<Peptide>(), Err(PeptideParseError::Empty));
        assert_eq!(
            "PEPXIDE".parse::<Peptide>(),
            Err(PeptideParseError::UnknownResidue('X', 3))
        );
        assert_eq!(
            "PEPS(Phospho".parse::<Peptide>(),
            Err(PeptideParseError::UnterminatedModification(4))
        );
        assert_eq!(
            "PEPS(Sulfo)".parse::<Peptide>(),
            Err(PeptideParseError::UnknownModification("Sulfo".to_string()))
        );
        assert_eq!(
            "PEPS(Phospho)(Oxidation)".parse::<Peptide>(),
            Err(PeptideParseError::MultipleModifications(13))
        );
        assert!(matches!(
            "pep".parse::<Peptide>(),
            Err(PeptideParseError::UnexpectedCharacter('p', 0))
        ));
    }

    #[test]
    fn test_remove_phosphosites() {
        let peptide: Peptide = "QSSVTQVTEQS(Phospho)PK".parse().unwrap();
        assert_eq!(peptide.phospho_count(), 1);
        let stripped = peptide.without_phosphorylation();
        assert_eq!(stripped.to_string(), "QSSVTQVTEQSPK");
        assert_eq!(stripped.phospho_count(), 0);

        let peptide: Peptide = "S(Phospho)M(Oxidation)T(Phospho)K".parse().unwrap();
        assert_eq!(
            peptide.without_phosphorylation().to_string(),
            "SM(Oxidation)TK"
        );
    }

    #[test]
    fn test_with_phosphosites() {
        let peptide: Peptide = "QS(Phospho)SVTQVTEQSPK".parse().unwrap();
        let moved = peptide.with_phosphosites(&[4, 10]);
        assert_eq!(moved.to_string(), "QSSVT(Phospho)QVTEQS(Phospho)PK");
        assert_eq!(moved.phosphosites(), vec![4, 10]);
        // the source is untouched
        assert_eq!(peptide.phosphosites(), vec![1]);
    }

    #[test]
    fn test_acceptors() {
        let peptide: Peptide = "S(Phospho)C(Carbamidomethyl)TS(Acetyl)Y".parse().unwrap();
        let acceptors: Vec<bool> = peptide.iter().map(|r| r.is_phospho_acceptor()).collect();
        assert_eq!(acceptors, vec![true, false, true, false, true]);
    }
}
