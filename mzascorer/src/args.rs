use std::fmt::Display;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use mzascore::ToleranceUnit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgToleranceUnit {
    #[default]
    /// An absolute mass difference in Daltons
    Da,
    /// A relative mass difference in parts-per-million
    PPM,
}

impl From<ArgToleranceUnit> for ToleranceUnit {
    fn from(value: ArgToleranceUnit) -> Self {
        match value {
            ArgToleranceUnit::Da => ToleranceUnit::Da,
            ArgToleranceUnit::PPM => ToleranceUnit::PPM,
        }
    }
}

impl Display for ArgToleranceUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    /// Tab-separated values, one row per PSM
    Tsv,
    /// One JSON object per line, one line per PSM
    Json,
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

pub(crate) fn positive_float(s: &str) -> Result<f64, String> {
    let value = s.parse::<f64>().map_err(|e| e.to_string())?;
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(format!("`{s}` is not a positive number"))
    }
}
