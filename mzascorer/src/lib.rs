mod args;
mod driver;
mod proc;
mod progress;
mod psm;
mod types;
mod write;

pub use args::*;
pub use driver::{MZAScorer, MZAScorerError, CONFIG_FILE_NAME, ENV_PREFIX};
pub use proc::{load_spectra, SpectrumStore};
pub use progress::ProgressRecord;
pub use psm::{read_psms, read_psms_from, PSMRecord};
pub use types::{PSMStatus, ScoredPSM};
pub use write::write_output;
