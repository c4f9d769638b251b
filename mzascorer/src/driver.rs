use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;

use clap::{parser::ValueSource, CommandFactory, FromArgMatches, Parser};
use crossbeam_channel::bounded;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tracing::{debug, info, warn, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mzascore::{
    AScoreEngine, AScoreParams, BYIonGenerator, DepthWeights, FragmentationParams, InvalidInput,
};

use crate::args::{positive_float, ArgToleranceUnit, OutputFormat};
use crate::proc::{load_spectra, prepare_processing};
use crate::psm::read_psms;
use crate::types::BUFFER_SIZE;
use crate::write::{collate_results, write_output};

/// The configuration file read from the working directory, if present
pub const CONFIG_FILE_NAME: &str = "mzascorer.toml";
/// The prefix of environment variables read as configuration
pub const ENV_PREFIX: &str = "MZASCORER_";

#[derive(Debug, Error)]
pub enum MZAScorerError {
    #[error("An IO error occurred: {0}")]
    IOError(
        #[source]
        #[from]
        io::Error,
    ),
    #[error("The PSM table could not be read: {0}")]
    PSMReadError(
        #[source]
        #[from]
        csv::Error,
    ),
    #[error("The localization parameters are invalid: {0}")]
    InvalidParameters(
        #[source]
        #[from]
        InvalidInput,
    ),
    #[error("The configuration could not be loaded: {0}")]
    ConfigurationError(
        #[source]
        #[from]
        figment::Error,
    ),
}

fn default_output_file() -> PathBuf {
    PathBuf::from("-")
}

fn default_threads() -> i32 {
    -1
}

fn default_fragment_tolerance() -> f64 {
    0.5
}

fn default_window_width() -> f64 {
    100.0
}

fn default_max_peptide_length() -> usize {
    40
}

fn default_max_permutations() -> usize {
    16384
}

fn default_max_fragment_charge() -> i32 {
    3
}

fn default_write_buffer_size() -> usize {
    BUFFER_SIZE
}

/// Phosphorylation site localization of peptide-spectrum matches.
///
/// Read a spectrum file and a tab-separated table of peptide-spectrum matches,
/// localize the phosphorylations of each match with AScore, and write out the
/// relocalized matches.
#[derive(Parser, Debug, Clone, Deserialize, Serialize)]
#[command(author, version)]
pub struct MZAScorer {
    /// The path to read the spectra from, in mzML or MGF format
    #[arg()]
    pub spectra_file: PathBuf,

    /// The path to read the tab-separated peptide-spectrum match table from.
    ///
    /// The table must have `spectrum`, `sequence` and `charge` columns, and may have
    /// `score` and `phospho_count` columns.
    #[arg()]
    pub psm_file: PathBuf,

    /// The path to write the output file to, or if '-' is passed, write to STDOUT
    #[arg(short = 'o', long = "output-file", default_value = "-")]
    #[serde(default = "default_output_file")]
    pub output_file: PathBuf,

    /// The format to write results in
    #[arg(short = 'f', long = "output-format", value_enum, default_value_t = OutputFormat::Tsv)]
    #[serde(default)]
    pub output_format: OutputFormat,

    /// The path to write a log file to, in addition to STDERR
    #[arg(short = 'l', long = "log-file")]
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// A TOML configuration file to read additional parameters from.
    ///
    /// Configurations are also read from `mzascorer.toml` in the working directory.
    /// Environment variables prefixed with `MZASCORER_` will be read too. Options
    /// given on the command line take precedence over all of these.
    #[arg(long = "config-file")]
    #[serde(default)]
    pub config_file: Option<PathBuf>,

    /// The number of threads to use, passing a value < 1 to use all available threads
    #[arg(short = 't', long = "threads", default_value_t = -1)]
    #[serde(default = "default_threads")]
    pub threads: i32,

    /// The fragment mass tolerance, in units of `--tolerance-unit`
    #[arg(short = 'm', long = "fragment-tolerance", default_value_t = 0.5, value_parser = positive_float)]
    #[serde(default = "default_fragment_tolerance")]
    pub fragment_tolerance: f64,

    /// The unit of the fragment mass tolerance
    #[arg(short = 'u', long = "tolerance-unit", value_enum, default_value_t = ArgToleranceUnit::Da)]
    #[serde(default)]
    pub tolerance_unit: ArgToleranceUnit,

    /// The width of the m/z windows the most intense peaks are picked from
    #[arg(long = "window-width", default_value_t = 100.0, value_parser = positive_float)]
    #[serde(default = "default_window_width")]
    pub window_width: f64,

    /// The weight of each peak depth in the peptide score, comma-separated.
    ///
    /// The number of weights sets the number of peak depths evaluated. When none
    /// are given, ten depths with the standard AScore weights are used.
    #[arg(long = "depth-weights", value_delimiter = ',', value_name = "W1,W2,...")]
    #[serde(default)]
    pub depth_weights: Vec<f64>,

    /// The longest peptide to localize
    #[arg(long = "max-peptide-length", default_value_t = 40)]
    #[serde(default = "default_max_peptide_length")]
    pub max_peptide_length: usize,

    /// The largest number of site permutations to enumerate for one peptide
    #[arg(long = "max-permutations", default_value_t = 16384)]
    #[serde(default = "default_max_permutations")]
    pub max_permutations: usize,

    /// The highest fragment ion charge state to generate
    #[arg(long = "max-fragment-charge", default_value_t = 3)]
    #[serde(default = "default_max_fragment_charge")]
    pub max_fragment_charge: i32,

    /// Whether to include the first prefix (b1) ion in theoretical spectra
    #[arg(long = "add-first-prefix-ion")]
    #[serde(default)]
    pub add_first_prefix_ion: bool,

    /// The size of the buffer for queueing writing of results to the output stream
    #[arg(short = 'w', long = "write-buffer-size", default_value_t = BUFFER_SIZE)]
    #[serde(default = "default_write_buffer_size")]
    pub write_buffer_size: usize,
}

impl MZAScorer {
    /// Parse the command line and layer the configuration sources under it.
    ///
    /// Built-in defaults are overridden by `mzascorer.toml`, then by `--config-file`,
    /// then by `MZASCORER_` environment variables, and finally by any option passed
    /// explicitly on the command line.
    pub fn from_command_line() -> Result<Self, MZAScorerError> {
        let matches = Self::command().get_matches();
        let args = Self::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());
        let explicit: HashSet<String> = matches
            .ids()
            .filter(|id| matches.value_source(id.as_str()) == Some(ValueSource::CommandLine))
            .map(|id| id.as_str().to_string())
            .collect();
        args.load_configuration(&explicit)
    }

    /// Merge the configuration files and environment over these arguments, keeping the
    /// values of the fields named in `explicit`.
    pub fn load_configuration(self, explicit: &HashSet<String>) -> Result<Self, MZAScorerError> {
        let mut config = Figment::from(Serialized::defaults(&self)).merge(Toml::file(CONFIG_FILE_NAME));
        if let Some(path) = self.config_file.as_ref() {
            config = config.merge(Toml::file_exact(path));
        }
        config = config.merge(Env::prefixed(ENV_PREFIX));

        if let serde_json::Value::Object(mut fields) =
            serde_json::to_value(&self).map_err(io::Error::other)?
        {
            fields.retain(|k, _| explicit.contains(k));
            config = config.merge(Serialized::defaults(fields));
        }
        Ok(config.extract()?)
    }

    /// Install the global log subscriber, writing to STDERR and to `log_file` when given.
    ///
    /// The returned guard must be held until the program exits so buffered file
    /// records are flushed.
    pub fn configure_logging(&self) -> io::Result<Option<WorkerGuard>> {
        let stderr_layer = fmt::layer()
            .compact()
            .with_timer(fmt::time::ChronoLocal::rfc_3339())
            .with_writer(io::stderr)
            .with_filter(
                EnvFilter::builder()
                    .with_default_directive(Level::INFO.into())
                    .from_env_lossy(),
            );

        let (file_layer, guard) = match self.log_file.as_ref() {
            Some(path) => {
                let handle = fs::File::create(path)?;
                let (writer, guard) = tracing_appender::non_blocking(handle);
                let layer = fmt::layer()
                    .compact()
                    .with_ansi(false)
                    .with_timer(fmt::time::ChronoLocal::rfc_3339())
                    .with_writer(writer)
                    .with_filter(
                        EnvFilter::builder()
                            .with_default_directive(Level::INFO.into())
                            .from_env_lossy(),
                    );
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };

        let subscriber = tracing_subscriber::registry()
            .with(stderr_layer)
            .with(file_layer);
        tracing_log::LogTracer::init().map_err(io::Error::other)?;
        tracing::subscriber::set_global_default(subscriber).map_err(io::Error::other)?;
        Ok(guard)
    }

    fn create_threadpool(&self) -> io::Result<rayon::ThreadPool> {
        let num_threads = if self.threads > 0 {
            self.threads as usize
        } else {
            thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        };
        debug!("Using {} cores", num_threads);
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(io::Error::other)
    }

    pub fn make_params(&self) -> Result<AScoreParams, InvalidInput> {
        let depth_weights = if self.depth_weights.is_empty() {
            DepthWeights::default()
        } else {
            DepthWeights::new(self.depth_weights.clone())?
        };
        let params = AScoreParams::default()
            .with_fragment_tolerance(self.fragment_tolerance, self.tolerance_unit.into())
            .with_window_width(self.window_width)
            .with_depth_weights(depth_weights)
            .with_max_peptide_length(self.max_peptide_length)
            .with_max_permutations(self.max_permutations);
        params.validate()?;
        Ok(params)
    }

    pub fn make_engine(&self) -> Result<AScoreEngine<BYIonGenerator>, InvalidInput> {
        let params = self.make_params()?;
        let generator = BYIonGenerator::new(FragmentationParams {
            add_first_prefix_ion: self.add_first_prefix_ion,
            max_fragment_charge: self.max_fragment_charge,
            ..Default::default()
        });
        Ok(AScoreEngine::new(params, generator))
    }

    fn open_output(&self) -> io::Result<Box<dyn Write + Send>> {
        if self.output_file == Path::new("-") {
            Ok(Box::new(io::BufWriter::new(io::stdout())))
        } else {
            Ok(Box::new(io::BufWriter::new(fs::File::create(
                &self.output_file,
            )?)))
        }
    }

    pub fn main(&self) -> Result<(), MZAScorerError> {
        info!(
            "mzascorer v{}",
            option_env!("CARGO_PKG_VERSION").unwrap_or("unknown")
        );
        info!("Spectra: {}", self.spectra_file.display());
        info!("PSMs: {}", self.psm_file.display());
        info!("Output: {}", self.output_file.display());
        match toml::to_string_pretty(self) {
            Ok(text) => debug!("Effective configuration:\n{text}"),
            Err(e) => warn!("Failed to render the effective configuration: {e}"),
        }
        self.create_threadpool()?.install(|| self.run_workflow())
    }

    fn run_workflow(&self) -> Result<(), MZAScorerError> {
        let engine = self.make_engine()?;
        let psms = read_psms(&self.psm_file)?;
        let wanted: HashSet<String> = psms.iter().map(|psm| psm.spectrum.clone()).collect();
        let store = load_spectra(&self.spectra_file, &wanted)?;
        let handle = self.open_output()?;

        let buffer_size = self.write_buffer_size.max(1);
        let (send_solved, recv_solved) = bounded(buffer_size);
        let (send_collated, recv_collated) = bounded(buffer_size);
        let output_format = self.output_format;

        let start = Instant::now();
        let collate_task = thread::spawn(move || collate_results(recv_solved, send_collated));
        let write_task =
            thread::spawn(move || write_output(handle, output_format, recv_collated));

        let prog = prepare_processing(&engine, &store, &psms, send_solved);
        info!("PSMs: {}", prog.psms);
        info!(
            "Scored: {} | Skipped: {} | Failed: {}",
            prog.scored, prog.skipped, prog.failed
        );
        if prog.spectra_missing > 0 {
            warn!("Spectra Missing: {}", prog.spectra_missing);
        }
        let processing_elapsed = Instant::now() - start;

        match collate_task.join() {
            Ok(_) => {}
            Err(e) => {
                warn!("Failed to join collator task: {e:?}")
            }
        }

        match write_task.join() {
            Ok(o) => o?,
            Err(e) => {
                warn!("Failed to join writer task: {e:?}");
            }
        }

        let elapsed = Instant::now() - start;
        if (elapsed.as_secs_f64() - processing_elapsed.as_secs_f64()) > 2.0 {
            info!("Total Elapsed Time: {:0.3?}", elapsed);
        }
        Ok(())
    }
}
