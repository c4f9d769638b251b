use std::collections::{HashMap, HashSet};
use std::io;
use std::path::Path;
use std::time::Instant;

use crossbeam_channel::Sender;
use mzdata::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info, instrument, trace, warn};

use mzascore::{AScoreEngine, PeptideHit, TheoreticalSpectrumGenerator};

use crate::progress::ProgressRecord;
use crate::psm::PSMRecord;
use crate::types::{CPeak, PSMStatus, ScoredPSM};

/// The centroided peak lists of the spectra referenced by the PSM table
#[derive(Debug, Default, Clone)]
pub struct SpectrumStore {
    peaks: Vec<Vec<CPeak>>,
    by_id: HashMap<String, usize>,
    by_index: HashMap<usize, usize>,
}

impl SpectrumStore {
    pub fn insert(&mut self, id: String, index: usize, peaks: Vec<CPeak>) {
        let slot = self.peaks.len();
        self.peaks.push(peaks);
        self.by_id.insert(id, slot);
        self.by_index.insert(index, slot);
    }

    /// Look up a spectrum by native ID, falling back to its index in the file
    pub fn get(&self, key: &str) -> Option<&[CPeak]> {
        self.by_id
            .get(key)
            .or_else(|| {
                key.parse::<usize>()
                    .ok()
                    .and_then(|index| self.by_index.get(&index))
            })
            .map(|slot| self.peaks[*slot].as_slice())
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }
}

/// Read the centroids of every spectrum in `path` whose native ID or index is in `wanted`
pub fn load_spectra<P: AsRef<Path>>(
    path: P,
    wanted: &HashSet<String>,
) -> io::Result<SpectrumStore> {
    let started = Instant::now();
    let reader = mzdata::MZReader::open_path(path.as_ref())?;
    let mut store = SpectrumStore::default();
    for mut spectrum in reader {
        let id = spectrum.id().to_string();
        let index = spectrum.index();
        if !(wanted.contains(&id) || wanted.contains(&index.to_string())) {
            continue;
        }
        match spectrum.try_build_centroids() {
            Ok(peaks) => {
                let peaks: Vec<CPeak> = peaks.iter().cloned().collect();
                trace!("Loaded {} peaks from {id}", peaks.len());
                store.insert(id, index, peaks);
            }
            Err(e) => {
                warn!("Failed to read centroids from {id}: {e}");
            }
        }
    }
    info!(
        "Loaded {} of {} requested spectra in {:0.3?}",
        store.len(),
        wanted.len(),
        Instant::now() - started
    );
    Ok(store)
}

/// Localize the phosphorylations of a single PSM
pub(crate) fn localize_psm<G: TheoreticalSpectrumGenerator>(
    engine: &AScoreEngine<G>,
    store: &SpectrumStore,
    index: usize,
    record: &PSMRecord,
) -> (ScoredPSM, ProgressRecord) {
    let mut prog = ProgressRecord {
        psms: 1,
        ..Default::default()
    };
    let make = |status: PSMStatus, hit: Option<PeptideHit>| {
        ScoredPSM::new(
            index,
            record.spectrum.clone(),
            record.sequence.clone(),
            status,
            hit,
        )
    };

    let hit = match record.to_hit() {
        Ok(hit) => hit,
        Err(e) => {
            prog.failed += 1;
            debug!("Failed to parse {}: {e}", record.sequence);
            return (make(PSMStatus::Failed(e.to_string()), None), prog);
        }
    };

    let phospho_count = record.phospho_count_for(&hit);
    if phospho_count == 0 {
        prog.skipped += 1;
        return (make(PSMStatus::Skipped, Some(hit)), prog);
    }

    let peaks = match store.get(&record.spectrum) {
        Some(peaks) => peaks,
        None => {
            prog.failed += 1;
            prog.spectra_missing += 1;
            return (
                make(
                    PSMStatus::Failed(format!("spectrum {} not found", record.spectrum)),
                    Some(hit),
                ),
                prog,
            );
        }
    };

    match engine.compute(&hit, peaks, phospho_count) {
        Ok(localized) => {
            prog.scored += 1;
            (make(PSMStatus::Scored, Some(localized)), prog)
        }
        Err(e) => {
            prog.failed += 1;
            debug!("Failed to localize {} on {}: {e}", record.sequence, record.spectrum);
            (make(PSMStatus::Failed(e.to_string()), Some(hit)), prog)
        }
    }
}

/// Score every PSM in parallel on the current thread pool and send the results,
/// keyed by input row, to `sender`.
#[instrument(level = "debug", skip(engine, store, psms, sender), fields(psms = psms.len()))]
pub(crate) fn prepare_processing<G: TheoreticalSpectrumGenerator>(
    engine: &AScoreEngine<G>,
    store: &SpectrumStore,
    psms: &[PSMRecord],
    sender: Sender<(usize, ScoredPSM)>,
) -> ProgressRecord {
    let started = Instant::now();
    let prog = psms
        .par_iter()
        .enumerate()
        .map(|(index, record)| {
            let (scored, prog) = localize_psm(engine, store, index, record);
            if let Err(e) = sender.send((index, scored)) {
                warn!("Failed to send PSM {index}: {e}");
            }
            prog
        })
        .fold(ProgressRecord::default, ProgressRecord::sum)
        .sum();
    info!("Elapsed Time: {:0.3?}", Instant::now() - started);
    prog
}
