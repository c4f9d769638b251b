use std::io::{self, Write};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use itertools::Itertools;
use serde::Serialize;
use tracing::{debug, error, info, instrument};

use mzascore::hit::{ASCORE_PEPTIDE_SCORE, SEARCH_ENGINE_SCORE};

use crate::args::OutputFormat;
use crate::types::{ResultCollator, ScoredPSM, BUFFER_SIZE};

/// Restore input order to the scored PSMs arriving on `receiver` and forward them to `sender`
#[instrument(level = "debug", skip(receiver, sender))]
pub(crate) fn collate_results(
    receiver: Receiver<(usize, ScoredPSM)>,
    sender: Sender<(usize, ScoredPSM)>,
) {
    let mut collator = ResultCollator::default();
    let mut has_work = true;
    while has_work {
        match receiver.recv() {
            Ok((psm_idx, psm)) => {
                collator.receive(psm_idx, psm);
            }
            Err(_) => {
                debug!("Work queue finished");
                collator.done = true;
            }
        }

        let n = collator.waiting.len();
        if collator.done {
            if n > 0 {
                debug!("Draining output queue, {n} items");
            }
            let waiting_items = std::mem::take(&mut collator.waiting)
                .into_iter()
                .sorted_by_key(|(i, _)| *i);
            for (psm_idx, psm) in waiting_items {
                if let Err(e) = sender.send((psm_idx, psm)) {
                    error!("Failed to send {psm_idx} for writing: {e}");
                    break;
                }
            }
            has_work = false;
        } else {
            while let Some((psm_idx, psm)) = collator.try_next() {
                if collator.waiting.len() >= BUFFER_SIZE {
                    if let Err(e) = sender.send((psm_idx, psm)) {
                        error!("Failed to send {psm_idx} for writing: {e}");
                        has_work = false;
                        break;
                    }
                } else {
                    match sender.try_send((psm_idx, psm)) {
                        Ok(()) => {}
                        Err(TrySendError::Full((psm_idx, psm))) => {
                            collator.receive(psm_idx, psm);
                            collator.set_next_key(psm_idx);
                            break;
                        }
                        Err(TrySendError::Disconnected(_)) => {
                            error!("Failed to send {psm_idx} for writing, the writer hung up");
                            has_work = false;
                            break;
                        }
                    }
                }
            }
        }
    }
    debug!("PSM collator done");
}

/// A flattened PSM result for tabular output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct OutputRow {
    pub spectrum: String,
    pub input_sequence: String,
    pub sequence: Option<String>,
    pub charge: Option<i32>,
    pub score: Option<f64>,
    pub status: String,
    /// The per-site AScores in residue order, comma-separated
    pub ascores: String,
    pub search_engine_score: Option<f64>,
    pub ascore_pep_score: Option<f64>,
}

impl From<&ScoredPSM> for OutputRow {
    fn from(psm: &ScoredPSM) -> Self {
        let hit = psm.hit.as_ref();
        Self {
            spectrum: psm.spectrum.clone(),
            input_sequence: psm.input_sequence.clone(),
            sequence: hit.map(|h| h.sequence.to_string()),
            charge: hit.map(|h| h.charge),
            score: hit.map(|h| h.score),
            status: psm.status.to_string(),
            ascores: hit
                .map(|h| h.ascores().iter().map(|s| format!("{s:0.4}")).join(","))
                .unwrap_or_default(),
            search_engine_score: hit
                .and_then(|h| h.get_meta(SEARCH_ENGINE_SCORE))
                .and_then(|v| v.as_f64()),
            ascore_pep_score: hit
                .and_then(|h| h.get_meta(ASCORE_PEPTIDE_SCORE))
                .and_then(|v| v.as_f64()),
        }
    }
}

enum ResultWriter<W: Write> {
    Tsv(csv::Writer<W>),
    Json(W),
}

impl<W: Write> ResultWriter<W> {
    fn new(handle: W, format: OutputFormat) -> Self {
        match format {
            OutputFormat::Tsv => Self::Tsv(
                csv::WriterBuilder::new()
                    .delimiter(b'\t')
                    .has_headers(true)
                    .from_writer(handle),
            ),
            OutputFormat::Json => Self::Json(handle),
        }
    }

    fn write(&mut self, psm: &ScoredPSM) -> io::Result<()> {
        match self {
            Self::Tsv(writer) => writer.serialize(OutputRow::from(psm))?,
            Self::Json(handle) => {
                serde_json::to_writer(&mut *handle, psm)?;
                handle.write_all(b"\n")?;
            }
        }
        Ok(())
    }

    fn close(self) -> io::Result<()> {
        match self {
            Self::Tsv(mut writer) => writer.flush(),
            Self::Json(mut handle) => handle.flush(),
        }
    }
}

#[instrument(level = "debug", skip(handle, receiver))]
pub fn write_output<W: Write>(
    handle: W,
    format: OutputFormat,
    receiver: Receiver<(usize, ScoredPSM)>,
) -> io::Result<()> {
    let started = Instant::now();
    let mut writer = ResultWriter::new(handle, format);
    let mut checkpoint = 0usize;
    let mut psm_counter = 0usize;
    while let Ok((psm_idx, psm)) = receiver.recv() {
        psm_counter += 1;
        if psm_idx - checkpoint >= 1000 {
            let queue_size = receiver.len();
            info!(
                "Completed PSM {} | {queue_size} items in the write queue",
                psm_idx + 1
            );
            checkpoint = psm_idx;
        }
        writer.write(&psm)?;
    }
    writer.close()?;
    info!(
        "Finished writing {psm_counter} PSMs in {:0.3?}",
        Instant::now() - started
    );
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::PSMStatus;
    use mzascore::PeptideHit;

    fn scored(index: usize, sequence: &str, status: PSMStatus) -> ScoredPSM {
        let mut hit = PeptideHit::new(sequence.parse().unwrap(), 2, 40.0);
        hit.set_meta(SEARCH_ENGINE_SCORE, 12.5);
        hit.set_meta(mzascore::hit::ascore_key(1), 40.0);
        ScoredPSM::new(
            index,
            format!("scan={index}"),
            sequence.to_string(),
            status,
            Some(hit),
        )
    }

    #[test_log::test]
    fn test_collate_restores_order() {
        let (work_send, work_recv) = crossbeam_channel::bounded(16);
        let (write_send, write_recv) = crossbeam_channel::bounded(16);
        for i in [2usize, 0, 3, 1] {
            work_send
                .send((i, scored(i, "AS(Phospho)TPK", PSMStatus::Scored)))
                .unwrap();
        }
        drop(work_send);
        collate_results(work_recv, write_send);
        let order: Vec<usize> = write_recv.iter().map(|(i, _)| i).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_output_row() {
        let psm = scored(0, "AS(Phospho)TPK", PSMStatus::Scored);
        let row = OutputRow::from(&psm);
        assert_eq!(row.sequence.as_deref(), Some("AS(Phospho)TPK"));
        assert_eq!(row.status, "scored");
        assert_eq!(row.ascores, "40.0000");
        assert_eq!(row.search_engine_score, Some(12.5));
        assert_eq!(row.ascore_pep_score, None);

        let failed = ScoredPSM::new(
            1,
            "scan=1".into(),
            "AS(Bogus)K".into(),
            PSMStatus::Failed("bad".into()),
            None,
        );
        let row = OutputRow::from(&failed);
        assert_eq!(row.status, "failed: bad");
        assert!(row.sequence.is_none());
        assert!(row.ascores.is_empty());
    }

    #[test_log::test]
    fn test_write_tsv() {
        let (send, recv) = crossbeam_channel::unbounded();
        send.send((0, scored(0, "AS(Phospho)TPK", PSMStatus::Scored)))
            .unwrap();
        drop(send);
        let mut buffer = Vec::new();
        write_output(&mut buffer, OutputFormat::Tsv, recv).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "spectrum\tinput_sequence\tsequence\tcharge\tscore\tstatus\tascores\tsearch_engine_score\tascore_pep_score"
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("scan=0\tAS(Phospho)TPK\tAS(Phospho)TPK\t2\t40"));
        assert!(row.contains("\tscored\t"));
    }

    #[test_log::test]
    fn test_write_json() {
        let (send, recv) = crossbeam_channel::unbounded();
        send.send((0, scored(0, "AS(Phospho)TPK", PSMStatus::Skipped)))
            .unwrap();
        drop(send);
        let mut buffer = Vec::new();
        write_output(&mut buffer, OutputFormat::Json, recv).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let value: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(value["status"], "skipped");
        assert_eq!(value["hit"]["sequence"], "AS(Phospho)TPK");
    }
}
