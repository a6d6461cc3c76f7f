//! Post-processing and metrics (C10): classifies each correction result, routes the read
//! to the corrected or discard sink, and accumulates per-position, per-base,
//! per-quality-character and per-preceding-2-mer error counters over a batch of reads.
//!
//! A [`PostProcessor`] owns one [`Metrics`] accumulator and the two sinks a worker writes
//! its reads to. Workers each keep their own `PostProcessor`; the caller merges their
//! [`Metrics`] with [`Metrics::merge`] once every worker has finished - this module does
//! no synchronization of its own (§5: the core stays single-threaded per read, and its
//! sinks and counters are not safe to share across threads).

use std::collections::BTreeMap;
use std::io::Write;

use crate::error::Result;
use crate::types::{CorrectionResult, Read};

fn base_index(b: u8) -> usize {
    match b {
        b'A' => 0,
        b'C' => 1,
        b'G' => 2,
        b'T' => 3,
        _ => 4,
    }
}

const BASE_LABELS: [u8; 5] = [b'A', b'C', b'G', b'T', b'N'];

/// Accumulated error-correction statistics over a batch of reads.
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    reads_total: u64,
    /// Reads that passed k-mer correction (§4.10 classification).
    kmer_pass: u64,
    /// Reads that failed k-mer QC but passed overlap correction.
    overlap_pass: u64,
    /// Reads that passed neither.
    qc_fail: u64,

    /// Total bases observed at read position `i`, for `i` in `0..position_total.len()`.
    position_total: Vec<u64>,
    /// Bases at position `i` that the corrector changed.
    position_errors: Vec<u64>,

    base_total: [u64; 5],
    base_errors: [u64; 5],

    quality_total: BTreeMap<u8, u64>,
    quality_errors: BTreeMap<u8, u64>,

    /// Keyed by the 2-mer immediately preceding the scored position (only tracked once
    /// that position is past index 2, per §4.10).
    dimer_total: BTreeMap<(u8, u8), u64>,
    dimer_errors: BTreeMap<(u8, u8), u64>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reads_total(&self) -> u64 {
        self.reads_total
    }

    pub fn kmer_pass(&self) -> u64 {
        self.kmer_pass
    }

    pub fn overlap_pass(&self) -> u64 {
        self.overlap_pass
    }

    pub fn qc_fail(&self) -> u64 {
        self.qc_fail
    }

    /// Reads that passed either the k-mer or the overlap path.
    pub fn reads_passed(&self) -> u64 {
        self.kmer_pass + self.overlap_pass
    }

    pub fn position_total(&self) -> &[u64] {
        &self.position_total
    }

    pub fn position_errors(&self) -> &[u64] {
        &self.position_errors
    }

    pub fn base_total(&self, base: u8) -> u64 {
        self.base_total[base_index(base)]
    }

    pub fn base_errors(&self, base: u8) -> u64 {
        self.base_errors[base_index(base)]
    }

    /// `(base, total, errors)` triples for every base the tally tracks, in a fixed,
    /// display-friendly order.
    pub fn base_counts(&self) -> Vec<(u8, u64, u64)> {
        BASE_LABELS
            .iter()
            .map(|&b| (b, self.base_total(b), self.base_errors(b)))
            .collect()
    }

    pub fn quality_total(&self, phred: u8) -> u64 {
        *self.quality_total.get(&phred).unwrap_or(&0)
    }

    pub fn quality_errors(&self, phred: u8) -> u64 {
        *self.quality_errors.get(&phred).unwrap_or(&0)
    }

    pub fn dimer_total(&self, a: u8, b: u8) -> u64 {
        *self.dimer_total.get(&(a, b)).unwrap_or(&0)
    }

    pub fn dimer_errors(&self, a: u8, b: u8) -> u64 {
        *self.dimer_errors.get(&(a, b)).unwrap_or(&0)
    }

    fn ensure_len(&mut self, len: usize) {
        if self.position_total.len() < len {
            self.position_total.resize(len, 0);
            self.position_errors.resize(len, 0);
        }
    }

    /// Fold one read's original-vs-corrected comparison into the running counters.
    pub fn record(&mut self, original: &Read, result: &CorrectionResult) {
        self.reads_total += 1;
        if result.kmer_qc {
            self.kmer_pass += 1;
        } else if result.overlap_qc {
            self.overlap_pass += 1;
        } else {
            self.qc_fail += 1;
        }

        let len = original.seq.len();
        self.ensure_len(len);

        for i in 0..len {
            let orig_base = original.seq[i];
            let corrected_base = result.corrected_seq.get(i).copied().unwrap_or(orig_base);
            let is_error = orig_base != corrected_base;

            self.position_total[i] += 1;
            self.base_total[base_index(orig_base)] += 1;

            let q = original.phred_at(i);
            *self.quality_total.entry(q).or_insert(0) += 1;

            if is_error {
                self.position_errors[i] += 1;
                self.base_errors[base_index(orig_base)] += 1;
                *self.quality_errors.entry(q).or_insert(0) += 1;
            }

            if i > 2 {
                let dimer = (original.seq[i - 2], original.seq[i - 1]);
                *self.dimer_total.entry(dimer).or_insert(0) += 1;
                if is_error {
                    *self.dimer_errors.entry(dimer).or_insert(0) += 1;
                }
            }
        }
    }

    /// Fold `other`'s counters into `self`, growing the position vectors to cover
    /// whichever read was longest.
    pub fn merge(&mut self, other: &Metrics) {
        self.reads_total += other.reads_total;
        self.kmer_pass += other.kmer_pass;
        self.overlap_pass += other.overlap_pass;
        self.qc_fail += other.qc_fail;

        self.ensure_len(other.position_total.len());
        for (i, &v) in other.position_total.iter().enumerate() {
            self.position_total[i] += v;
        }
        for (i, &v) in other.position_errors.iter().enumerate() {
            self.position_errors[i] += v;
        }

        for i in 0..5 {
            self.base_total[i] += other.base_total[i];
            self.base_errors[i] += other.base_errors[i];
        }

        for (&q, &v) in &other.quality_total {
            *self.quality_total.entry(q).or_insert(0) += v;
        }
        for (&q, &v) in &other.quality_errors {
            *self.quality_errors.entry(q).or_insert(0) += v;
        }

        for (&d, &v) in &other.dimer_total {
            *self.dimer_total.entry(d).or_insert(0) += v;
        }
        for (&d, &v) in &other.dimer_errors {
            *self.dimer_errors.entry(d).or_insert(0) += v;
        }
    }
}

/// An opaque, thread-safe output stream. The host picks what's behind it - a file, stdout,
/// an in-memory buffer - the post-processor only ever writes bytes through it (§1).
pub type Sink = Box<dyn Write + Send>;

/// Writes one corrected (or discarded) read in a minimal FASTA record. The exact output
/// file format is the host's concern (§1); this is just how the post-processor renders a
/// read onto an opaque byte-stream sink.
fn write_fasta(sink: &mut dyn Write, id: &str, seq: &[u8]) -> Result<()> {
    writeln!(sink, ">{}", id)?;
    sink.write_all(seq)?;
    sink.write_all(b"\n")?;
    Ok(())
}

/// Accumulates [`Metrics`] for a stream of corrected reads and routes each read to the
/// corrected or discard sink (§4.10): passes go to `corrected`; failures go to `discard`
/// if the host supplied one, else to `corrected` alongside the passes (their
/// classification is still recorded correctly in [`Metrics`]).
pub struct PostProcessor {
    metrics: Metrics,
    corrected: Sink,
    discard: Option<Sink>,
}

impl PostProcessor {
    pub fn new(corrected: Sink, discard: Option<Sink>) -> Self {
        Self {
            metrics: Metrics::new(),
            corrected,
            discard,
        }
    }

    /// Classify `result`, fold it into the running metrics, and write the read to the
    /// appropriate sink.
    pub fn process(&mut self, original: &Read, result: &CorrectionResult) -> Result<()> {
        self.metrics.record(original, result);

        if result.passed() {
            write_fasta(&mut self.corrected, &original.id, &result.corrected_seq)?;
        } else if let Some(discard) = self.discard.as_mut() {
            write_fasta(discard.as_mut(), &original.id, &result.corrected_seq)?;
        } else {
            write_fasta(&mut self.corrected, &original.id, &result.corrected_seq)?;
        }

        Ok(())
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Flushes both sinks and returns the accumulated metrics, consuming `self`.
    pub fn finalize(mut self) -> Result<Metrics> {
        self.corrected.flush()?;
        if let Some(discard) = self.discard.as_mut() {
            discard.flush()?;
        }
        Ok(self.metrics)
    }
}
