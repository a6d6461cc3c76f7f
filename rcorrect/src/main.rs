mod cli;
mod utils;

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use libcorrect::dispatch::Dispatcher;
use libcorrect::metrics::{Metrics, PostProcessor};
use libcorrect::refindex::{DefaultQualityTable, ReferenceIndex, ReferenceOverlapService};
use libcorrect::types::{CorrectionParams, Read};
use log::{debug, info, trace, LevelFilter};
use needletail::parse_fastx_file;
use rayon::prelude::*;

fn setup_logging(quiet: u8, verbose: u8) {
    let sum = (verbose as i16) - (quiet as i16);
    let lvl = match sum {
        1 => LevelFilter::Debug,
        2.. => LevelFilter::Trace,
        -1 => LevelFilter::Warn,
        -2 => LevelFilter::Error,
        i if i < -2 => LevelFilter::Off,
        _ => LevelFilter::Info,
    };
    let mut log_builder = env_logger::Builder::new();
    log_builder.filter(None, lvl);
    log_builder.init();
}

/// Reads every FASTQ/FASTA record in `path` into memory, assigning each a 0-based `idx`
/// matching its position in the collection - the position the FM-index and seed
/// enumeration key self-exclusion on (§3, §4.4).
fn load_reads(path: &std::path::Path) -> Result<Vec<Read>> {
    let mut reader = parse_fastx_file(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut reads = Vec::new();
    while let Some(record) = reader.next() {
        let record = record.context("failed to parse record")?;
        let id = String::from_utf8_lossy(record.id()).into_owned();
        let seq = record.seq().into_owned();
        let qual = record.qual().map(|q| q.to_vec());
        let idx = reads.len();
        reads.push(Read::new(id, seq, qual, idx));
    }
    Ok(reads)
}

/// A `Write` handle over a shared in-memory buffer, so a buffer boxed into a
/// [`PostProcessor`] can still be read back afterward.
#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Corrects every read in `chunk`, writing passing and failing reads to their own
/// in-memory sinks so this can run as one independent unit of work inside a `rayon`
/// task (§5: each worker owns its own `PostProcessor`, combined afterward via
/// [`Metrics::merge`]).
fn correct_chunk(
    chunk: &[Read],
    dispatcher: &Dispatcher,
    params: &CorrectionParams,
    split_discard: bool,
) -> Result<(Vec<u8>, Option<Vec<u8>>, Metrics)> {
    let corrected_handle = SharedBuf::default();
    let discard_handle = if split_discard {
        Some(SharedBuf::default())
    } else {
        None
    };

    let mut post_processor = PostProcessor::new(
        Box::new(corrected_handle.clone()),
        discard_handle
            .clone()
            .map(|h| Box::new(h) as Box<dyn Write + Send>),
    );

    for read in chunk {
        let result = dispatcher
            .correct(read, params)
            .with_context(|| format!("failed to correct read {}", read.id))?;
        trace!(
            "read {}: kmer_qc={} overlap_qc={}",
            read.id,
            result.kmer_qc,
            result.overlap_qc
        );
        post_processor.process(read, &result)?;
    }

    let metrics = post_processor.finalize()?;

    let corrected_bytes = corrected_handle.0.lock().unwrap().clone();
    let discard_bytes = discard_handle.map(|h| h.0.lock().unwrap().clone());

    Ok((corrected_bytes, discard_bytes, metrics))
}

fn main() -> Result<()> {
    let args = cli::Args::parse();
    setup_logging(args.quiet, args.verbose);
    debug!("{:?}", args);

    let reads = load_reads(&args.input)?;
    info!("Loaded {} reads from {}", reads.len(), args.input.display());

    let sequences: Vec<Vec<u8>> = reads.iter().map(|r| r.seq.clone()).collect();
    let index = ReferenceIndex::build(sequences);
    let overlap_svc = ReferenceOverlapService::new(&index);
    let quality = DefaultQualityTable;
    let dispatcher = Dispatcher::new(&index, &index, &overlap_svc, &quality);

    let params = CorrectionParams::new(args.algorithm.into(), args.kmer_length)
        .with_num_kmer_rounds(args.num_kmer_rounds)
        .with_num_overlap_rounds(args.num_overlap_rounds)
        .with_min_overlap(args.min_overlap)
        .with_min_identity(args.min_identity)
        .with_conflict_cutoff(args.conflict_cutoff)
        .with_depth_filter(args.depth_filter)
        .with_print_overlaps(args.print_overlaps);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads)
        .build()
        .context("failed to build rayon thread pool")?;

    let num_chunks = args.threads.max(1);
    let chunk_size = reads.len().div_ceil(num_chunks).max(1);

    let split_discard = args.discard.is_some();

    let chunk_results: Vec<_> = pool.install(|| {
        reads
            .par_chunks(chunk_size)
            .map(|chunk| correct_chunk(chunk, &dispatcher, &params, split_discard))
            .collect::<Result<Vec<_>>>()
    })?;

    let mut corrected_sink = utils::open_sink(&args.output)?;
    let mut discard_sink = match &args.discard {
        Some(path) => Some(utils::open_sink(path.to_str().unwrap_or("-"))?),
        None => None,
    };

    let mut metrics = Metrics::new();
    for (corrected_bytes, discard_bytes, chunk_metrics) in chunk_results {
        corrected_sink.write_all(&corrected_bytes)?;
        if let (Some(bytes), Some(sink)) = (discard_bytes, discard_sink.as_mut()) {
            sink.write_all(&bytes)?;
        }
        metrics.merge(&chunk_metrics);
    }
    corrected_sink.flush()?;
    if let Some(sink) = discard_sink.as_mut() {
        sink.flush()?;
    }

    info!(
        "{} reads total: {} k-mer pass, {} overlap pass, {} qc fail",
        metrics.reads_total(),
        metrics.kmer_pass(),
        metrics.overlap_pass(),
        metrics.qc_fail()
    );

    Ok(())
}
