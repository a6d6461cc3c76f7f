use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use libcorrect::Algorithm;

const KMER_LENGTH: &str = "31";
const NUM_KMER_ROUNDS: &str = "10";
const NUM_OVERLAP_ROUNDS: &str = "3";
const MIN_OVERLAP: &str = "45";
const MIN_IDENTITY: &str = "0.95";
const CONFLICT_CUTOFF: &str = "0.15";
const DEPTH_FILTER: &str = "10000";

/// Which correction algorithm to dispatch each read through, mirroring
/// [`libcorrect::Algorithm`] as a CLI-friendly enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AlgorithmArg {
    Kmer,
    Overlap,
    Hybrid,
}

impl std::fmt::Display for AlgorithmArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AlgorithmArg::Kmer => "kmer",
            AlgorithmArg::Overlap => "overlap",
            AlgorithmArg::Hybrid => "hybrid",
        };
        f.write_str(s)
    }
}

impl From<AlgorithmArg> for Algorithm {
    fn from(value: AlgorithmArg) -> Self {
        match value {
            AlgorithmArg::Kmer => Algorithm::Kmer,
            AlgorithmArg::Overlap => Algorithm::Overlap,
            AlgorithmArg::Hybrid => Algorithm::Hybrid,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Input FASTQ file of reads to correct
    #[arg(name = "INPUT", value_parser = check_path_exists)]
    pub input: PathBuf,

    /// Output file for corrected (or passing) reads, in FASTA. Use "-" for stdout
    #[arg(short, long, value_name = "FASTA", default_value = "-")]
    pub output: String,

    /// Output file for reads that fail QC, in FASTA. Defaults to the corrected output
    #[arg(short = 'D', long, value_name = "FASTA")]
    pub discard: Option<PathBuf>,

    /// Correction algorithm to run
    #[arg(short, long, value_enum, default_value_t = AlgorithmArg::Hybrid)]
    pub algorithm: AlgorithmArg,

    /// k-mer length used by both the k-mer corrector and the index-driven overlap corrector's
    /// seed enumeration
    #[arg(short = 'k', long = "kmer-length", value_name = "INT", default_value = KMER_LENGTH)]
    pub kmer_length: usize,

    /// Maximum number of k-mer correction rounds
    #[arg(long = "kmer-rounds", value_name = "INT", default_value = NUM_KMER_ROUNDS)]
    pub num_kmer_rounds: usize,

    /// Maximum number of overlap correction rounds (legacy and index-driven)
    #[arg(long = "overlap-rounds", value_name = "INT", default_value = NUM_OVERLAP_ROUNDS)]
    pub num_overlap_rounds: usize,

    /// Minimum accepted overlap length, in bases
    #[arg(long = "min-overlap", value_name = "INT", default_value = MIN_OVERLAP)]
    pub min_overlap: usize,

    /// Minimum accepted overlap identity, as a fraction in [0, 1]
    #[arg(long = "min-identity", value_name = "FLOAT", default_value = MIN_IDENTITY, value_parser = validate_unit_interval)]
    pub min_identity: f32,

    /// Minority-fraction bound above which the legacy corrector vetoes a consensus column
    #[arg(long = "conflict-cutoff", value_name = "FLOAT", default_value = CONFLICT_CUTOFF, value_parser = validate_unit_interval)]
    pub conflict_cutoff: f32,

    /// Legacy corrector bypass threshold: reads with more than this many summed overlaps skip
    /// correction outright. Zero disables the bypass
    #[arg(long = "depth-filter", value_name = "INT", default_value = DEPTH_FILTER)]
    pub depth_filter: usize,

    /// Log every accepted overlap found by the index-driven corrector
    #[arg(long = "print-overlaps", hide_short_help = true)]
    pub print_overlaps: bool,

    /// Number of threads to correct reads with
    #[arg(short, long, value_name = "INT", default_value = "1")]
    pub threads: usize,

    /// `-q` only show errors and warnings. `-qq` only show errors. `-qqq` shows nothing.
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "verbose")]
    pub quiet: u8,

    /// `-v` show debug output. `-vv` show trace output.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// A utility function that allows the CLI to error if a path doesn't exist
fn check_path_exists(s: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(s);
    if path.exists() {
        Ok(path)
    } else {
        Err(format!("{} does not exist", path.to_string_lossy()))
    }
}

/// A value parser that rejects anything outside `[0, 1]`, shared by `--min-identity` and
/// `--conflict-cutoff`.
fn validate_unit_interval(s: &str) -> Result<f32, String> {
    let value: f32 = s
        .parse()
        .map_err(|_| format!("`{}` is not a valid number", s))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("Value `{}` must be between 0.0 and 1.0", s))
    }
}
