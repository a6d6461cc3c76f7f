//! Read error-correction core.
//!
//! `libcorrect` implements k-mer and overlap-consensus correction of short-read
//! sequencing data against a collection-wide FM-index, plus the post-processing metrics
//! collected while doing so. It does not read FASTQ files or parallelize work itself -
//! see the `rcorrect` CLI crate for that - it only consumes the host-supplied services
//! in [`service`] and produces a [`types::CorrectionResult`] per read.

pub mod consensus;
pub mod dispatch;
pub mod error;
pub mod index_corrector;
pub mod kmer;
pub mod legacy;
pub mod metrics;
pub mod refindex;
pub mod refine;
pub mod seed;
pub mod service;
pub mod types;

pub use dispatch::Dispatcher;
pub use error::{CorrectError, Result};
pub use metrics::{Metrics, PostProcessor, Sink};
pub use types::{Algorithm, CorrectionParams, CorrectionResult, Read};
