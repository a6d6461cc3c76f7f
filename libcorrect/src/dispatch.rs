//! Correction dispatcher (C9): routes a read to the algorithm named by
//! [`CorrectionParams::algorithm`], including the hybrid k-mer-then-legacy-overlap
//! fallback (§4.9).

use log::debug;

use crate::error::Result;
use crate::index_corrector::IndexCorrector;
use crate::kmer::KmerCorrector;
use crate::legacy::LegacyCorrector;
use crate::service::{FmIndex, OverlapService, QualityTable, SuffixArraySample};
use crate::types::{Algorithm, CorrectionParams, CorrectionResult, Read};

/// Wires the host-supplied services to the three correction algorithms and dispatches
/// each read according to `CorrectionParams::algorithm`.
pub struct Dispatcher<'a> {
    index: &'a dyn FmIndex,
    sa: &'a dyn SuffixArraySample,
    overlap_svc: &'a dyn OverlapService,
    quality: &'a dyn QualityTable,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        index: &'a dyn FmIndex,
        sa: &'a dyn SuffixArraySample,
        overlap_svc: &'a dyn OverlapService,
        quality: &'a dyn QualityTable,
    ) -> Self {
        Self {
            index,
            sa,
            overlap_svc,
            quality,
        }
    }

    pub fn correct(&self, read: &Read, params: &CorrectionParams) -> Result<CorrectionResult> {
        match params.algorithm {
            Algorithm::Kmer => {
                let corrector = KmerCorrector::new(self.index, self.quality);
                corrector.correct(read, params.kmer_length, params.num_kmer_rounds)
            }
            Algorithm::Overlap => {
                let corrector = IndexCorrector::new(self.index, self.sa, self.overlap_svc);
                corrector.correct(read, params)
            }
            Algorithm::Hybrid => self.correct_hybrid(read, params),
        }
    }

    fn correct_hybrid(&self, read: &Read, params: &CorrectionParams) -> Result<CorrectionResult> {
        let kmer_corrector = KmerCorrector::new(self.index, self.quality);
        let kmer_result = kmer_corrector.correct(read, params.kmer_length, params.num_kmer_rounds)?;

        if kmer_result.kmer_qc {
            return Ok(kmer_result);
        }

        debug!(
            "read {} failed k-mer QC, falling back to legacy overlap correction",
            read.id
        );

        // The legacy fallback re-aligns against the *original* read, not the k-mer
        // corrector's partial output: a failed k-mer pass offers no guarantee its
        // output is closer to the truth than the input.
        let legacy_corrector = LegacyCorrector::new(self.index, self.overlap_svc);
        let legacy_result = legacy_corrector.correct(read, params)?;

        Ok(CorrectionResult {
            corrected_seq: legacy_result.corrected_seq,
            kmer_qc: false,
            overlap_qc: legacy_result.overlap_qc,
            num_prefix_overlaps: legacy_result.num_prefix_overlaps,
            num_suffix_overlaps: legacy_result.num_suffix_overlaps,
        })
    }
}
