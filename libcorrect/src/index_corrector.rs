//! Index-driven overlap corrector (C7): the FM-index seed-and-refine pipeline (C4/C5)
//! feeding a multiple-alignment consensus (C6), repeated for a fixed number of rounds.

use log::{debug, info};

use crate::consensus::MultipleAlignment;
use crate::error::Result;
use crate::refine::refine_seeds;
use crate::seed::enumerate_seeds;
use crate::service::{FmIndex, OverlapService, SuffixArraySample};
use crate::types::{revcomp, CorrectionParams, CorrectionResult, Read};

/// Final-round consensus requires at least this many independently-agreeing overlaps
/// before a base is changed; earlier rounds accept a plurality of even one.
const FINAL_ROUND_MIN_SUPPORT: usize = 3;

/// Every column considered regardless of pile depth: the cap exists in the consensus
/// API for hosts with extreme-depth piles, not because this corrector throttles itself.
const UNBOUNDED_DEPTH: usize = 10_000;

pub struct IndexCorrector<'a> {
    index: &'a dyn FmIndex,
    sa: &'a dyn SuffixArraySample,
    overlap_svc: &'a dyn OverlapService,
}

impl<'a> IndexCorrector<'a> {
    pub fn new(
        index: &'a dyn FmIndex,
        sa: &'a dyn SuffixArraySample,
        overlap_svc: &'a dyn OverlapService,
    ) -> Self {
        Self {
            index,
            sa,
            overlap_svc,
        }
    }

    pub fn correct(&self, read: &Read, params: &CorrectionParams) -> Result<CorrectionResult> {
        let mut seq = read.seq.clone();
        let mut num_prefix_overlaps = 0;
        let mut num_suffix_overlaps = 0;
        let mut overlap_qc = false;

        for round in 0..params.num_overlap_rounds {
            let current = Read::new(read.id.clone(), seq.clone(), read.qual.clone(), read.idx);
            let seeds = enumerate_seeds(self.index, self.sa, &current, params.kmer_length)?;
            let accepted = refine_seeds(
                self.index,
                self.overlap_svc,
                &current,
                &seeds,
                params.kmer_length,
                params.min_overlap,
                params.min_identity,
            )?;

            debug!(
                "read {} round {}: {} seeds, {} accepted overlaps",
                read.id,
                round,
                seeds.len(),
                accepted.len()
            );

            if params.print_overlaps {
                for acc in &accepted {
                    info!(
                        "read {} overlap: read_id={} reverse={} length={} identity={:.2}",
                        read.id,
                        acc.read_id,
                        acc.is_reverse,
                        acc.overlap.length,
                        acc.overlap.identity_fraction()
                    );
                }
            }

            if round == 0 {
                for acc in &accepted {
                    // An overlap is a prefix overlap when it reaches the read's start
                    // (query_start == 0) and a suffix overlap when it reaches the
                    // read's end; short reads with short overlaps can be both.
                    if acc.overlap.query_start == 0 {
                        num_prefix_overlaps += 1;
                    }
                    if acc.overlap.query_start + acc.overlap.length == seq.len() {
                        num_suffix_overlaps += 1;
                    }
                }
            }

            if accepted.is_empty() {
                overlap_qc = false;
                break;
            }

            let mut ma = MultipleAlignment::new(&seq);
            for acc in &accepted {
                let target = self.index.extract_string(acc.read_id)?;
                let ov = &acc.overlap;

                let (forward_start, projected) = if acc.is_reverse {
                    let window = &target[ov.target_start..ov.target_start + ov.length];
                    let forward_start = seq.len() - ov.query_start - ov.length;
                    (forward_start, revcomp(window))
                } else {
                    (ov.query_start, target[ov.target_start..ov.target_start + ov.length].to_vec())
                };

                ma.add_overlap(&projected, forward_start);
            }

            let is_final_round = round + 1 == params.num_overlap_rounds;
            let min_support = if is_final_round {
                FINAL_ROUND_MIN_SUPPORT
            } else {
                0
            };
            let corrected = ma.consensus(UNBOUNDED_DEPTH, min_support);
            let converged = corrected == seq;
            seq = corrected;

            if converged || is_final_round {
                overlap_qc = true;
                break;
            }
        }

        Ok(CorrectionResult {
            corrected_seq: seq,
            kmer_qc: false,
            overlap_qc,
            num_prefix_overlaps,
            num_suffix_overlaps,
        })
    }
}
