//! Legacy overlap corrector (C8): the pre-FM-index correction path. Overlaps are
//! discovered directly through [`OverlapService::overlap_read`] rather than the
//! seed-and-refine pipeline in [`crate::seed`]/[`crate::refine`], and disagreements are
//! resolved with an error-rate-aware conflict test instead of the index corrector's
//! plurality-with-veto.

use log::{debug, warn};

use crate::error::Result;
use crate::service::{FmIndex, OverlapDirection, OverlapService};
use crate::types::{revcomp, CorrectionParams, CorrectionResult, Read};

/// Background per-base sequencing error rate assumed when judging whether a column's
/// minority votes are real variation or just noise.
const DEFAULT_P_ERROR: f32 = 0.01;

struct LegacyColumn {
    votes: Vec<u8>,
}

impl LegacyColumn {
    fn new(base: u8) -> Self {
        Self { votes: vec![base] }
    }

    fn add(&mut self, base: u8) {
        self.votes.push(base);
    }

    /// Majority base plus whether the column is in conflict: the runner-up base
    /// appears more often than `p_error` alone would explain, at a rate past
    /// `conflict_cutoff` of the pile.
    fn resolve(&self, original: u8, p_error: f32, conflict_cutoff: f32) -> (u8, bool) {
        let mut tally: [usize; 5] = [0; 5];
        for &b in &self.votes {
            tally[base_index(b)] += 1;
        }
        let total = self.votes.len();

        let mut order: Vec<usize> = (0..5).collect();
        order.sort_by(|&a, &b| tally[b].cmp(&tally[a]));
        let winner_count = tally[order[0]];
        let runner_up_count = tally[order[1]];

        let majority = if winner_count == 0 {
            original
        } else {
            index_base(order[0])
        };

        let noise_threshold = (total as f32 * p_error).max(1.0);
        let conflict = runner_up_count > 0
            && runner_up_count as f32 > noise_threshold
            && (runner_up_count as f32 / total as f32) >= conflict_cutoff;

        (majority, conflict)
    }
}

fn base_index(b: u8) -> usize {
    match b {
        b'A' => 0,
        b'C' => 1,
        b'G' => 2,
        b'T' => 3,
        _ => 4,
    }
}

fn index_base(i: usize) -> u8 {
    match i {
        0 => b'A',
        1 => b'C',
        2 => b'G',
        3 => b'T',
        _ => b'N',
    }
}

/// Whether a corrected read is acceptable: any unresolved conflict anywhere in the pile
/// fails QC outright, the same conservative stance the depth filter takes.
fn qc_check(num_conflicts: usize) -> bool {
    num_conflicts == 0
}

pub struct LegacyCorrector<'a> {
    index: &'a dyn FmIndex,
    overlap_svc: &'a dyn OverlapService,
}

impl<'a> LegacyCorrector<'a> {
    pub fn new(index: &'a dyn FmIndex, overlap_svc: &'a dyn OverlapService) -> Self {
        Self { index, overlap_svc }
    }

    pub fn correct(&self, read: &Read, params: &CorrectionParams) -> Result<CorrectionResult> {
        let blocks = self.overlap_svc.overlap_read(read, params.min_overlap)?;

        // Sum of interval sizes, not block count: a single block can itself span many
        // suffix-array rows in a high-copy repeat.
        let sum_overlaps: usize = blocks.iter().map(|b| b.overlap_len()).sum();

        if params.depth_filter > 0 && sum_overlaps > params.depth_filter {
            warn!(
                "read {} has {} overlaps, exceeding depth_filter {}, skipping legacy correction",
                read.id, sum_overlaps, params.depth_filter
            );
            // A deliberate bypass, not a QC failure: the read is assumed good and passed
            // through unchanged. `num_prefix_overlaps`/`num_suffix_overlaps` both carry
            // the combined sum here, not independent prefix/suffix counts.
            return Ok(CorrectionResult {
                corrected_seq: read.seq.clone(),
                kmer_qc: false,
                overlap_qc: true,
                num_prefix_overlaps: sum_overlaps,
                num_suffix_overlaps: sum_overlaps,
            });
        }

        let num_prefix_overlaps = blocks
            .iter()
            .filter(|b| b.direction == OverlapDirection::Prefix)
            .count();
        let num_suffix_overlaps = blocks
            .iter()
            .filter(|b| b.direction == OverlapDirection::Suffix)
            .count();

        let mut seq = read.seq.clone();
        let mut overlap_qc = false;

        for round in 0..params.num_overlap_rounds {
            let mut columns: Vec<LegacyColumn> =
                seq.iter().map(|&b| LegacyColumn::new(b)).collect();

            for block in &blocks {
                let query_range = block.ranges.interval[0];
                let target_range = block.ranges.interval[1];
                let target_seq = self.index.extract_string(block.read_id)?;

                let window = &target_seq[target_range.lower..=target_range.upper];
                let projected = if block.is_reverse {
                    revcomp(window)
                } else {
                    window.to_vec()
                };

                for (i, &b) in projected.iter().enumerate() {
                    if let Some(col) = columns.get_mut(query_range.lower + i) {
                        col.add(b);
                    }
                }
            }

            let mut corrected = Vec::with_capacity(seq.len());
            let mut num_conflicts = 0;
            for (orig, col) in seq.iter().zip(columns.iter()) {
                let (majority, conflict) =
                    col.resolve(*orig, DEFAULT_P_ERROR, params.conflict_cutoff);
                if conflict {
                    num_conflicts += 1;
                }
                corrected.push(majority);
            }

            debug!(
                "read {} legacy round {}: {} conflicts across {} columns",
                read.id,
                round,
                num_conflicts,
                seq.len()
            );

            let converged = corrected == seq;
            seq = corrected;
            overlap_qc = qc_check(num_conflicts);

            if converged || round + 1 == params.num_overlap_rounds {
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
