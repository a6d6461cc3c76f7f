//! Reference FM-index and overlap service (C11).
//!
//! This is a small, obviously-correct implementation of the host services described in
//! [`crate::service`] - a naive `O(n log^2 n)` suffix array, a derived BWT, and
//! brute-force overlap search. It exists for the test suite and the CLI harness
//! ([`crate::dispatch`] and `rcorrect`), not as a production FM-index: a real deployment
//! is expected to supply a compressed, indexed implementation of the same traits.

use std::collections::BTreeMap;

use crate::error::{CorrectError, Result};
use crate::service::{
    FmIndex, Interval, Overlap, OverlapBlock, OverlapDirection, OverlapService, QualityTable,
    Ranges, SuffixArraySample,
};
use crate::types::{revcomp, Read};

/// Sentinel byte appended to every read before concatenation. Reads are assumed not to
/// contain it; this holds for `{A, C, G, T, N}` sequence data.
const SENTINEL: u8 = 0u8;

/// A naive FM-index over a fixed collection of reads, built once up front.
pub struct ReferenceIndex {
    reads: Vec<Vec<u8>>,
    bwt: Vec<u8>,
    row_to_read: Vec<usize>,
    c_table: BTreeMap<u8, usize>,
}

impl ReferenceIndex {
    /// Build the index over `reads`. `O(n^2 log n)` in the total collection length;
    /// fine for the read counts the test suite and CLI harness work with, not for a
    /// production-scale collection.
    pub fn build(reads: Vec<Vec<u8>>) -> Self {
        let mut concatenated = Vec::new();
        let mut boundaries = Vec::with_capacity(reads.len());
        for r in &reads {
            concatenated.extend_from_slice(r);
            concatenated.push(SENTINEL);
            boundaries.push(concatenated.len());
        }

        let n = concatenated.len();
        let mut sa: Vec<usize> = (0..n).collect();
        sa.sort_by(|&a, &b| concatenated[a..].cmp(&concatenated[b..]));

        let bwt: Vec<u8> = sa
            .iter()
            .map(|&i| if i == 0 { SENTINEL } else { concatenated[i - 1] })
            .collect();

        let mut counts: BTreeMap<u8, usize> = BTreeMap::new();
        for &b in &concatenated {
            *counts.entry(b).or_insert(0) += 1;
        }
        let mut c_table = BTreeMap::new();
        let mut running = 0;
        for (&symbol, &count) in &counts {
            c_table.insert(symbol, running);
            running += count;
        }

        let row_to_read: Vec<usize> = sa
            .iter()
            .map(|&start| boundaries.iter().position(|&b| start < b).unwrap())
            .collect();

        Self {
            reads,
            bwt,
            row_to_read,
            c_table,
        }
    }

    fn occ_naive(&self, base: u8, index: usize) -> usize {
        self.bwt[..=index].iter().filter(|&&b| b == base).count()
    }

    fn init_interval(&self, base: u8) -> Option<Interval> {
        if self.bwt.is_empty() {
            return None;
        }
        let lower = *self.c_table.get(&base)?;
        let total = self.occ_naive(base, self.bwt.len() - 1);
        if total == 0 {
            return None;
        }
        Some(Interval {
            lower,
            upper: lower + total - 1,
        })
    }

    fn extend_interval(&self, iv: Interval, base: u8) -> Option<Interval> {
        let c = *self.c_table.get(&base)?;
        let before = if iv.lower == 0 {
            0
        } else {
            self.occ_naive(base, iv.lower - 1)
        };
        let within = self.occ_naive(base, iv.upper);
        if within <= before {
            return None;
        }
        Some(Interval {
            lower: c + before,
            upper: c + within - 1,
        })
    }
}

impl FmIndex for ReferenceIndex {
    fn find_interval(&self, kmer: &[u8]) -> Result<Option<Interval>> {
        if kmer.is_empty() {
            return Ok(None);
        }
        let mut interval = self.init_interval(kmer[kmer.len() - 1]);
        for &base in kmer.iter().rev().skip(1) {
            interval = match interval {
                Some(iv) => self.extend_interval(iv, base),
                None => return Ok(None),
            };
        }
        Ok(interval)
    }

    fn count(&self, kmer: &[u8]) -> Result<usize> {
        Ok(self.find_interval(kmer)?.map_or(0, |iv| iv.size()))
    }

    fn bwt_char(&self, index: usize) -> Result<u8> {
        self.bwt
            .get(index)
            .copied()
            .ok_or_else(|| CorrectError::FmIndexError(format!("BWT index {} out of range", index)))
    }

    fn c(&self, base: u8) -> Result<usize> {
        Ok(*self.c_table.get(&base).unwrap_or(&self.bwt.len()))
    }

    fn occ(&self, base: u8, index: usize) -> Result<usize> {
        if index >= self.bwt.len() {
            return Err(CorrectError::FmIndexError(format!(
                "occ index {} out of range",
                index
            )));
        }
        Ok(self.occ_naive(base, index))
    }

    fn extract_string(&self, read_id: usize) -> Result<Vec<u8>> {
        self.reads
            .get(read_id)
            .cloned()
            .ok_or_else(|| CorrectError::FmIndexError(format!("no read with id {}", read_id)))
    }

    fn len(&self) -> usize {
        self.bwt.len()
    }
}

impl SuffixArraySample for ReferenceIndex {
    fn lookup_lex_rank(&self, bwt_index: usize) -> Result<usize> {
        self.row_to_read.get(bwt_index).copied().ok_or_else(|| {
            CorrectError::SuffixArrayError(format!("BWT index {} out of range", bwt_index))
        })
    }
}

/// Best ungapped alignment of `a`'s suffix against `b`'s prefix (or vice versa),
/// reusing the same brute-force scan [`compute_overlap`](OverlapService::compute_overlap)
/// and [`overlap_read`](OverlapService::overlap_read) both build on.
fn best_ungapped_overlap(a: &[u8], b: &[u8]) -> Option<(usize, usize, usize, usize)> {
    // Returns (query_start, target_start, length, matches).
    let mut best: Option<(usize, usize, usize, usize)> = None;

    // a's suffix vs b's prefix.
    for len in 1..=a.len().min(b.len()) {
        let qs = a.len() - len;
        let matches = (0..len).filter(|&i| a[qs + i] == b[i]).count();
        if best.map_or(true, |(_, _, _, m)| matches > m) {
            best = Some((qs, 0, len, matches));
        }
    }

    // b's suffix vs a's prefix (a starts at 0, b starts partway through).
    for len in 1..=a.len().min(b.len()) {
        let ts = b.len() - len;
        let matches = (0..len).filter(|&i| a[i] == b[ts + i]).count();
        if best.map_or(true, |(_, _, _, m)| matches > m) {
            best = Some((0, ts, len, matches));
        }
    }

    best
}

/// Brute-force reference overlap service: correct, quadratic, and intended only for the
/// sizes exercised by tests and the CLI harness's demo mode.
pub struct ReferenceOverlapService<'a> {
    index: &'a ReferenceIndex,
}

impl<'a> ReferenceOverlapService<'a> {
    pub fn new(index: &'a ReferenceIndex) -> Self {
        Self { index }
    }
}

impl<'a> OverlapService for ReferenceOverlapService<'a> {
    fn overlap_read(&self, read: &Read, min_overlap: usize) -> Result<Vec<OverlapBlock>> {
        let mut blocks = Vec::new();
        for (id, target) in self.index.reads.iter().enumerate() {
            if id == read.idx {
                continue;
            }
            for &is_reverse in &[false, true] {
                let candidate = if is_reverse { revcomp(target) } else { target.clone() };
                if let Some((qs, ts, len, matches)) = best_ungapped_overlap(&read.seq, &candidate) {
                    if len < min_overlap || matches != len {
                        continue;
                    }
                    let direction = if qs == 0 {
                        OverlapDirection::Prefix
                    } else {
                        OverlapDirection::Suffix
                    };
                    blocks.push(OverlapBlock {
                        read_id: id,
                        is_reverse,
                        direction,
                        ranges: Ranges {
                            interval: [
                                Interval {
                                    lower: qs,
                                    upper: qs + len - 1,
                                },
                                Interval {
                                    lower: ts,
                                    upper: ts + len - 1,
                                },
                            ],
                        },
                    });
                }
            }
        }
        Ok(blocks)
    }

    fn compute_overlap(&self, a: &[u8], b: &[u8]) -> Result<Overlap> {
        match best_ungapped_overlap(a, b) {
            Some((qs, ts, len, matches)) => Ok(Overlap {
                length: len,
                percent_identity: 100.0 * matches as f32 / len as f32,
                query_start: qs,
                target_start: ts,
            }),
            None => Ok(Overlap {
                length: 0,
                percent_identity: 0.0,
                query_start: 0,
                target_start: 0,
            }),
        }
    }

    fn extend_match(
        &self,
        a: &[u8],
        b: &[u8],
        pos_a: usize,
        pos_b: usize,
        band: usize,
    ) -> Result<Overlap> {
        let mut matches = 0usize;
        let mut mismatches_run = 0usize;
        let mut length = 0usize;

        let mut i = 0usize;
        loop {
            let (ia, ib) = (pos_a + i, pos_b + i);
            if ia >= a.len() || ib >= b.len() {
                break;
            }
            if a[ia] == b[ib] {
                matches += 1;
                mismatches_run = 0;
            } else {
                mismatches_run += 1;
                if mismatches_run > band {
                    break;
                }
            }
            length += 1;
            i += 1;
        }

        let mut start_back = 0usize;
        loop {
            let next = start_back + 1;
            if next > pos_a || next > pos_b {
                break;
            }
            let (ia, ib) = (pos_a - next, pos_b - next);
            if a[ia] == b[ib] {
                matches += 1;
                start_back = next;
                length += 1;
            } else {
                break;
            }
        }

        let query_start = pos_a - start_back;
        let target_start = pos_b - start_back;

        Ok(Overlap {
            length,
            percent_identity: if length == 0 {
                0.0
            } else {
                100.0 * matches as f32 / length as f32
            },
            query_start,
            target_start,
        })
    }
}

/// A phred-to-support-threshold table grounded in the conventional rule of thumb that
/// lower-confidence bases need more corroborating k-mer occurrences before they're
/// trusted. Phred values are Sanger-encoded (`byte - 33`).
pub struct DefaultQualityTable;

impl QualityTable for DefaultQualityTable {
    fn required_support(&self, phred: u8) -> usize {
        let score = phred.saturating_sub(33);
        match score {
            0..=9 => 5,
            10..=19 => 4,
            20..=29 => 3,
            _ => 2,
        }
    }
}
