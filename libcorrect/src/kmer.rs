//! k-mer count cache (C2) and k-mer corrector (C3).

use std::collections::HashMap;

use log::{debug, trace};

use crate::error::Result;
use crate::service::{FmIndex, QualityTable};
use crate::types::{CorrectionResult, Read};

const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];

/// Per-read memoization of FM-index count queries (C2). A fresh instance is created for
/// every read; there is no eviction and no cross-read sharing.
pub struct CountCache<'a> {
    index: &'a dyn FmIndex,
    cache: HashMap<Vec<u8>, usize>,
}

impl<'a> CountCache<'a> {
    pub fn new(index: &'a dyn FmIndex) -> Self {
        Self {
            index,
            cache: HashMap::new(),
        }
    }

    /// Occurrence count of `kmer`, consulting the FM-index on first request and
    /// memoizing thereafter.
    pub fn count(&mut self, kmer: &[u8]) -> Result<usize> {
        if let Some(&c) = self.cache.get(kmer) {
            return Ok(c);
        }
        let c = self.index.count(kmer)?;
        self.cache.insert(kmer.to_vec(), c);
        Ok(c)
    }
}

/// Iteratively repairs the leftmost non-solid base of a read (§4.3).
pub struct KmerCorrector<'a> {
    index: &'a dyn FmIndex,
    quality: &'a dyn QualityTable,
}

impl<'a> KmerCorrector<'a> {
    pub fn new(index: &'a dyn FmIndex, quality: &'a dyn QualityTable) -> Self {
        Self { index, quality }
    }

    pub fn correct(
        &self,
        read: &Read,
        kmer_length: usize,
        num_kmer_rounds: usize,
    ) -> Result<CorrectionResult> {
        let k = kmer_length;
        if read.len() < k {
            debug!(
                "read {} shorter than k={}, skipping k-mer correction",
                read.id, k
            );
            return Ok(CorrectionResult {
                corrected_seq: read.seq.clone(),
                kmer_qc: false,
                overlap_qc: false,
                num_prefix_overlaps: 0,
                num_suffix_overlaps: 0,
            });
        }

        let mut seq = read.seq.clone();
        let len = seq.len();
        let nk = len - k + 1;
        let min_phred = precompute_min_phred(read, k, nk);

        let mut cache = CountCache::new(self.index);
        let mut kmer_qc = false;

        for round in 0..=num_kmer_rounds {
            let mut counts = Vec::with_capacity(nk);
            let mut solid = vec![false; len];
            for i in 0..nk {
                let count = cache.count(&seq[i..i + k])?;
                counts.push(count);
                let required = self.quality.required_support(min_phred[i]);
                if count >= required {
                    for pos in i..i + k {
                        solid[pos] = true;
                    }
                }
            }

            if solid.iter().all(|&s| s) {
                trace!("read {} all solid after round {}", read.id, round);
                kmer_qc = true;
                break;
            }

            let i_star = solid.iter().position(|&s| !s).unwrap();

            let left_start = i_star.saturating_sub(k.saturating_sub(1));
            let right_start = i_star.min(len - k);

            let required_at_star = self.quality.required_support(read.phred_at(i_star));

            let left_min_count = counts[left_start].max(required_at_star);
            let left_result =
                attempt_single_base(&mut cache, &seq, i_star, left_start, k, left_min_count)?;

            let mut changed = false;
            if let Some(new_base) = left_result {
                seq[i_star] = new_base;
                changed = true;
            } else {
                let right_min_count = counts[right_start].max(required_at_star);
                let right_result = attempt_single_base(
                    &mut cache,
                    &seq,
                    i_star,
                    right_start,
                    k,
                    right_min_count,
                )?;
                if let Some(new_base) = right_result {
                    seq[i_star] = new_base;
                    changed = true;
                }
            }

            if !changed {
                trace!(
                    "read {} could not correct base {} in round {}, giving up",
                    read.id, i_star, round
                );
                kmer_qc = false;
                break;
            }
        }

        Ok(CorrectionResult {
            corrected_seq: seq,
            kmer_qc,
            overlap_qc: false,
            num_prefix_overlaps: 0,
            num_suffix_overlaps: 0,
        })
    }
}

/// `min_phred[i] = min over j in [i, i+k) of phred(j)`.
fn precompute_min_phred(read: &Read, k: usize, nk: usize) -> Vec<u8> {
    let mut min_phred = Vec::with_capacity(nk);
    for i in 0..nk {
        let m = (i..i + k).map(|j| read.phred_at(j)).min().unwrap();
        min_phred.push(m);
    }
    min_phred
}

/// Single-base correction attempt (§4.3.1). Returns the corrected base, or `None` if no
/// alternative clears `min_count` unambiguously. Never mutates `seq` - callers apply the
/// returned base themselves.
fn attempt_single_base(
    cache: &mut CountCache,
    seq: &[u8],
    i: usize,
    k_idx: usize,
    k: usize,
    min_count: usize,
) -> Result<Option<u8>> {
    let b = i - k_idx;
    let orig = seq[i];
    let mut kmer = seq[k_idx..k_idx + k].to_vec();

    let mut qualifying = Vec::new();
    for &c in BASES.iter() {
        if c == orig {
            continue;
        }
        kmer[b] = c;
        let count = cache.count(&kmer)?;
        if count >= min_count {
            qualifying.push((c, count));
        }
    }

    if qualifying.len() >= 2 {
        // Two or more alternatives independently meet the threshold: never resolve the
        // tie by picking one.
        return Ok(None);
    }

    Ok(qualifying.first().map(|&(c, _)| c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    struct MockIndex {
        counts: StdHashMap<Vec<u8>, usize>,
    }

    impl FmIndex for MockIndex {
        fn find_interval(&self, _kmer: &[u8]) -> Result<Option<crate::service::Interval>> {
            unimplemented!()
        }
        fn count(&self, kmer: &[u8]) -> Result<usize> {
            Ok(*self.counts.get(kmer).unwrap_or(&0))
        }
        fn bwt_char(&self, _index: usize) -> Result<u8> {
            unimplemented!()
        }
        fn c(&self, _base: u8) -> Result<usize> {
            unimplemented!()
        }
        fn occ(&self, _base: u8, _index: usize) -> Result<usize> {
            unimplemented!()
        }
        fn extract_string(&self, _read_id: usize) -> Result<Vec<u8>> {
            unimplemented!()
        }
        fn len(&self) -> usize {
            0
        }
    }

    struct FixedQuality(usize);
    impl QualityTable for FixedQuality {
        fn required_support(&self, _phred: u8) -> usize {
            self.0
        }
    }

    fn all_kmers_solid(seq: &[u8], k: usize, min_count: usize) -> StdHashMap<Vec<u8>, usize> {
        let mut m = StdHashMap::new();
        for i in 0..=seq.len() - k {
            m.insert(seq[i..i + k].to_vec(), min_count);
        }
        m
    }

    #[test]
    fn scenario_1_all_solid_unchanged() {
        let seq = b"ACGTACGTACGT".to_vec();
        let counts = all_kmers_solid(&seq, 5, 2);
        let index = MockIndex { counts };
        let quality = FixedQuality(2);
        let corrector = KmerCorrector::new(&index, &quality);
        let read = Read::new("r1", seq.clone(), Some(vec![b'I'; seq.len()]), 0);

        let result = corrector.correct(&read, 5, 10).unwrap();
        assert!(result.kmer_qc);
        assert_eq!(result.corrected_seq, seq);
    }

    #[test]
    fn scenario_2_unambiguous_single_correction() {
        // "ACGTAXGTACGT" with X=T being correct, X=C/A/G failing threshold.
        let correct_seq = b"ACGTATGTACGT".to_vec();
        let mut counts = all_kmers_solid(&correct_seq, 5, 2);

        let broken_seq = b"ACGTACGTACGT".to_vec(); // X replaced with C originally
        // Zero out counts for every k-mer spanning position 5 in the broken sequence.
        for i in 1..=5 {
            if i + 5 <= broken_seq.len() {
                counts.insert(broken_seq[i..i + 5].to_vec(), 0);
            }
        }
        // Also ensure other substitutions (A, G) at position 5 stay below threshold.
        for alt in [b'A', b'G'] {
            let mut variant = broken_seq.clone();
            variant[5] = alt;
            for i in 1..=5 {
                if i + 5 <= variant.len() {
                    counts.insert(variant[i..i + 5].to_vec(), 0);
                }
            }
        }

        let index = MockIndex { counts };
        let quality = FixedQuality(2);
        let corrector = KmerCorrector::new(&index, &quality);
        let read = Read::new("r2", broken_seq.clone(), Some(vec![b'I'; broken_seq.len()]), 0);

        let result = corrector.correct(&read, 5, 10).unwrap();
        assert!(result.kmer_qc);
        assert_eq!(result.corrected_seq, correct_seq);
    }

    #[test]
    fn scenario_3_ambiguous_correction_fails_qc() {
        let base_seq = b"ACGTACGTACGT".to_vec();
        let mut counts = StdHashMap::new();

        // Both T and C at position 5 produce solid k-mers; the corrector must refuse to
        // pick either.
        for alt in [b'T', b'C'] {
            let mut variant = base_seq.clone();
            variant[5] = alt;
            for i in 1..=5 {
                if i + 5 <= variant.len() {
                    counts.insert(variant[i..i + 5].to_vec(), 5);
                }
            }
        }

        let index = MockIndex { counts };
        let quality = FixedQuality(2);
        let corrector = KmerCorrector::new(&index, &quality);
        let read = Read::new("r3", base_seq.clone(), Some(vec![b'I'; base_seq.len()]), 0);

        let result = corrector.correct(&read, 5, 10).unwrap();
        assert!(!result.kmer_qc);
        assert_eq!(result.corrected_seq[5], base_seq[5]);
    }

    #[test]
    fn read_shorter_than_k_fails_without_mutation() {
        let seq = b"ACG".to_vec();
        let index = MockIndex {
            counts: StdHashMap::new(),
        };
        let quality = FixedQuality(2);
        let corrector = KmerCorrector::new(&index, &quality);
        let read = Read::new("short", seq.clone(), None, 0);

        let result = corrector.correct(&read, 5, 10).unwrap();
        assert!(!result.kmer_qc);
        assert_eq!(result.corrected_seq, seq);
    }

    #[test]
    fn all_zero_counts_never_attempts_a_correction() {
        let seq = b"ACGTACGTACGT".to_vec();
        let index = MockIndex {
            counts: StdHashMap::new(),
        };
        let quality = FixedQuality(2);
        let corrector = KmerCorrector::new(&index, &quality);
        let read = Read::new("allzero", seq.clone(), Some(vec![b'I'; seq.len()]), 0);

        let result = corrector.correct(&read, 5, 10).unwrap();
        assert!(!result.kmer_qc);
        assert_eq!(result.corrected_seq, seq);
    }

    #[test]
    fn idempotent_on_already_corrected_output() {
        let seq = b"ACGTACGTACGT".to_vec();
        let counts = all_kmers_solid(&seq, 5, 2);
        let index = MockIndex { counts };
        let quality = FixedQuality(2);
        let corrector = KmerCorrector::new(&index, &quality);
        let read = Read::new("r1", seq.clone(), Some(vec![b'I'; seq.len()]), 0);

        let first = corrector.correct(&read, 5, 10).unwrap();
        let read2 = Read::new("r1", first.corrected_seq.clone(), Some(vec![b'I'; seq.len()]), 0);
        let second = corrector.correct(&read2, 5, 10).unwrap();
        assert_eq!(first.corrected_seq, second.corrected_seq);
        assert!(second.kmer_qc);
    }
}
