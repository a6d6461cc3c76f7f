//! Overlap refinement (C5): turns a raw seed into an accepted or rejected alignment.
//!
//! The seed's own k-mer is relocated in both orientations: if it occurs exactly once in
//! the query and exactly once in the match (no secondary occurrence strictly after the
//! first hit in either), the two positions anchor a cheap banded extension. Otherwise the
//! k-mer gives no reliable single anchor, and refinement falls back to full `O(mn)`
//! dynamic programming.

use log::trace;

use crate::error::Result;
use crate::service::{FmIndex, Overlap, OverlapService};
use crate::seed::Seed;
use crate::types::{revcomp, Read};

/// Half-width of the band used when extending a uniquely-seeded match (§4.5).
pub const BAND_WIDTH: usize = 20;

/// An overlap that survived refinement and the `min_overlap`/`min_identity` acceptance
/// test.
#[derive(Debug, Clone)]
pub struct AcceptedOverlap {
    pub read_id: usize,
    pub is_reverse: bool,
    pub overlap: Overlap,
}

/// The first occurrence of `needle` in `haystack`, or `None` if absent.
fn first_occurrence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Whether `needle` occurs again in `haystack` strictly after `first`. Occurrences
/// starting at or before `first` (including overlapping ones) don't count - only a
/// *secondary* hit makes the anchor unreliable.
fn has_secondary_occurrence(haystack: &[u8], needle: &[u8], first: usize) -> bool {
    haystack[first + 1..]
        .windows(needle.len())
        .any(|w| w == needle)
}

/// Refine one seed against the query read, returning `None` if the alignment does not
/// clear `min_overlap`/`min_identity`. `k` is the seed k-mer length used by
/// [`crate::seed::enumerate_seeds`].
pub fn refine_seed(
    index: &dyn FmIndex,
    overlap_svc: &dyn OverlapService,
    read: &Read,
    seed: &Seed,
    k: usize,
    min_overlap: usize,
    min_identity: f32,
) -> Result<Option<AcceptedOverlap>> {
    let query = if seed.is_reverse {
        revcomp(&read.seq)
    } else {
        read.seq.clone()
    };
    let target = index.extract_string(seed.read_id)?;

    let kmer = &query[seed.query_position..seed.query_position + k];
    let query_unique = !has_secondary_occurrence(&query, kmer, seed.query_position);
    let target_first = first_occurrence(&target, kmer);
    let target_unique =
        target_first.map_or(false, |pos| !has_secondary_occurrence(&target, kmer, pos));

    let overlap = if query_unique && target_unique {
        let target_position = target_first.unwrap();
        trace!(
            "read {} seed at {} against {} is unique in both reads, banded extension",
            read.id, seed.query_position, seed.read_id
        );
        overlap_svc.extend_match(&query, &target, seed.query_position, target_position, BAND_WIDTH)?
    } else {
        trace!(
            "read {} seed at {} against {} recurs in at least one read, full DP",
            read.id, seed.query_position, seed.read_id
        );
        overlap_svc.compute_overlap(&query, &target)?
    };

    if overlap.length >= min_overlap && overlap.identity_fraction() >= min_identity {
        Ok(Some(AcceptedOverlap {
            read_id: seed.read_id,
            is_reverse: seed.is_reverse,
            overlap,
        }))
    } else {
        Ok(None)
    }
}

/// Refine every seed, keeping only accepted overlaps.
pub fn refine_seeds(
    index: &dyn FmIndex,
    overlap_svc: &dyn OverlapService,
    read: &Read,
    seeds: &[Seed],
    k: usize,
    min_overlap: usize,
    min_identity: f32,
) -> Result<Vec<AcceptedOverlap>> {
    let mut accepted = Vec::with_capacity(seeds.len());
    for seed in seeds {
        if let Some(o) = refine_seed(index, overlap_svc, read, seed, k, min_overlap, min_identity)? {
            accepted.push(o);
        }
    }
    Ok(accepted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CorrectError;
    use crate::service::Interval;

    struct StubIndex {
        targets: Vec<Vec<u8>>,
    }

    impl FmIndex for StubIndex {
        fn find_interval(&self, _kmer: &[u8]) -> Result<Option<Interval>> {
            unimplemented!()
        }
        fn count(&self, _kmer: &[u8]) -> Result<usize> {
            unimplemented!()
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
        fn extract_string(&self, read_id: usize) -> Result<Vec<u8>> {
            self.targets
                .get(read_id)
                .cloned()
                .ok_or_else(|| CorrectError::FmIndexError(format!("no read {}", read_id)))
        }
        fn len(&self) -> usize {
            0
        }
    }

    struct StubOverlapService {
        banded: Overlap,
        full: Overlap,
    }

    impl OverlapService for StubOverlapService {
        fn overlap_read(&self, _read: &Read, _min_overlap: usize) -> Result<Vec<crate::service::OverlapBlock>> {
            unimplemented!()
        }
        fn compute_overlap(&self, _a: &[u8], _b: &[u8]) -> Result<Overlap> {
            Ok(self.full)
        }
        fn extend_match(
            &self,
            _a: &[u8],
            _b: &[u8],
            _pos_a: usize,
            _pos_b: usize,
            _band: usize,
        ) -> Result<Overlap> {
            Ok(self.banded)
        }
    }

    fn make_seed(query_position: usize) -> Seed {
        Seed {
            query_position,
            read_id: 0,
            is_reverse: false,
        }
    }

    #[test]
    fn unique_kmer_in_both_reads_uses_banded_extension() {
        // "ACGTA" occurs exactly once in each sequence.
        let index = StubIndex {
            targets: vec![b"TTTTTACGTATTTTT".to_vec()],
        };
        let overlap_svc = StubOverlapService {
            banded: Overlap {
                length: 50,
                percent_identity: 99.0,
                query_start: 0,
                target_start: 0,
            },
            full: Overlap {
                length: 10,
                percent_identity: 50.0,
                query_start: 0,
                target_start: 0,
            },
        };
        let read = Read::new("r0", b"GGGGGACGTAGGGGG".to_vec(), None, 0);
        let seed = make_seed(5);

        let result = refine_seed(&index, &overlap_svc, &read, &seed, 5, 45, 0.95)
            .unwrap()
            .unwrap();
        assert_eq!(result.overlap.length, 50);
    }

    #[test]
    fn kmer_recurring_in_target_uses_full_dp() {
        // "ACGTA" occurs twice in the target: the anchor is unreliable.
        let index = StubIndex {
            targets: vec![b"ACGTATTTTTACGTA".to_vec()],
        };
        let overlap_svc = StubOverlapService {
            banded: Overlap {
                length: 10,
                percent_identity: 50.0,
                query_start: 0,
                target_start: 0,
            },
            full: Overlap {
                length: 50,
                percent_identity: 99.0,
                query_start: 0,
                target_start: 0,
            },
        };
        let read = Read::new("r0", b"GGGGGACGTAGGGGG".to_vec(), None, 0);
        let seed = make_seed(5);

        let result = refine_seed(&index, &overlap_svc, &read, &seed, 5, 45, 0.95)
            .unwrap()
            .unwrap();
        assert_eq!(result.overlap.length, 50);
    }

    #[test]
    fn kmer_recurring_in_query_uses_full_dp() {
        let index = StubIndex {
            targets: vec![b"TTTTTACGTATTTTT".to_vec()],
        };
        let overlap_svc = StubOverlapService {
            banded: Overlap {
                length: 10,
                percent_identity: 50.0,
                query_start: 0,
                target_start: 0,
            },
            full: Overlap {
                length: 50,
                percent_identity: 99.0,
                query_start: 0,
                target_start: 0,
            },
        };
        // "ACGTA" occurs twice in the query.
        let read = Read::new("r0", b"ACGTATTTTTACGTA".to_vec(), None, 0);
        let seed = make_seed(0);

        let result = refine_seed(&index, &overlap_svc, &read, &seed, 5, 45, 0.95)
            .unwrap()
            .unwrap();
        assert_eq!(result.overlap.length, 50);
    }

    #[test]
    fn rejects_overlap_below_min_identity() {
        let index = StubIndex {
            targets: vec![b"TTTTTACGTATTTTT".to_vec()],
        };
        let overlap_svc = StubOverlapService {
            banded: Overlap {
                length: 50,
                percent_identity: 80.0,
                query_start: 0,
                target_start: 0,
            },
            full: Overlap {
                length: 50,
                percent_identity: 80.0,
                query_start: 0,
                target_start: 0,
            },
        };
        let read = Read::new("r0", b"GGGGGACGTAGGGGG".to_vec(), None, 0);
        let seed = make_seed(5);

        let result = refine_seed(&index, &overlap_svc, &read, &seed, 5, 45, 0.95).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn rejects_overlap_below_min_overlap() {
        let index = StubIndex {
            targets: vec![b"TTTTTACGTATTTTT".to_vec()],
        };
        let overlap_svc = StubOverlapService {
            banded: Overlap {
                length: 20,
                percent_identity: 99.0,
                query_start: 0,
                target_start: 0,
            },
            full: Overlap {
                length: 20,
                percent_identity: 99.0,
                query_start: 0,
                target_start: 0,
            },
        };
        let read = Read::new("r0", b"GGGGGACGTAGGGGG".to_vec(), None, 0);
        let seed = make_seed(5);

        let result = refine_seed(&index, &overlap_svc, &read, &seed, 5, 45, 0.95).unwrap();
        assert!(result.is_none());
    }
}
