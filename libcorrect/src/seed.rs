//! Seed enumeration (C4): turns a read into a deduplicated set of `(read_id, strand)`
//! seeds by sweeping FM-index intervals over the read's k-mers, then collapsing each
//! interval's rows to the read ids they originate from via LF-mapping backtrack.

use std::collections::HashMap;

use log::trace;

use crate::error::Result;
use crate::service::{occ_before, FmIndex, SuffixArraySample};
use crate::types::{revcomp, Read};

/// Intervals wider than this are not expanded: the overlap is shared by too many reads to
/// be informative, and walking every row would dominate runtime on repetitive regions.
/// Strict: an interval of exactly this size is still excluded (§8).
pub const MAX_INTERVAL_SIZE: usize = 500;

/// A candidate overlap target discovered by seed enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seed {
    /// Position in the query (post-orientation) of the k-mer whose interval produced
    /// this seed. Metadata only - identity is `(read_id, is_reverse)`.
    pub query_position: usize,
    /// The candidate read's id, as resolved by [`SuffixArraySample::lookup_lex_rank`].
    pub read_id: usize,
    /// Whether this seed was found against the query's reverse complement.
    pub is_reverse: bool,
}

/// Any byte outside the DNA alphabet is the BWT's string-separator sentinel. Hosts are
/// free to pick any such byte (the reference implementation in [`crate::refindex`] uses
/// `0u8`); seed enumeration only needs to recognize that it isn't a base.
fn is_sentinel(b: u8) -> bool {
    !matches!(b, b'A' | b'C' | b'G' | b'T' | b'N')
}

/// One premap entry: the query position whose k-mer interval first reached this BWT row,
/// and whether the LF-backtrack has already walked through it.
struct PremapEntry {
    query_position: usize,
    visited: bool,
}

/// Enumerate seeds for `read` against the collection, skipping hits back onto `read`
/// itself (identified by `read.idx`). Every k-mer of length `k` is swept in both the
/// forward and reverse-complement orientations.
pub fn enumerate_seeds(
    index: &dyn FmIndex,
    sa: &dyn SuffixArraySample,
    read: &Read,
    k: usize,
) -> Result<Vec<Seed>> {
    let mut seeds = Vec::new();
    for &is_reverse in &[false, true] {
        let seq = if is_reverse {
            revcomp(&read.seq)
        } else {
            read.seq.clone()
        };
        enumerate_orientation(index, sa, read.idx, &seq, k, is_reverse, &mut seeds)?;
    }
    Ok(seeds)
}

fn enumerate_orientation(
    index: &dyn FmIndex,
    sa: &dyn SuffixArraySample,
    self_idx: usize,
    seq: &[u8],
    k: usize,
    is_reverse: bool,
    seeds: &mut Vec<Seed>,
) -> Result<()> {
    if k == 0 || seq.len() < k {
        return Ok(());
    }
    let nk = seq.len() - k + 1;

    // Step 1: interval sweep. Every row reachable from a non-oversized k-mer interval is
    // inserted into the premap, keyed by BWT row - the premap doubles as the
    // LF-backtrack's visited set.
    let mut premap: HashMap<usize, PremapEntry> = HashMap::new();
    for i in 0..nk {
        let kmer = &seq[i..i + k];
        let Some(iv) = index.find_interval(kmer)? else {
            continue;
        };
        if iv.size() >= MAX_INTERVAL_SIZE {
            trace!(
                "k-mer interval of size {} at query_position {} meets/exceeds MAX_INTERVAL_SIZE, skipping",
                iv.size(),
                i
            );
            continue;
        }
        for row in iv.lower..=iv.upper {
            premap.entry(row).or_insert(PremapEntry {
                query_position: i,
                visited: false,
            });
        }
    }

    // Step 2: LF-backtrack. Walk each unvisited entry back through the BWT until either a
    // previously-walked entry subsumes the rest of the path, or the sentinel resolves the
    // walk to an originating read.
    let starts: Vec<usize> = premap.keys().copied().collect();
    for start in starts {
        if premap.get(&start).map_or(true, |e| e.visited) {
            continue;
        }
        let query_position = premap.get(&start).unwrap().query_position;
        premap.get_mut(&start).unwrap().visited = true;

        let mut row = start;
        loop {
            let b = index.bwt_char(row)?;
            if is_sentinel(b) {
                let read_id = sa.lookup_lex_rank(row)?;
                if read_id != self_idx {
                    seeds.push(Seed {
                        query_position,
                        read_id,
                        is_reverse,
                    });
                }
                break;
            }

            row = index.c(b)? + occ_before(index, b, row)?;

            if let Some(entry) = premap.get_mut(&row) {
                if entry.visited {
                    // A previously-processed walk already covers the rest of this path.
                    break;
                }
                entry.visited = true;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    /// A brute-force FM-index substitute backed by a literal list of sequences, used only
    /// to exercise the seed-enumeration logic against known overlaps.
    struct NaiveIndex {
        rows: Vec<usize>,
        bwt: Vec<u8>,
        c_table: StdHashMap<u8, usize>,
    }

    const SENTINEL: u8 = 0u8;

    impl NaiveIndex {
        fn build(reads: &[&[u8]]) -> Self {
            let mut concatenated = Vec::new();
            let mut boundaries = Vec::new();
            for r in reads {
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

            let mut counts: StdHashMap<u8, usize> = StdHashMap::new();
            for &b in &concatenated {
                *counts.entry(b).or_insert(0) += 1;
            }
            let mut symbols: Vec<u8> = counts.keys().copied().collect();
            symbols.sort();
            let mut c_table = StdHashMap::new();
            let mut running = 0;
            for s in symbols {
                c_table.insert(s, running);
                running += counts[&s];
            }

            let rows: Vec<usize> = sa
                .iter()
                .map(|&start| boundaries.iter().position(|&b| start < b).unwrap())
                .collect();

            Self { rows, bwt, c_table }
        }

        fn occ_naive(&self, base: u8, index: usize) -> usize {
            self.bwt[..=index].iter().filter(|&&b| b == base).count()
        }
    }

    impl FmIndex for NaiveIndex {
        fn find_interval(&self, kmer: &[u8]) -> Result<Option<crate::service::Interval>> {
            if kmer.is_empty() {
                return Ok(None);
            }
            let mut interval = init_interval(self, kmer[kmer.len() - 1])?;
            for &base in kmer.iter().rev().skip(1) {
                interval = match interval {
                    Some(iv) => extend_interval(self, iv, base)?,
                    None => return Ok(None),
                };
            }
            Ok(interval)
        }
        fn count(&self, kmer: &[u8]) -> Result<usize> {
            Ok(self.find_interval(kmer)?.map_or(0, |iv| iv.size()))
        }
        fn bwt_char(&self, index: usize) -> Result<u8> {
            Ok(self.bwt[index])
        }
        fn c(&self, base: u8) -> Result<usize> {
            Ok(*self.c_table.get(&base).unwrap_or(&self.bwt.len()))
        }
        fn occ(&self, base: u8, index: usize) -> Result<usize> {
            Ok(self.occ_naive(base, index))
        }
        fn extract_string(&self, _read_id: usize) -> Result<Vec<u8>> {
            unimplemented!()
        }
        fn len(&self) -> usize {
            self.bwt.len()
        }
    }

    fn init_interval(index: &NaiveIndex, base: u8) -> Result<Option<crate::service::Interval>> {
        let lower = index.c(base)?;
        let total = index.occ(base, index.bwt.len() - 1)?;
        if total == 0 {
            return Ok(None);
        }
        Ok(Some(crate::service::Interval {
            lower,
            upper: lower + total - 1,
        }))
    }

    fn extend_interval(
        index: &NaiveIndex,
        iv: crate::service::Interval,
        base: u8,
    ) -> Result<Option<crate::service::Interval>> {
        let c = index.c(base)?;
        let before = occ_before(index, base, iv.lower)?;
        let within = index.occ(base, iv.upper)?;
        if within <= before {
            return Ok(None);
        }
        Ok(Some(crate::service::Interval {
            lower: c + before,
            upper: c + within - 1,
        }))
    }

    impl SuffixArraySample for NaiveIndex {
        fn lookup_lex_rank(&self, bwt_index: usize) -> Result<usize> {
            Ok(self.rows[bwt_index])
        }
    }

    #[test]
    fn finds_suffix_prefix_overlap() {
        // read 1's prefix is read 0's suffix: they share "TTTTTTTTTT".
        let r0: &[u8] = b"AAAAAAAAAATTTTTTTTTT";
        let r1: &[u8] = b"TTTTTTTTTTGGGGGGGGGG";
        let index = NaiveIndex::build(&[r0, r1]);

        let read0 = Read::new("r0", r0.to_vec(), None, 0);
        let seeds = enumerate_seeds(&index, &index, &read0, 5).unwrap();

        assert!(seeds.iter().any(|s| s.read_id == 1 && !s.is_reverse));
    }

    #[test]
    fn never_seeds_against_self() {
        let r0: &[u8] = b"AAAAAAAAAACCCCCCCCCC";
        let index = NaiveIndex::build(&[r0]);
        let read0 = Read::new("r0", r0.to_vec(), None, 0);

        let seeds = enumerate_seeds(&index, &index, &read0, 5).unwrap();
        assert!(seeds.iter().all(|s| s.read_id != 0));
    }

    #[test]
    fn no_seeds_when_no_kmer_is_shared() {
        let r0: &[u8] = b"AAAAAAAAAA";
        let r1: &[u8] = b"CCCCCCCCCC";
        let index = NaiveIndex::build(&[r0, r1]);
        let read0 = Read::new("r0", r0.to_vec(), None, 0);

        let seeds = enumerate_seeds(&index, &index, &read0, 5).unwrap();
        assert!(seeds.is_empty());
    }

    #[test]
    fn short_read_below_k_yields_no_seeds() {
        let r0: &[u8] = b"AAA";
        let index = NaiveIndex::build(&[r0]);
        let read0 = Read::new("r0", r0.to_vec(), None, 0);

        let seeds = enumerate_seeds(&index, &index, &read0, 5).unwrap();
        assert!(seeds.is_empty());
    }

    #[test]
    fn repeated_kmer_still_resolves_each_distinct_read_once() {
        // Three reads share the same 10-mer; the premap must dedupe so each is only
        // reported once despite many rows landing on the same LF-backtrack path.
        let shared: &[u8] = b"ACGTACGTAC";
        let r0 = [shared, b"AAAA"].concat();
        let r1 = [shared, b"CCCC"].concat();
        let r2 = [shared, b"GGGG"].concat();
        let index = NaiveIndex::build(&[&r0, &r1, &r2]);

        let read0 = Read::new("r0", r0.clone(), None, 0);
        let seeds = enumerate_seeds(&index, &index, &read0, 5).unwrap();

        let mut ids: Vec<usize> = seeds.iter().map(|s| s.read_id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert!(ids.contains(&1));
        assert!(ids.contains(&2));
        // No duplicate (read_id, is_reverse) pairs.
        let mut pairs: Vec<(usize, bool)> = seeds.iter().map(|s| (s.read_id, s.is_reverse)).collect();
        let before = pairs.len();
        pairs.sort_unstable();
        pairs.dedup();
        assert_eq!(pairs.len(), before);
    }
}
