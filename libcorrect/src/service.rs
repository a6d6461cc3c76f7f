//! Traits the core consumes from its host (§6): an FM-index over the read collection, a
//! sampled suffix array, a pairwise overlap/alignment service, and a quality-threshold
//! table. None of these are implemented here for production use - see
//! [`crate::refindex`] for a small, correct reference implementation used by the test
//! suite and the CLI harness.

use crate::error::Result;
use crate::types::Read;

/// An inclusive suffix-array interval `[lower, upper]`, as returned by
/// [`FmIndex::find_interval`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub lower: usize,
    pub upper: usize,
}

impl Interval {
    /// Number of suffix-array rows covered by this interval.
    pub fn size(&self) -> usize {
        self.upper - self.lower + 1
    }
}

/// The FM-index service (§6). All methods are fallible: a malformed or inconsistent
/// response from the host's index is a service error (§7), not a correction outcome.
pub trait FmIndex: Send + Sync {
    /// The suffix-array interval matching `kmer` exactly, or `None` if it does not occur.
    fn find_interval(&self, kmer: &[u8]) -> Result<Option<Interval>>;

    /// Occurrence count of `kmer` in the collection. Typically `upper - lower + 1` of
    /// [`find_interval`](FmIndex::find_interval), but kept as its own method since hosts
    /// may have a cheaper direct count query.
    fn count(&self, kmer: &[u8]) -> Result<usize>;

    /// The BWT character at `index`.
    fn bwt_char(&self, index: usize) -> Result<u8>;

    /// `C(base)`: the number of suffixes lexicographically smaller than `base`.
    fn c(&self, base: u8) -> Result<usize>;

    /// `Occ(base, index)`: the number of occurrences of `base` in `BWT[0..=index]`
    /// (inclusive). Callers needing the backward-search exclusive form `Occ(base, index
    /// - 1)` should use [`occ_before`].
    fn occ(&self, base: u8, index: usize) -> Result<usize>;

    /// The full sequence stored at `read_id`.
    fn extract_string(&self, read_id: usize) -> Result<Vec<u8>>;

    /// Number of rows in the underlying BWT/suffix array.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `Occ(base, index - 1)`, the exclusive-prefix form the LF-mapping backtrack (§4.4)
/// needs. `index == 0` has no predecessor row, so it is defined as `0`.
pub fn occ_before(index_svc: &dyn FmIndex, base: u8, index: usize) -> Result<usize> {
    if index == 0 {
        Ok(0)
    } else {
        index_svc.occ(base, index - 1)
    }
}

/// The sampled suffix array (§6): resolves a BWT row to the read id whose sentinel it
/// terminates at.
pub trait SuffixArraySample: Send + Sync {
    fn lookup_lex_rank(&self, bwt_index: usize) -> Result<usize>;
}

/// Two matching ranges - one in each read - of equal size, as produced by an overlap
/// enumeration (§6). SGA-style: `ranges.interval[0]` is the query's coordinate range,
/// `ranges.interval[1]` the target's.
#[derive(Debug, Clone, Copy)]
pub struct Ranges {
    pub interval: [Interval; 2],
}

/// Which end of the read the overlap covers - needed by the legacy corrector (§4.8) to
/// separate prefix overlaps (match at the read's start) from suffix overlaps (match at
/// the read's end).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapDirection {
    Prefix,
    Suffix,
}

/// One block returned by [`OverlapService::overlap_read`]: a read that overlaps the
/// query over `ranges`, in a given orientation and direction.
#[derive(Debug, Clone)]
pub struct OverlapBlock {
    pub read_id: usize,
    pub is_reverse: bool,
    pub direction: OverlapDirection,
    pub ranges: Ranges,
}

impl OverlapBlock {
    /// The size shared by both sides of `ranges` (SGA invariant: `ranges.interval[0]`
    /// and `ranges.interval[1]` always cover the same number of bases).
    pub fn overlap_len(&self) -> usize {
        debug_assert_eq!(
            self.ranges.interval[0].size(),
            self.ranges.interval[1].size()
        );
        self.ranges.interval[0].size()
    }
}

/// The result of aligning two sequences against each other. Alignments are ungapped: the
/// aligned region is `a[query_start..query_start+length]` against
/// `b[target_start..target_start+length]`, matching how a short-read overlapper scores
/// the high-identity, indel-free overlaps short reads are expected to share.
#[derive(Debug, Clone, Copy)]
pub struct Overlap {
    /// Length of the aligned region.
    pub length: usize,
    /// Percent identity over the aligned region, on `[0, 100]`.
    pub percent_identity: f32,
    /// Start offset of the aligned region in the query sequence.
    pub query_start: usize,
    /// Start offset of the aligned region in the target sequence.
    pub target_start: usize,
}

impl Overlap {
    /// `percent_identity` rescaled to `[0, 1]`, the unit the core compares against
    /// `CorrectionParams::min_identity` with.
    pub fn identity_fraction(&self) -> f32 {
        self.percent_identity / 100.0
    }
}

/// The pairwise overlap/alignment service (§6).
pub trait OverlapService: Send + Sync {
    /// All overlap blocks for `read` of at least `min_overlap` bases.
    fn overlap_read(&self, read: &Read, min_overlap: usize) -> Result<Vec<OverlapBlock>>;

    /// Full `O(mn)` dynamic-programming overlap of `a` against `b`.
    fn compute_overlap(&self, a: &[u8], b: &[u8]) -> Result<Overlap>;

    /// Banded extension of a seed match at `(pos_a, pos_b)` with the given band width.
    fn extend_match(&self, a: &[u8], b: &[u8], pos_a: usize, pos_b: usize, band: usize)
        -> Result<Overlap>;
}

/// The quality→support table (§4.1, C1): maps a phred score to the minimum k-mer count
/// required to call a k-mer solid.
pub trait QualityTable: Send + Sync {
    fn required_support(&self, phred: u8) -> usize;
}
