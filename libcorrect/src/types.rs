//! Core data types shared across the correction algorithms.

/// A single sequencing read.
///
/// Sequences are immutable once constructed; every corrector returns a fresh
/// `String` rather than mutating `seq` in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Read {
    /// The read identifier, as reported by the upstream FASTA/FASTQ source.
    pub id: String,
    /// The DNA sequence, over the alphabet `{A, C, G, T, N}`.
    pub seq: Vec<u8>,
    /// Per-base phred-encoded quality, one byte per base in `seq`. `None` when the
    /// source format carries no quality information.
    pub qual: Option<Vec<u8>>,
    /// The read's position in the source collection. Used to suppress self-overlap
    /// during seed enumeration (§4.4) and as the `read_id` the FM-index resolves to.
    pub idx: usize,
}

impl Read {
    /// Construct a new read. Panics if `qual` is `Some` and its length does not match `seq`.
    pub fn new(id: impl Into<String>, seq: impl Into<Vec<u8>>, qual: Option<Vec<u8>>, idx: usize) -> Self {
        let seq = seq.into();
        if let Some(q) = &qual {
            assert_eq!(
                q.len(),
                seq.len(),
                "quality string length must match sequence length"
            );
        }
        Self {
            id: id.into(),
            seq,
            qual,
            idx,
        }
    }

    /// Phred quality at position `i`, or `b'I'` (phred 40) when the read carries no
    /// quality string - a neutral "trust the base" default used by the reference
    /// implementation when a caller hands in unscored reads.
    pub fn phred_at(&self, i: usize) -> u8 {
        match &self.qual {
            Some(q) => q[i],
            None => b'I',
        }
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }
}

/// Which correction algorithm the dispatcher (C9) should run for a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
    /// k-mer correction only (§4.3).
    Kmer,
    /// Index-driven overlap correction only (§4.7).
    #[default]
    Overlap,
    /// k-mer first, falling back to legacy overlap correction on QC failure (§4.9).
    Hybrid,
}

/// Immutable, per-run correction parameters. Cheap to clone so each worker can own its
/// copy (§5).
#[derive(Debug, Clone)]
pub struct CorrectionParams {
    pub algorithm: Algorithm,
    pub kmer_length: usize,
    pub num_kmer_rounds: usize,
    pub num_overlap_rounds: usize,
    pub min_overlap: usize,
    pub min_identity: f32,
    pub conflict_cutoff: f32,
    pub depth_filter: usize,
    pub print_overlaps: bool,
}

impl CorrectionParams {
    /// Construct new parameters, enforcing the structural precondition `kmer_length >= 1`
    /// (§7: a violation here is a programmer error and is fatal).
    pub fn new(algorithm: Algorithm, kmer_length: usize) -> Self {
        assert!(kmer_length >= 1, "kmer_length must be >= 1");
        Self {
            algorithm,
            kmer_length,
            num_kmer_rounds: 10,
            num_overlap_rounds: 3,
            min_overlap: 45,
            min_identity: 0.95,
            conflict_cutoff: 0.15,
            depth_filter: 10_000,
            print_overlaps: false,
        }
    }

    pub fn with_num_kmer_rounds(mut self, n: usize) -> Self {
        self.num_kmer_rounds = n;
        self
    }

    pub fn with_num_overlap_rounds(mut self, n: usize) -> Self {
        self.num_overlap_rounds = n;
        self
    }

    pub fn with_min_overlap(mut self, n: usize) -> Self {
        self.min_overlap = n;
        self
    }

    pub fn with_min_identity(mut self, v: f32) -> Self {
        assert!((0.0..=1.0).contains(&v), "min_identity must be in [0, 1]");
        self.min_identity = v;
        self
    }

    pub fn with_conflict_cutoff(mut self, v: f32) -> Self {
        self.conflict_cutoff = v;
        self
    }

    pub fn with_depth_filter(mut self, n: usize) -> Self {
        self.depth_filter = n;
        self
    }

    pub fn with_print_overlaps(mut self, yes: bool) -> Self {
        self.print_overlaps = yes;
        self
    }
}

/// The outcome of correcting a single read.
///
/// At most one of `kmer_qc`/`overlap_qc` is ever `true`; if both are `false` the read
/// is a QC failure (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectionResult {
    pub corrected_seq: Vec<u8>,
    pub kmer_qc: bool,
    pub overlap_qc: bool,
    pub num_prefix_overlaps: usize,
    pub num_suffix_overlaps: usize,
}

impl CorrectionResult {
    pub fn passed(&self) -> bool {
        self.kmer_qc || self.overlap_qc
    }
}

/// Reverse complement over the `{A, C, G, T, N}` alphabet. Any other byte is passed
/// through unchanged, mirroring how the reference FM-index treats ambiguity codes.
pub fn revcomp(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|&b| match b {
            b'A' => b'T',
            b'C' => b'G',
            b'G' => b'C',
            b'T' => b'A',
            b'a' => b't',
            b'c' => b'g',
            b'g' => b'c',
            b't' => b'a',
            other => other,
        })
        .collect()
}
