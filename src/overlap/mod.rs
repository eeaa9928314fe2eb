pub mod driver;
pub mod extend;
pub mod index;
pub mod kmer;
pub mod output;
pub mod process;
pub mod seeds;
pub mod store;

use std::path::PathBuf;

/// Entries per hash bucket; 21 keeps a bucket close to a cache line pair.
pub const ENTRIES_PER_BUCKET: usize = 21;

/// A seed this far or further from both read ends, with no screening
/// in between, is assumed hopeless to extend within the error budget.
pub const HOPELESS_MATCH: i32 = 90;

/// Most genuinely different overlaps between two reads in one orientation.
pub const MAX_DISTINCT_OLAPS: usize = 3;

/// Minimum intersection (bases) for two alignments to be merged into one.
pub const MIN_INTERSECTION: i32 = 10;

/// Slack (bases) allowed when deciding a seed lies on an alignment.
pub const SHIFT_SLACK: i32 = 1;

/// Positions skipped between successive indexed k-mers. 0 indexes every k-mer.
pub const HASH_KMER_SKIP: usize = 0;

/// Per-worker output buffer, flushed to the shared writer when full.
pub const OUTPUT_BUFFER_LEN: usize = 64 * 1024;

/// Strand of the reference read being scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

/// Engine parameters, resolved once from the command line.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum acceptable error fraction of an overlap.
    pub max_erate: f64,
    /// Report extensions that reach neither read end.
    pub partial_overlaps: bool,

    pub bgn_hash_id: u32,
    pub end_hash_id: u32,
    pub bgn_ref_id: u32,
    pub end_ref_id: u32,

    pub kmer_len: usize,
    pub skip_file: Option<PathBuf>,
    /// 0 disables the binomial seed-count filter.
    pub filter_by_kmer_count: u64,

    /// Per strand/end cap on overlaps for one reference read.
    pub frag_olap_limit: u64,
    /// At most one overlap per oriented read pair.
    pub unique_olap_per_pair: bool,

    pub hash_mask_bits: u32,
    pub max_hash_data_len: usize,
    pub max_hash_load: f64,
    /// K-mers seen at least this often in a batch cannot initiate overlaps.
    pub kmer_hit_limit: Option<u16>,

    pub num_threads: usize,
    pub min_olap_len: usize,
    pub use_hopeless_check: bool,
    pub emit_deltas: bool,
}

impl Config {
    pub fn hash_params(&self) -> anyhow::Result<kmer::HashParams> {
        kmer::HashParams::new(self.kmer_len, self.hash_mask_bits)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_erate: 0.06,
            partial_overlaps: false,
            bgn_hash_id: 1,
            end_hash_id: u32::MAX,
            bgn_ref_id: 1,
            end_ref_id: u32::MAX,
            kmer_len: 0,
            skip_file: None,
            filter_by_kmer_count: 0,
            frag_olap_limit: u64::MAX,
            unique_olap_per_pair: true,
            hash_mask_bits: 22,
            max_hash_data_len: 100_000_000,
            max_hash_load: 0.6,
            kmer_hit_limit: None,
            num_threads: 1,
            min_olap_len: 40,
            use_hopeless_check: true,
            emit_deltas: false,
        }
    }
}
