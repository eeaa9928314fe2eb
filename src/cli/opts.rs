use anyhow::{bail, Context, Result};
use clap::{value_parser, Args};
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct IoArgs {
    /// FASTA read store [path]
    #[clap(
        short = 'S',
        long,
        value_parser,
        required = true,
        help_heading = "Core"
    )]
    pub store: PathBuf,

    /// Output overlap file [path]
    #[clap(
        short = 'o',
        long,
        value_parser,
        required = true,
        help_heading = "Core"
    )]
    pub output: PathBuf,

    /// Statistics file; written to stderr when omitted [path]
    #[clap(short = 's', long, value_parser, help_heading = "Core")]
    pub stats: Option<PathBuf>,

    /// Number of worker threads (increases RAM usage) [integer]
    #[clap(short = 't', long, default_value = "1", help_heading = "Core")]
    pub n_threads: usize,
}

#[derive(Debug, Args)]
pub struct IndexArgs {
    /// K-mer length for seeding; 2k must be below 64 [integer]
    #[clap(short = 'k', long, required = true, value_parser = value_parser!(u8).range(1..32), help_heading="Hash Index")]
    pub kmer_size: u8,

    /// Bits of the primary hash mask (table has 2^bits buckets) [integer]
    #[clap(long, default_value = "22", value_parser = value_parser!(u8).range(4..31), help_heading="Hash Index")]
    pub hash_bits: u8,

    /// Maximum hash table load factor [fraction]
    #[clap(long, default_value = "0.6", help_heading = "Hash Index")]
    pub hash_load: f64,

    /// Maximum bases loaded into one hash batch [integer]
    #[clap(long, default_value = "100000000", help_heading = "Hash Index")]
    pub hash_data_len: usize,

    /// File of frequent k-mers to screen from seeding, one per line [path]
    #[clap(long, value_parser, help_heading = "Hash Index")]
    pub skip_file: Option<PathBuf>,

    /// Screen k-mers occurring at least this often in a batch [integer]
    #[clap(short = 'K', long, value_parser = value_parser!(u16).range(2..), help_heading="Hash Index")]
    pub kmer_hit_limit: Option<u16>,
}

#[derive(Debug, Args)]
pub struct OverlapArgs {
    /// Maximum error fraction of a reported overlap [fraction]
    #[clap(short = 'e', long, default_value = "0.06", help_heading = "Overlaps")]
    pub error_rate: f64,

    /// Minimum overlap length [integer]
    #[clap(long, default_value = "40", help_heading = "Overlaps")]
    pub min_olap_len: usize,

    /// Report overlaps that reach neither read end [flag]
    #[clap(short = 'G', long, help_heading = "Overlaps")]
    pub partial: bool,

    /// Maximum overlaps per reference read end, per strand [integer]
    #[clap(short = 'l', long, help_heading = "Overlaps")]
    pub frag_olap_limit: Option<u64>,

    /// Allow multiple overlaps per oriented read pair [flag]
    #[clap(short = 'm', long, help_heading = "Overlaps")]
    pub multiple_olaps: bool,

    /// Skip seed bundles smaller than expected at the error rate [flag]
    #[clap(long, help_heading = "Overlaps")]
    pub min_kmer_filter: bool,

    /// Disable the hopeless-seed check [flag]
    ///
    /// Also disabled automatically above 6% error.
    #[clap(short = 'z', long, help_heading = "Overlaps")]
    pub no_hopeless_check: bool,

    /// Emit alignment delta arrays in full-mode records [flag]
    #[clap(long, help_heading = "Overlaps")]
    pub deltas: bool,
}

#[derive(Debug, Args)]
pub struct RangeArgs {
    /// Read ids to load into the hash table, e.g. '1-200000' [range]
    #[clap(long, help_heading = "Read Ranges")]
    pub hash_range: Option<String>,

    /// Read ids to stream as references, e.g. '1-500000' [range]
    #[clap(long, help_heading = "Read Ranges")]
    pub ref_range: Option<String>,
}

/// Parse an id range written as 'lo-hi' or a single id.
pub fn parse_range(s: &str) -> Result<(u32, u32)> {
    let (lo, hi) = match s.split_once('-') {
        Some((a, b)) => (
            a.trim().parse().context(format!("bad range start in '{s}'"))?,
            b.trim().parse().context(format!("bad range end in '{s}'"))?,
        ),
        None => {
            let v: u32 = s.trim().parse().context(format!("bad read id '{s}'"))?;
            (v, v)
        }
    };
    if lo < 1 || lo > hi {
        bail!("conflicting read range '{s}'");
    }
    Ok((lo, hi))
}
