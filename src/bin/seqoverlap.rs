use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use seqoverlap::cli::counters::OverlapCounters;
use seqoverlap::cli::opts::{parse_range, IndexArgs, IoArgs, OverlapArgs, RangeArgs};
use seqoverlap::overlap::driver::run_overlaps;
use seqoverlap::overlap::output::OverlapWriter;
use seqoverlap::overlap::store::FastaStore;
use seqoverlap::overlap::Config;
use std::fs::File;
use std::io::Write;
use std::sync::Mutex;
use std::time::Instant;

/// Command-line options for the overlap engine
#[derive(Parser)]
#[command(
    name = "seqoverlap",
    about = "Compute pairwise overlaps between DNA reads",
    long_about = "Compute all pairwise approximate-match overlaps between DNA reads.

Reads are loaded into hash-table batches and every reference read is
streamed against each batch in both orientations.

EXAMPLES:
    $ seqoverlap -S reads.fasta -o reads.olaps -k 18 -t 8
    $ seqoverlap -S reads.fasta -o reads.olaps -k 14 --partial --error-rate 0.04
    ",
    version = "0.1.0"
)]
struct Cli {
    #[command(flatten)]
    io: IoArgs,

    #[command(flatten)]
    index: IndexArgs,

    #[command(flatten)]
    overlaps: OverlapArgs,

    #[command(flatten)]
    ranges: RangeArgs,
}

impl Cli {
    /// Validate the options and resolve them into an engine configuration.
    fn resolve_config(&self) -> Result<Config> {
        let k = self.index.kmer_size as usize;
        let erate = self.overlaps.error_rate;

        if !(erate > 0.0 && erate <= 0.5) {
            bail!("error rate {erate} out of range; need 0 < rate <= 0.5");
        }
        if self.overlaps.min_olap_len < k {
            bail!(
                "minimum overlap length {} is below the k-mer length {k}",
                self.overlaps.min_olap_len
            );
        }
        if !(self.index.hash_load > 0.0 && self.index.hash_load < 1.0) {
            bail!("hash load {} out of range; need 0 < load < 1", self.index.hash_load);
        }
        if self.io.n_threads == 0 {
            bail!("need at least one worker thread");
        }
        if self.overlaps.partial && self.overlaps.min_kmer_filter && erate > 0.06 {
            bail!("partial overlaps with the seed-count filter are unsupported above 6% error");
        }

        let (bgn_hash_id, end_hash_id) = match &self.ranges.hash_range {
            Some(s) => parse_range(s)?,
            None => (1, u32::MAX),
        };
        let (bgn_ref_id, end_ref_id) = match &self.ranges.ref_range {
            Some(s) => parse_range(s)?,
            None => (1, u32::MAX),
        };

        let filter_by_kmer_count = if self.overlaps.min_kmer_filter {
            ((-(k as f64) * erate).exp() * (self.overlaps.min_olap_len - k + 1) as f64).floor()
                as u64
        } else {
            0
        };

        let frag_olap_limit = match self.overlaps.frag_olap_limit {
            Some(n) if n >= 1 => n,
            _ => u64::MAX,
        };

        let cfg = Config {
            max_erate: erate,
            partial_overlaps: self.overlaps.partial,
            bgn_hash_id,
            end_hash_id,
            bgn_ref_id,
            end_ref_id,
            kmer_len: k,
            skip_file: self.index.skip_file.clone(),
            filter_by_kmer_count,
            frag_olap_limit,
            unique_olap_per_pair: !self.overlaps.multiple_olaps,
            hash_mask_bits: self.index.hash_bits as u32,
            max_hash_data_len: self.index.hash_data_len,
            max_hash_load: self.index.hash_load,
            kmer_hit_limit: self.index.kmer_hit_limit,
            num_threads: self.io.n_threads,
            min_olap_len: self.overlaps.min_olap_len,
            use_hopeless_check: !self.overlaps.no_hopeless_check && erate <= 0.06,
            emit_deltas: self.overlaps.deltas,
        };

        // Fails early on bad k-mer length / hash bits combinations.
        cfg.hash_params()?;

        Ok(cfg)
    }
}

fn write_stats(counters: &OverlapCounters, out: &mut dyn Write) -> Result<()> {
    writeln!(out, " Kmer hits without olaps = {}", counters.kmer_hits_without_olap)?;
    writeln!(out, "    Kmer hits with olaps = {}", counters.kmer_hits_with_olap)?;
    writeln!(out, "  Kmer hits below filter = {}", counters.kmer_hits_skipped)?;
    writeln!(out, "  Multiple overlaps/pair = {}", counters.multi_overlap)?;
    writeln!(out, " Total overlaps produced = {}", counters.total_overlaps)?;
    writeln!(out, "      Contained overlaps = {}", counters.contained)?;
    writeln!(out, "       Dovetail overlaps = {}", counters.dovetail)?;
    writeln!(out, "Rejected by short window = {}", counters.bad_short_window)?;
    writeln!(out, " Rejected by long window = {}", counters.bad_long_window)?;
    Ok(())
}

fn main() {
    // Catch and handle errors so the exit status is meaningful
    if let Err(e) = run() {
        eprintln!("{:?}", e);
        std::process::exit(1);
    }
    std::process::exit(0);
}

fn run() -> Result<()> {
    let start_time = Instant::now();
    let opt = Cli::parse();
    let cfg = opt.resolve_config()?;

    // Configure global thread-pool size
    rayon::ThreadPoolBuilder::new()
        .num_threads(cfg.num_threads)
        .build_global()
        .context("building Rayon thread pool")?;

    println!("Start: Loading read store");
    let store = FastaStore::open(&opt.io.store)?;

    let out = Mutex::new(OverlapWriter::create(&opt.io.output)?);

    println!("Start: Computing overlaps");
    let counters = run_overlaps(&cfg, &store, &out)?;

    out.lock()
        .map_err(|_| anyhow!("overlap writer mutex poisoned"))?
        .finish()?;

    // Summary statistics, to the stats file when given
    if let Some(path) = &opt.io.stats {
        let mut f =
            File::create(path).context(format!("creating statistics file {:?}", path))?;
        write_stats(&counters, &mut f)?;
    } else {
        write_stats(&counters, &mut std::io::stderr())?;
    }

    let elapsed = start_time.elapsed();
    println!("Elapsed time: {:.2?}", elapsed);
    Ok(())
}
