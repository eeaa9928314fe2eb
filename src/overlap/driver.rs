use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::cli::counters::OverlapCounters;
use crate::overlap::index::HashIndex;
use crate::overlap::kmer::{self, HashParams};
use crate::overlap::output::{self, OverlapWriter};
use crate::overlap::seeds::{self, WorkArea};
use crate::overlap::store::ReadStore;
use crate::overlap::{Config, Direction};

/// Scan one slab of reference reads against the current index, both
/// strands per read, flushing buffered overlaps at slab end.
#[allow(clippy::too_many_arguments)]
fn process_slab(
    cfg: &Config,
    params: &HashParams,
    store: &dyn ReadStore,
    index: &HashIndex,
    wa: &mut WorkArea,
    bgn_id: u32,
    end_id: u32,
    out: &Mutex<OverlapWriter>,
    stop: &AtomicBool,
) -> Result<OverlapCounters> {
    let mut buf: Vec<u8> = Vec::new();

    for id in bgn_id..=end_id {
        if stop.load(Ordering::Relaxed) {
            break;
        }

        let len = store.length(id) as usize;
        if len < cfg.min_olap_len {
            continue;
        }

        store.bases(id, &mut buf);
        for b in buf.iter_mut() {
            *b = b.to_ascii_lowercase();
        }

        seeds::find_overlaps(&buf, id, Direction::Forward, cfg, params, index, wa, out)?;

        kmer::reverse_complement(&mut buf);

        seeds::find_overlaps(&buf, id, Direction::Reverse, cfg, params, index, wa, out)?;
    }

    output::flush_overlaps(out, &mut wa.overlaps)?;

    Ok(std::mem::take(&mut wa.counters))
}

/// Run the full engine: iterate hash-table batches over the hash range and
/// stream the reference range against each batch with the worker pool.
/// Returns the folded statistics counters.
pub fn run_overlaps(
    cfg: &Config,
    store: &dyn ReadStore,
    out: &Mutex<OverlapWriter>,
) -> Result<OverlapCounters> {
    let params = cfg.hash_params()?;

    let bgn_hash = cfg.bgn_hash_id.max(1);
    let end_hash = cfg.end_hash_id.min(store.last_id());
    let bgn_ref = cfg.bgn_ref_id.max(1);
    let end_ref = cfg.end_ref_id.min(store.last_id());

    if bgn_hash > end_hash {
        bail!("empty hash read range {bgn_hash}-{end_hash}");
    }
    if bgn_ref > end_ref {
        bail!("empty reference read range {bgn_ref}-{end_ref}");
    }

    let stop = AtomicBool::new(false);
    let mut totals = OverlapCounters::default();

    let mut bgn = bgn_hash;
    while bgn <= end_hash {
        let (index, next) = HashIndex::build(cfg, params, store, bgn, end_hash)?;

        if next == bgn {
            bail!("hash table filled without making progress at read {bgn}");
        }

        println!(
            "Batch: hash reads {}-{} ({} entries, {} too short), references {}-{}",
            bgn,
            next - 1,
            index.hash_entries(),
            index.skipped_short,
            bgn_ref,
            end_ref
        );

        // Many more slabs than workers so rayon can balance the load.
        let per_slab = 1 + (end_ref - bgn_ref) as usize / cfg.num_threads / 8;
        let mut slabs: Vec<(u32, u32)> = Vec::new();
        let mut lo = bgn_ref;
        while lo <= end_ref {
            let hi = end_ref.min(lo + per_slab as u32 - 1);
            slabs.push((lo, hi));
            lo = hi + 1;
        }

        let pb = ProgressBar::new(slabs.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("       {bar:40} {pos}/{len} [{elapsed_precise}] {msg}")
                .unwrap(),
        );

        let batch: Vec<OverlapCounters> = slabs
            .par_iter()
            .map_init(
                || WorkArea::new(cfg),
                |wa, &(lo, hi)| {
                    let r = process_slab(cfg, &params, store, &index, wa, lo, hi, out, &stop);
                    if r.is_err() {
                        stop.store(true, Ordering::Relaxed);
                    }
                    pb.inc(1);
                    r
                },
            )
            .collect::<Result<_>>()?; // short-circuits on the first Err

        pb.finish_and_clear();

        for c in batch {
            totals += c;
        }

        bgn = next;
    }

    Ok(totals)
}
