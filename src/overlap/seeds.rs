use anyhow::Result;
use fxhash::FxHashMap;
use smallvec::SmallVec;
use std::sync::Mutex;

use crate::cli::counters::OverlapCounters;
use crate::overlap::extend::EditDist;
use crate::overlap::index::{HashIndex, KmerRef};
use crate::overlap::kmer::{self, HashParams};
use crate::overlap::output::OverlapWriter;
use crate::overlap::process::{self, OlapInfo};
use crate::overlap::{Config, Direction, HASH_KMER_SKIP, HOPELESS_MATCH, MAX_DISTINCT_OLAPS};

/// One maximal run of merged exact k-mer matches against a single target.
#[derive(Debug, Clone, Copy)]
pub struct MatchNode {
    /// Start of the run in the target (hash-table) read.
    pub offset: i32,
    /// Length of the run.
    pub len: i32,
    /// Start of the run in the reference read.
    pub start: i32,
    /// Arena subscript of the next node; 0 ends the list.
    pub next: i32,
}

/// Seed bundle for one target read during one strand scan.
#[derive(Debug, Clone, Copy)]
pub struct Bundle {
    /// Head of this target's match-node list.
    pub match_list: i32,
    /// Sum of seed diagonals; averaged before ranking.
    pub diag_sum: f64,
    pub diag_ct: i32,
    /// Range of reference offsets covered by the seeds.
    pub diag_bgn: i32,
    pub diag_end: i32,
    /// All merges stayed on one diagonal in scan order.
    pub consistent: bool,
}

/// Per-worker scratch state, reused across reads and strands.
pub struct WorkArea {
    pub bundles: FxHashMap<u32, Bundle>,
    /// Match-node arena; subscript 0 is the nil sentinel.
    pub match_nodes: Vec<MatchNode>,

    pub left_end_screened: bool,
    pub right_end_screened: bool,

    pub a_olaps_for_frag: u64,
    pub b_olaps_for_frag: u64,

    pub edit: EditDist,
    pub distinct: SmallVec<[OlapInfo; MAX_DISTINCT_OLAPS]>,
    pub overlaps: Vec<crate::overlap::output::OverlapRecord>,
    pub counters: OverlapCounters,
}

impl WorkArea {
    pub fn new(cfg: &Config) -> Self {
        WorkArea {
            bundles: FxHashMap::default(),
            match_nodes: vec![MatchNode { offset: 0, len: 0, start: 0, next: 0 }],
            left_end_screened: false,
            right_end_screened: false,
            a_olaps_for_frag: 0,
            b_olaps_for_frag: 0,
            edit: EditDist::new(cfg.partial_overlaps, cfg.max_erate),
            distinct: SmallVec::new(),
            overlaps: Vec::new(),
            counters: OverlapCounters::default(),
        }
    }
}

/// Record the seed (`r`, `offset`) into the target's match list. Runs that
/// continue an existing node extend it (and move it to the front); anything
/// that breaks ordering or drifts off-diagonal marks the bundle
/// inconsistent.
fn add_match(
    nodes: &mut Vec<MatchNode>,
    start: &mut i32,
    tgt_offset: i32,
    offset: i32,
    consistent: &mut bool,
    kmer_len: i32,
) {
    let new_diag = tgt_offset - offset;

    let mut diag = 0i32;
    let mut expected_start = 0i32;
    let mut num_checked = 0i32;
    let mut move_to_front = false;

    let mut link_is_start = true;
    let mut prev = 0i32;
    let mut cur = *start;

    while cur != 0 {
        let node = nodes[cur as usize];
        expected_start = node.start + node.len - kmer_len + 1 + HASH_KMER_SKIP as i32;
        diag = node.offset - node.start;

        if expected_start < offset {
            break;
        }

        if expected_start == offset {
            if new_diag == diag {
                nodes[cur as usize].len += 1 + HASH_KMER_SKIP as i32;
                if move_to_front {
                    let nxt = nodes[cur as usize].next;
                    if link_is_start {
                        *start = nxt;
                    } else {
                        nodes[prev as usize].next = nxt;
                    }
                    nodes[cur as usize].next = *start;
                    *start = cur;
                }
                return;
            }
            move_to_front = true;
        }

        num_checked += 1;
        prev = cur;
        link_is_start = false;
        cur = nodes[cur as usize].next;
    }

    if *start != 0
        && (num_checked > 0
            || (diag - new_diag).abs() > 3
            || offset < expected_start + kmer_len - 2)
    {
        *consistent = false;
    }

    let save = *start;
    nodes.push(MatchNode { offset: tgt_offset, len: kmer_len, start: offset, next: save });
    *start = (nodes.len() - 1) as i32;
}

/// Fold the seed (`r`, `offset`) into the per-target bundle table.
fn add_ref(
    bundles: &mut FxHashMap<u32, Bundle>,
    nodes: &mut Vec<MatchNode>,
    r: KmerRef,
    offset: i32,
    kmer_len: i32,
) {
    let string_num = r.string_num() as u32;

    let b = bundles.entry(string_num).or_insert(Bundle {
        match_list: 0,
        diag_sum: 0.0,
        diag_ct: 0,
        diag_bgn: i32::MAX,
        diag_end: i32::MIN,
        consistent: true,
    });

    b.diag_sum += r.offset() as f64 - offset as f64;
    b.diag_ct += 1;
    if b.diag_bgn > offset {
        b.diag_bgn = offset;
    }
    if b.diag_end < offset {
        b.diag_end = offset;
    }

    let mut match_list = b.match_list;
    let mut consistent = b.consistent;
    add_match(nodes, &mut match_list, r.offset() as i32, offset, &mut consistent, kmer_len);

    let b = bundles.get_mut(&string_num).expect("bundle just inserted");
    b.match_list = match_list;
    b.consistent = consistent;
}

/// Scan one strand of a reference read against the index: enumerate seed
/// hits, chain them per target, then hand the bundles to the extender.
pub fn find_overlaps(
    frag: &[u8],
    frag_id: u32,
    dir: Direction,
    cfg: &Config,
    params: &HashParams,
    index: &HashIndex,
    wa: &mut WorkArea,
    out: &Mutex<OverlapWriter>,
) -> Result<()> {
    let k = cfg.kmer_len;
    let frag_len = frag.len();
    debug_assert!(frag_len >= k);

    wa.bundles.clear();
    wa.match_nodes.truncate(1);
    wa.left_end_screened = false;
    wa.right_end_screened = false;
    wa.a_olaps_for_frag = 0;
    wa.b_olaps_for_frag = 0;

    let mut key = kmer::pack_kmer(&frag[..k]);

    for p in 0..=(frag_len - k) {
        if p > 0 {
            key >>= 2;
            key |= kmer::bit_equivalent(frag[p + k - 1]) << (2 * (k - 1));
        }

        let sub = params.bucket(key);
        let shift = params.check_bit(key);
        if !index.check_vector_has(sub, shift) {
            continue;
        }

        let found = index.find(key, sub, &frag[p..]);

        if found.hi_hits {
            if (p as i32) < HOPELESS_MATCH {
                wa.left_end_screened = true;
            }
            if (frag_len - p - k + 1) < HOPELESS_MATCH as usize {
                wa.right_end_screened = true;
            }
        }

        if found.r.is_empty() {
            continue;
        }

        let mut r = found.r;
        let mut at = found.chain_at;
        loop {
            if frag_id < index.global_id(r.string_num()) {
                add_ref(&mut wa.bundles, &mut wa.match_nodes, r, p as i32, k as i32);
            }
            if r.is_last() {
                break;
            }
            at += 1;
            r = index.overflow_ref(at);
            debug_assert!(!r.is_empty());
        }
    }

    process::process_string_olaps(frag, frag_id, dir, cfg, index, wa, out)
}
