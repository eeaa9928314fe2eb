use anyhow::Result;
use smallvec::SmallVec;
use std::sync::Mutex;

use crate::overlap::extend::OverlapKind;
use crate::overlap::index::{HashIndex, ReadInfo};
use crate::overlap::output::{self, OverlapWriter};
use crate::overlap::seeds::{Bundle, WorkArea};
use crate::overlap::{
    Config, Direction, HOPELESS_MATCH, MAX_DISTINCT_OLAPS, MIN_INTERSECTION, SHIFT_SLACK,
};

/// One accepted extension between the reference strand and a target read.
/// Boundaries track the union of merged alignments; coordinates and delta
/// always describe the best-quality one.
#[derive(Debug, Clone)]
pub struct OlapInfo {
    pub s_lo: i32,
    pub s_hi: i32,
    pub t_lo: i32,
    pub t_hi: i32,
    pub quality: f64,
    pub delta: Vec<i32>,
    pub s_left_boundary: i32,
    pub s_right_boundary: i32,
    pub t_left_boundary: i32,
    pub t_right_boundary: i32,
    pub min_diag: i32,
    pub max_diag: i32,
}

fn compute_expected(kmer_size: usize, ovl_len: f64, erate: f64) -> u64 {
    if ovl_len < kmer_size as f64 {
        return 0;
    }
    ((-(kmer_size as f64) * erate).exp() * (ovl_len - kmer_size as f64 + 1.0)).floor() as u64
}

/// Seeds expected across `ovl_len` bases at the configured error rate,
/// floored by the startup filter value. 0 disables the filter.
fn compute_minimum_kmers(cfg: &Config, ovl_len: f64) -> u64 {
    if cfg.filter_by_kmer_count == 0 {
        return 0;
    }
    cfg.filter_by_kmer_count
        .max(compute_expected(cfg.kmer_len, ovl_len.abs(), cfg.max_erate))
}

/// True iff the exact match at (`start`, `offset`) follows the alignment
/// from (`s_lo`, `t_lo`) described by `delta`, within SHIFT_SLACK.
fn lies_on_alignment(start: i32, offset: i32, s_lo: i32, t_lo: i32, delta: &[i32]) -> bool {
    let mut diag = t_lo - s_lo;
    let new_diag = offset - start;
    let mut s_lo = s_lo;

    for &d in delta {
        s_lo += d.abs();
        if start < s_lo {
            return (new_diag - diag).abs() <= SHIFT_SLACK;
        }
        if d < 0 {
            diag += 1;
        } else {
            s_lo += 1;
            diag -= 1;
        }
    }

    (new_diag - diag).abs() <= SHIFT_SLACK
}

/// Record an accepted extension, merging it into an existing slot when the
/// regions intersect (full mode only; partial mode keeps every entry).
fn add_overlap(
    s_lo: i32,
    s_hi: i32,
    t_lo: i32,
    t_hi: i32,
    qual: f64,
    delta: &[i32],
    distinct: &mut SmallVec<[OlapInfo; MAX_DISTINCT_OLAPS]>,
    partial: bool,
) {
    if !partial {
        let new_diag = t_lo - s_lo;

        for o in distinct.iter_mut() {
            let old_diag = o.t_lo - o.s_lo;

            if (new_diag > 0
                && old_diag > 0
                && o.t_right_boundary - new_diag - o.s_left_boundary >= MIN_INTERSECTION)
                || (new_diag <= 0
                    && old_diag <= 0
                    && o.s_right_boundary + new_diag - o.t_left_boundary >= MIN_INTERSECTION)
            {
                if new_diag < o.min_diag {
                    o.min_diag = new_diag;
                }
                if new_diag > o.max_diag {
                    o.max_diag = new_diag;
                }
                if s_lo < o.s_left_boundary {
                    o.s_left_boundary = s_lo;
                }
                if s_hi > o.s_right_boundary {
                    o.s_right_boundary = s_hi;
                }
                if t_lo < o.t_left_boundary {
                    o.t_left_boundary = t_lo;
                }
                if t_hi > o.t_right_boundary {
                    o.t_right_boundary = t_hi;
                }

                if qual < o.quality {
                    o.s_lo = s_lo;
                    o.s_hi = s_hi;
                    o.t_lo = t_lo;
                    o.t_hi = t_hi;
                    o.quality = qual;
                    o.delta.clear();
                    o.delta.extend_from_slice(delta);
                }

                return;
            }
        }
    }

    if distinct.len() >= MAX_DISTINCT_OLAPS {
        return;
    }

    distinct.push(OlapInfo {
        s_lo,
        s_hi,
        t_lo,
        t_hi,
        quality: qual,
        delta: delta.to_vec(),
        s_left_boundary: s_lo,
        s_right_boundary: s_hi,
        t_left_boundary: t_lo,
        t_right_boundary: t_hi,
        min_diag: t_lo - s_lo,
        max_diag: t_lo - s_lo,
    });
}

/// Pairwise-merge overlaps whose regions intersect sufficiently, keeping
/// the better quality one and unioning the boundary info.
fn merge_intersecting_olaps(p: &mut [OlapInfo], deleted: &mut [bool]) {
    let ct = p.len();

    for i in 0..ct.saturating_sub(1) {
        for j in (i + 1)..ct {
            if deleted[i] || deleted[j] {
                continue;
            }
            let lo_diag = p[i].min_diag;
            let hi_diag = p[i].max_diag;
            if (lo_diag <= 0 && p[j].min_diag > 0) || (lo_diag > 0 && p[j].min_diag <= 0) {
                continue;
            }
            let intersects = (lo_diag >= 0
                && p[j].t_right_boundary - lo_diag - p[j].s_left_boundary >= MIN_INTERSECTION)
                || (lo_diag <= 0
                    && p[j].s_right_boundary + lo_diag - p[j].t_left_boundary >= MIN_INTERSECTION)
                || (hi_diag >= 0
                    && p[j].t_right_boundary - hi_diag - p[j].s_left_boundary >= MIN_INTERSECTION)
                || (hi_diag <= 0
                    && p[j].s_right_boundary + hi_diag - p[j].t_left_boundary
                        >= MIN_INTERSECTION);
            if !intersects {
                continue;
            }

            let (keep, discard) = if p[i].quality < p[j].quality {
                deleted[j] = true;
                (i, j)
            } else {
                deleted[i] = true;
                (j, i)
            };

            let d_min_diag = p[discard].min_diag;
            let d_max_diag = p[discard].max_diag;
            let d_slb = p[discard].s_left_boundary;
            let d_srb = p[discard].s_right_boundary;
            let d_tlb = p[discard].t_left_boundary;
            let d_trb = p[discard].t_right_boundary;

            let k = &mut p[keep];
            if d_min_diag < k.min_diag {
                k.min_diag = d_min_diag;
            }
            if d_max_diag > k.max_diag {
                k.max_diag = d_max_diag;
            }
            if d_slb < k.s_left_boundary {
                k.s_left_boundary = d_slb;
            }
            if d_srb > k.s_right_boundary {
                k.s_right_boundary = d_srb;
            }
            if d_tlb < k.t_left_boundary {
                k.t_left_boundary = d_tlb;
            }
            if d_trb > k.t_right_boundary {
                k.t_right_boundary = d_trb;
            }
        }
    }
}

/// Pick the best overlap, fold everyone's boundary info into it, and mark
/// the rest deleted. Ties on quality go to the longer overlap.
fn combine_into_one_olap(p: &mut [OlapInfo], deleted: &mut [bool]) {
    let ct = p.len();

    let mut best = 0;
    let mut min_diag = p[0].min_diag;
    let mut max_diag = p[0].max_diag;
    let mut slb = p[0].s_left_boundary;
    let mut srb = p[0].s_right_boundary;
    let mut tlb = p[0].t_left_boundary;
    let mut trb = p[0].t_right_boundary;

    for i in 1..ct {
        let leni = 1 + (p[i].s_hi - p[i].s_lo).min(p[i].t_hi - p[i].t_lo);
        let lenb = 1 + (p[best].s_hi - p[best].s_lo).min(p[best].t_hi - p[best].t_lo);

        if p[i].quality < p[best].quality || (p[i].quality == p[best].quality && leni > lenb) {
            best = i;
        }

        min_diag = min_diag.min(p[i].min_diag);
        max_diag = max_diag.max(p[i].max_diag);
        slb = slb.min(p[i].s_left_boundary);
        srb = srb.max(p[i].s_right_boundary);
        tlb = tlb.min(p[i].t_left_boundary);
        trb = trb.max(p[i].t_right_boundary);
    }

    p[best].min_diag = min_diag;
    p[best].max_diag = max_diag;
    p[best].s_left_boundary = slb;
    p[best].s_right_boundary = srb;
    p[best].t_left_boundary = tlb;
    p[best].t_right_boundary = trb;

    for (i, d) in deleted.iter_mut().enumerate().take(ct) {
        *d = i != best;
    }
}

/// Pick the partial overlap with the most matching bases.
fn choose_best_partial(p: &[OlapInfo], deleted: &mut [bool]) {
    let ct = p.len();

    let mut best = 0;
    let matching_bases =
        (1.0 - p[0].quality) * (2 + p[0].s_hi - p[0].s_lo + p[0].t_hi - p[0].t_lo) as f64;

    for i in 1..ct {
        let mb = (1.0 - p[i].quality) * (2 + p[i].s_hi - p[i].s_lo + p[i].t_hi - p[i].t_lo) as f64;
        if matching_bases < mb || (matching_bases == mb && p[i].quality < p[best].quality) {
            best = i;
        }
    }

    for (i, d) in deleted.iter_mut().enumerate().take(ct) {
        *d = i != best;
    }
}

/// Extend the exact matches against one target read and report the
/// resulting overlaps. `start` heads the target's match-node list; the list
/// is consumed.
#[allow(clippy::too_many_arguments)]
fn process_matches(
    start: &mut i32,
    s: &[u8],
    s_id: u32,
    dir: Direction,
    t: &[u8],
    t_info: ReadInfo,
    t_id: u32,
    cfg: &Config,
    wa: &mut WorkArea,
    consistent: bool,
    out: &Mutex<OverlapWriter>,
) -> Result<()> {
    let s_len = s.len() as i32;
    let t_len = t_info.length as i32;

    debug_assert!(*start != 0);

    // A singleton seed far from every usable end cannot reach one within
    // the error budget.
    if cfg.use_hopeless_check
        && wa.match_nodes[*start as usize].next == 0
        && !cfg.partial_overlaps
    {
        let node = wa.match_nodes[*start as usize];
        let mut is_hopeless = false;

        let s_head = node.start;
        let t_head = node.offset;
        if s_head <= t_head {
            if s_head > HOPELESS_MATCH && !wa.left_end_screened {
                is_hopeless = true;
            }
        } else if t_head > HOPELESS_MATCH && !t_info.left_screened {
            is_hopeless = true;
        }

        let s_tail = s_len - s_head - node.len + 1;
        let t_tail = t_len - t_head - node.len + 1;
        if s_tail <= t_tail {
            if s_tail > HOPELESS_MATCH && !wa.right_end_screened {
                is_hopeless = true;
            }
        } else if t_tail > HOPELESS_MATCH && !t_info.right_screened {
            is_hopeless = true;
        }

        if is_hopeless {
            *start = 0;
            wa.counters.kmer_hits_without_olap += 1;
            return Ok(());
        }
    }

    wa.distinct.clear();

    let mut kind = OverlapKind::None;
    let mut s_lo = 0i32;
    let mut s_hi = 0i32;
    let mut t_lo = 0i32;
    let mut t_hi = 0i32;

    while *start != 0 {
        let mut longest_idx = *start;
        let mut max_len = wa.match_nodes[*start as usize].len;
        let mut p = wa.match_nodes[*start as usize].next;
        while p != 0 {
            if wa.match_nodes[p as usize].len > max_len {
                max_len = wa.match_nodes[p as usize].len;
                longest_idx = p;
            }
            p = wa.match_nodes[p as usize].next;
        }
        let lm = wa.match_nodes[longest_idx as usize];

        let a_hang = lm.start - lm.offset;
        let b_hang = a_hang + s_len - t_len;
        let hit_limit = (wa.a_olaps_for_frag >= cfg.frag_olap_limit && a_hang <= 0)
            || (wa.b_olaps_for_frag >= cfg.frag_olap_limit && b_hang <= 0);

        if !hit_limit {
            let ext = wa.edit.extend_alignment(lm.start, lm.len, lm.offset, s, t);
            kind = ext.kind;
            s_lo = ext.s_lo;
            s_hi = ext.s_hi;
            t_lo = ext.t_lo;
            t_hi = ext.t_hi;

            if (kind == OverlapKind::Dovetail || cfg.partial_overlaps)
                && 1 + s_hi - s_lo >= cfg.min_olap_len as i32
                && 1 + t_hi - t_lo >= cfg.min_olap_len as i32
            {
                let olap_len = 1 + (s_hi - s_lo).min(t_hi - t_lo);
                let quality = ext.errors as f64 / olap_len as f64;

                if ext.errors <= wa.edit.error_bound(olap_len as usize) {
                    add_overlap(
                        s_lo,
                        s_hi,
                        t_lo,
                        t_hi,
                        quality,
                        &wa.edit.left_delta,
                        &mut wa.distinct,
                        cfg.partial_overlaps,
                    );
                }
            }
        }

        if consistent {
            *start = 0;
        }

        // Drop the anchor and every node the alignment already explains.
        let mut link_is_start = true;
        let mut prev = 0i32;
        loop {
            let cur = if link_is_start { *start } else { wa.match_nodes[prev as usize].next };
            if cur == 0 {
                break;
            }
            let node = wa.match_nodes[cur as usize];
            let on_alignment = (kind == OverlapKind::Dovetail || cfg.partial_overlaps)
                && s_lo - SHIFT_SLACK <= node.start
                && node.start + node.len <= s_hi + SHIFT_SLACK
                && lies_on_alignment(node.start, node.offset, s_lo, t_lo, &wa.edit.left_delta);
            if cur == longest_idx || on_alignment {
                let nxt = node.next;
                if link_is_start {
                    *start = nxt;
                } else {
                    wa.match_nodes[prev as usize].next = nxt;
                }
            } else {
                prev = cur;
                link_is_start = false;
            }
        }
    }

    let mut overlaps_output = 0u32;

    if !wa.distinct.is_empty() {
        let ct = wa.distinct.len();
        let mut deleted = [false; MAX_DISTINCT_OLAPS];

        if cfg.partial_overlaps {
            if cfg.unique_olap_per_pair {
                choose_best_partial(&wa.distinct, &mut deleted);
            }
            // Without -u, partial overlaps are all reported unmerged.
        } else if cfg.unique_olap_per_pair {
            combine_into_one_olap(&mut wa.distinct, &mut deleted);
        } else {
            merge_intersecting_olaps(&mut wa.distinct, &mut deleted);
        }

        for i in 0..ct {
            if deleted[i] {
                continue;
            }
            let p = wa.distinct[i].clone();

            if cfg.partial_overlaps {
                output::output_partial_overlap(s_id, t_id, dir, &p, s_len, t_len, cfg, wa, out)?;
            } else {
                output::output_overlap(s_id, s_len, dir, t_id, t_len, &p, cfg, wa, out)?;
            }

            overlaps_output += 1;

            if p.s_lo == 0 {
                wa.a_olaps_for_frag += 1;
            }
            if p.s_hi >= s_len - 1 {
                wa.b_olaps_for_frag += 1;
            }
        }
    }

    if overlaps_output == 0 {
        wa.counters.kmer_hits_without_olap += 1;
    } else {
        wa.counters.kmer_hits_with_olap += 1;
        if overlaps_output > 1 {
            wa.counters.multi_overlap += 1;
        }
    }

    Ok(())
}

/// Rank and extend every live bundle gathered during one strand scan.
/// Within the per-strand limit bundles run in target order; over it they
/// are ranked by average diagonal and taken from the positive then the
/// negative side until each end's quota is reached.
pub fn process_string_olaps(
    s: &[u8],
    s_id: u32,
    dir: Direction,
    cfg: &Config,
    index: &HashIndex,
    wa: &mut WorkArea,
    out: &Mutex<OverlapWriter>,
) -> Result<()> {
    let mut list: Vec<(u32, Bundle)> = wa.bundles.drain().collect();

    for (_, b) in list.iter_mut() {
        debug_assert!(b.match_list != 0);
        debug_assert!(b.diag_ct > 0);
        b.diag_sum /= b.diag_ct as f64;
    }

    let ct = list.len();
    if ct == 0 {
        return Ok(());
    }

    if ct as u64 <= cfg.frag_olap_limit {
        list.sort_unstable_by_key(|(num, _)| *num);

        for (num, b) in list.iter_mut() {
            if compute_minimum_kmers(cfg, (b.diag_end - b.diag_bgn) as f64) > b.diag_ct as u64 {
                wa.counters.kmer_hits_skipped += 1;
                continue;
            }
            let num = *num as usize;
            process_matches(
                &mut b.match_list,
                s,
                s_id,
                dir,
                index.read_bases(num),
                index.read_info(num),
                index.global_id(num),
                cfg,
                wa,
                b.consistent,
                out,
            )?;
            debug_assert!(b.match_list == 0);
        }

        return Ok(());
    }

    list.sort_unstable_by(|a, b| a.1.diag_sum.total_cmp(&b.1.diag_sum));

    let mut first_pos = 0;
    while first_pos < ct && list[first_pos].1.diag_sum < 0.0 {
        first_pos += 1;
    }

    for i in first_pos..ct {
        if wa.a_olaps_for_frag >= cfg.frag_olap_limit {
            break;
        }
        let num = list[i].0;
        let b = &mut list[i].1;
        if compute_minimum_kmers(cfg, (b.diag_end - b.diag_bgn) as f64) > b.diag_ct as u64 {
            wa.counters.kmer_hits_skipped += 1;
            continue;
        }
        let num = num as usize;
        process_matches(
            &mut b.match_list,
            s,
            s_id,
            dir,
            index.read_bases(num),
            index.read_info(num),
            index.global_id(num),
            cfg,
            wa,
            b.consistent,
            out,
        )?;
        debug_assert!(b.match_list == 0);
    }

    for i in (0..first_pos).rev() {
        if wa.b_olaps_for_frag >= cfg.frag_olap_limit {
            break;
        }
        let num = list[i].0;
        let b = &mut list[i].1;
        if compute_minimum_kmers(cfg, (b.diag_end - b.diag_bgn) as f64) > b.diag_ct as u64 {
            wa.counters.kmer_hits_skipped += 1;
            continue;
        }
        let num = num as usize;
        process_matches(
            &mut b.match_list,
            s,
            s_id,
            dir,
            index.read_bases(num),
            index.read_info(num),
            index.global_id(num),
            cfg,
            wa,
            b.consistent,
            out,
        )?;
        debug_assert!(b.match_list == 0);
    }

    Ok(())
}
