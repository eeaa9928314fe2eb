use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use crate::overlap::process::OlapInfo;
use crate::overlap::seeds::WorkArea;
use crate::overlap::{Config, Direction, OUTPUT_BUFFER_LEN};

/// Mode-specific placement fields of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Full mode: signed hangs per the canonical orientation.
    Full { a_hang: i32, b_hang: i32 },
    /// Partial mode: non-negative overhangs at the 5' and 3' ends of both
    /// reads, expressed with the reference forward.
    Partial { ahg5: i32, ahg3: i32, bhg5: i32, bhg3: i32 },
}

/// One overlap, ready for the writer. Full-mode records are good for
/// assembly (UTG); partial-mode records for trimming and duplicate
/// detection (OBT, DUP).
#[derive(Debug, Clone)]
pub struct OverlapRecord {
    pub a_iid: u32,
    pub b_iid: u32,
    pub flipped: bool,
    pub span: u32,
    /// Error fraction in 0.01% units.
    pub erate_q: u32,
    pub placement: Placement,
    /// Signed delta encoding; empty unless delta output is enabled.
    pub delta: Vec<i32>,
}

#[inline]
fn quantize_erate(quality: f64) -> u32 {
    (quality * 10000.0).round() as u32
}

fn span_of(olap: &OlapInfo) -> u32 {
    let span = (olap.s_hi - olap.s_lo) + (olap.t_hi - olap.t_lo) + olap.delta.len() as i32;
    debug_assert!(span % 2 == 0);
    (span / 2) as u32
}

/// Canonicalise a full-mode overlap between the scanned strand `S` and the
/// always-forward target `T`. Returns the record and whether it counts as
/// contained.
pub fn make_full_record(
    s_id: u32,
    s_len: i32,
    s_dir: Direction,
    t_id: u32,
    t_len: i32,
    olap: &OlapInfo,
    emit_deltas: bool,
) -> (OverlapRecord, bool) {
    debug_assert!(s_id < t_id);
    debug_assert!(olap.s_lo < olap.s_hi);
    debug_assert!(olap.t_lo < olap.t_hi);
    // Dovetail or containment: flush on the left and on the right.
    debug_assert!(olap.s_lo == 0 || olap.t_lo == 0);
    debug_assert!(olap.s_hi == s_len - 1 || olap.t_hi == t_len - 1);

    let s_right_hang = s_len - olap.s_hi - 1;
    let t_right_hang = t_len - olap.t_hi - 1;

    let s_left = olap.s_lo > olap.t_lo || (olap.s_lo == olap.t_lo && s_right_hang > t_right_hang);

    let (a_iid, b_iid) = if s_left { (s_id, t_id) } else { (t_id, s_id) };

    let (mut orient, mut ahg, mut bhg);
    if s_left {
        orient = if s_dir == Direction::Forward { 'N' } else { 'O' };
        ahg = olap.s_lo;
        bhg = t_right_hang - s_right_hang;
    } else {
        orient = if s_dir == Direction::Forward { 'N' } else { 'I' };
        ahg = olap.t_lo;
        bhg = s_right_hang - t_right_hang;
    }

    // Regularize reverse-orient containments: flip outtie to innie so the
    // container is forward.
    if orient == 'O' && s_right_hang >= t_right_hang {
        orient = 'I';
        ahg = -(t_right_hang - s_right_hang);
        bhg = -olap.s_lo;
    }

    let (a_hang, b_hang, flipped) = match orient {
        'N' => (ahg, bhg, false),
        'I' => (ahg, bhg, true),
        _ => (-bhg, -ahg, true), // 'O'
    };

    let mut delta = Vec::new();
    if emit_deltas {
        delta.extend_from_slice(&olap.delta);
        if !s_left {
            for v in delta.iter_mut() {
                *v = -*v;
            }
        }
    }

    let record = OverlapRecord {
        a_iid,
        b_iid,
        flipped,
        span: span_of(olap),
        erate_q: quantize_erate(olap.quality),
        placement: Placement::Full { a_hang, b_hang },
        delta,
    };

    (record, bhg <= 0)
}

/// Convert a partial-mode overlap to canonical form with `S` forward.
pub fn make_partial_record(
    s_id: u32,
    t_id: u32,
    s_dir: Direction,
    olap: &OlapInfo,
    s_len: i32,
    t_len: i32,
) -> OverlapRecord {
    debug_assert!(s_id < t_id);

    let (ahg5, ahg3, bhg5, bhg3, flipped);
    if s_dir == Direction::Forward {
        ahg5 = olap.s_lo;
        ahg3 = s_len - (olap.s_hi + 1);
        bhg5 = olap.t_lo;
        bhg3 = t_len - (olap.t_hi + 1);
        flipped = false;
    } else {
        ahg5 = s_len - (olap.s_hi + 1);
        ahg3 = olap.s_lo;
        bhg5 = t_len - (olap.t_hi + 1);
        bhg3 = olap.t_lo;
        flipped = true;
    }

    OverlapRecord {
        a_iid: s_id,
        b_iid: t_id,
        flipped,
        span: span_of(olap),
        erate_q: quantize_erate(olap.quality),
        placement: Placement::Partial { ahg5, ahg3, bhg5, bhg3 },
        delta: Vec::new(),
    }
}

/// Buffer a full-mode overlap, flushing the worker's buffer to the shared
/// writer when it fills.
#[allow(clippy::too_many_arguments)]
pub fn output_overlap(
    s_id: u32,
    s_len: i32,
    s_dir: Direction,
    t_id: u32,
    t_len: i32,
    olap: &OlapInfo,
    cfg: &Config,
    wa: &mut WorkArea,
    out: &Mutex<OverlapWriter>,
) -> Result<()> {
    let (record, contained) =
        make_full_record(s_id, s_len, s_dir, t_id, t_len, olap, cfg.emit_deltas);

    wa.counters.total_overlaps += 1;
    if contained {
        wa.counters.contained += 1;
    } else {
        wa.counters.dovetail += 1;
    }

    wa.overlaps.push(record);
    if wa.overlaps.len() >= OUTPUT_BUFFER_LEN {
        flush_overlaps(out, &mut wa.overlaps)?;
    }

    Ok(())
}

/// Buffer a partial-mode overlap.
#[allow(clippy::too_many_arguments)]
pub fn output_partial_overlap(
    s_id: u32,
    t_id: u32,
    s_dir: Direction,
    olap: &OlapInfo,
    s_len: i32,
    t_len: i32,
    _cfg: &Config,
    wa: &mut WorkArea,
    out: &Mutex<OverlapWriter>,
) -> Result<()> {
    let record = make_partial_record(s_id, t_id, s_dir, olap, s_len, t_len);

    wa.counters.total_overlaps += 1;

    wa.overlaps.push(record);
    if wa.overlaps.len() >= OUTPUT_BUFFER_LEN {
        flush_overlaps(out, &mut wa.overlaps)?;
    }

    Ok(())
}

/// Append a worker's buffered records to the shared writer.
pub fn flush_overlaps(out: &Mutex<OverlapWriter>, buf: &mut Vec<OverlapRecord>) -> Result<()> {
    let mut w = out.lock().map_err(|_| anyhow!("overlap writer mutex poisoned"))?;
    for r in buf.iter() {
        w.write_record(r)?;
    }
    buf.clear();
    Ok(())
}

/// Line-oriented overlap file. One record per line, tab separated:
///
/// ```text
/// a_iid  b_iid  N|I  a_hang  b_hang  span  erate  UTG [delta,...]
/// a_iid  b_iid  N|I  ahg5  ahg3  bhg5  bhg3  span  erate  OBT,DUP
/// ```
pub struct OverlapWriter {
    w: BufWriter<File>,
}

impl OverlapWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let f = File::create(path).context(format!("creating overlap output {:?}", path))?;
        Ok(OverlapWriter { w: BufWriter::new(f) })
    }

    pub fn write_record(&mut self, r: &OverlapRecord) -> Result<()> {
        let orient = if r.flipped { 'I' } else { 'N' };

        match r.placement {
            Placement::Full { a_hang, b_hang } => {
                write!(
                    self.w,
                    "{}\t{}\t{}\t{}\t{}\t{}\t{}\tUTG",
                    r.a_iid, r.b_iid, orient, a_hang, b_hang, r.span, r.erate_q
                )
                .context("writing overlap record")?;
                if !r.delta.is_empty() {
                    let joined: Vec<String> = r.delta.iter().map(|d| d.to_string()).collect();
                    write!(self.w, "\t{}", joined.join(","))
                        .context("writing overlap record")?;
                }
                writeln!(self.w).context("writing overlap record")?;
            }
            Placement::Partial { ahg5, ahg3, bhg5, bhg3 } => {
                writeln!(
                    self.w,
                    "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\tOBT,DUP",
                    r.a_iid, r.b_iid, orient, ahg5, ahg3, bhg5, bhg3, r.span, r.erate_q
                )
                .context("writing overlap record")?;
            }
        }

        Ok(())
    }

    pub fn finish(&mut self) -> Result<()> {
        self.w.flush().context("flushing overlap output")
    }
}
