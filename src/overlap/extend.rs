use crate::overlap::index::MAX_READ_LEN;
use crate::overlap::kmer::UNKNOWN_CHAR;

/// Outcome of extending an exact seed in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapKind {
    /// Reached neither end of either read.
    None,
    /// Reached an end only on the left.
    LeftBranchPt,
    /// Reached an end only on the right.
    RightBranchPt,
    /// Reached an end on both sides.
    Dovetail,
}

/// Errors beyond this count are never considered free.
const ERRORS_FOR_FREE: usize = 1;

/// Branch points must be at least this far from a read end to matter.
const MIN_BRANCH_END_DIST: i32 = 20;

/// An alignment thread whose tail probability of needing `e` errors drops
/// below this bound is abandoned.
const EDIT_DIST_PROB_BOUND: f64 = 1e-4;

/// Z-score below which the normal approximation accepts `n` directly.
const NORMAL_DISTRIB_THOLD: f64 = 3.62;

#[inline]
fn sign(x: i32) -> i32 {
    (x > 0) as i32 - (x < 0) as i32
}

#[inline]
fn ch_eq(a: u8, b: u8) -> bool {
    a == b || a == UNKNOWN_CHAR || b == UNKNOWN_CHAR
}

/// Smallest n >= start such that
/// Pr[>= e errors in n binomial trials at rate p] > limit.
fn binomial_bound(e: i32, p: f64, start: i32, limit: f64) -> i32 {
    let q = 1.0 - p;
    let start = start.max(e);

    for n in start..MAX_READ_LEN as i32 {
        if n <= 35 {
            let mut sum = 0.0;
            let mut bin_coeff = 1.0f64;
            let mut ct = 0.0f64;
            let mut p_power = 1.0;
            let mut q_power = q.powi(n);

            let mut k = 0;
            while k < e && 1.0 - sum > limit {
                sum += bin_coeff * p_power * q_power;
                bin_coeff *= n as f64 - ct;
                ct += 1.0;
                bin_coeff /= ct;
                p_power *= p;
                q_power /= q;
                k += 1;
            }
            if 1.0 - sum > limit {
                return n;
            }
        } else {
            let np = n as f64 * p;
            let normal_z = (e as f64 - 0.5 - np) / (np * q).sqrt();
            if normal_z <= NORMAL_DISTRIB_THOLD {
                return n;
            }
            let mut sum = 0.0;
            let mut mu_power = 1.0;
            let mut factorial = 1.0;
            let poisson_coeff = (-np).exp();
            for k in 0..e {
                sum += mu_power * poisson_coeff / factorial;
                mu_power *= np;
                factorial *= (k + 1) as f64;
            }
            if 1.0 - sum > limit {
                return n;
            }
        }
    }

    MAX_READ_LEN as i32
}

/// Per-worker banded prefix/suffix edit-distance work area.
///
/// DP state lives in `rows`: `rows[e]` spans diagonals `-e-2 ..= e+2` and
/// holds the furthest row reachable with `e` errors on each diagonal. Rows
/// are materialised on first use and reused across reads.
pub struct EditDist {
    doing_partial: bool,
    max_errors: usize,
    min_branch_tail_slope: f64,
    branch_match_value: f64,

    /// Minimum `rows[e]` value still worth pursuing; monotone in e.
    edit_match_limit: Vec<i32>,
    /// Maximum errors allowed in an overlap of a given length.
    error_bound: Vec<i32>,

    rows: Vec<Vec<i32>>,

    pub left_delta: Vec<i32>,
    pub right_delta: Vec<i32>,
    delta_stack: Vec<i32>,
}

/// Result of [`EditDist::extend_alignment`]: aligned intervals are
/// inclusive on both ends.
#[derive(Debug, Clone, Copy)]
pub struct Extension {
    pub kind: OverlapKind,
    pub s_lo: i32,
    pub s_hi: i32,
    pub t_lo: i32,
    pub t_hi: i32,
    pub errors: i32,
}

impl EditDist {
    pub fn new(doing_partial: bool, max_erate: f64) -> Self {
        let max_errors = 1 + (max_erate * MAX_READ_LEN as f64).ceil() as usize;

        let mut edit_match_limit = vec![0i32; max_errors + 1];
        let mut start = 1;
        for e in (ERRORS_FOR_FREE + 1)..=max_errors {
            start = binomial_bound(
                (e - ERRORS_FOR_FREE) as i32,
                max_erate,
                start,
                EDIT_DIST_PROB_BOUND,
            );
            edit_match_limit[e] = start - 1;
            debug_assert!(edit_match_limit[e] >= edit_match_limit[e - 1]);
        }

        let error_bound = (0..=MAX_READ_LEN)
            .map(|i| (i as f64 * max_erate).ceil() as i32)
            .collect();

        EditDist {
            doing_partial,
            max_errors,
            min_branch_tail_slope: if max_erate > 0.06 { 1.0 } else { 0.20 },
            branch_match_value: max_erate / (1.0 + max_erate),
            edit_match_limit,
            error_bound,
            rows: Vec::new(),
            left_delta: Vec::new(),
            right_delta: Vec::new(),
            delta_stack: Vec::new(),
        }
    }

    /// Maximum errors allowed in an overlap spanning `olap_len` bases.
    #[inline]
    pub fn error_bound(&self, olap_len: usize) -> i32 {
        self.error_bound[olap_len]
    }

    #[inline]
    pub fn edit_match_limit(&self, e: usize) -> i32 {
        self.edit_match_limit[e]
    }

    fn ensure_row(&mut self, e: usize) {
        while self.rows.len() <= e {
            let level = self.rows.len();
            self.rows.push(vec![0; 2 * level + 5]);
        }
    }

    #[inline]
    fn get(&self, e: i32, d: i32) -> i32 {
        self.rows[e as usize][(d + e + 2) as usize]
    }

    #[inline]
    fn set(&mut self, e: i32, d: i32, v: i32) {
        self.rows[e as usize][(d + e + 2) as usize] = v;
    }

    /// Ukkonen DP matching `a` against a prefix of `t`, left to right.
    /// Returns (errors, a_end, t_end, match_to_end); ends are one past the
    /// last aligned position.
    fn forward(&mut self, a: &[u8], t: &[u8], error_limit: i32) -> (i32, i32, i32, bool) {
        let m = a.len() as i32;
        let n = t.len() as i32;
        debug_assert!(m <= n);

        self.right_delta.clear();

        let mut row = 0i32;
        while row < m && ch_eq(a[row as usize], t[row as usize]) {
            row += 1;
        }

        self.ensure_row(0);
        self.set(0, 0, row);

        if row == m {
            return (0, m, m, true);
        }

        let mut left = 0i32;
        let mut right = 0i32;
        let mut best_d = 0i32;
        let mut best_e = 0i32;
        let mut longest = 0i32;
        let mut max_score = 0.0f64;
        let mut max_score_len = 0i32;
        let mut max_best_d = 0i32;
        let mut max_best_e = 0i32;

        for e in 1..=error_limit {
            self.ensure_row(e as usize);

            left = (left - 1).max(-e);
            right = (right + 1).min(e);
            self.set(e - 1, left, -2);
            self.set(e - 1, left - 1, -2);
            self.set(e - 1, right, -2);
            self.set(e - 1, right + 1, -2);

            for d in left..=right {
                let mut row = 1 + self.get(e - 1, d);
                row = row.max(self.get(e - 1, d - 1));
                row = row.max(1 + self.get(e - 1, d + 1));
                while row < m && row + d < n && ch_eq(a[row as usize], t[(row + d) as usize]) {
                    row += 1;
                }
                self.set(e, d, row);

                if row == m || row + d == n {
                    // Uneven error distribution can mean the real overlap
                    // ended earlier; check for a branch point.
                    let score = row as f64 * self.branch_match_value - e as f64;
                    let tail_len = row - max_score_len;
                    if (self.doing_partial && score < max_score)
                        || (e > MIN_BRANCH_END_DIST / 2
                            && tail_len >= MIN_BRANCH_END_DIST
                            && (max_score - score) / tail_len as f64 >= self.min_branch_tail_slope)
                    {
                        let a_end = max_score_len;
                        let t_end = max_score_len + max_best_d;
                        self.set_right_delta(max_best_e, max_best_d);
                        return (max_best_e, a_end, t_end, false);
                    }

                    // Force the last error to be a mismatch, not an insert.
                    let mut d = d;
                    if row == m && 1 + self.get(e - 1, d + 1) == self.get(e, d) && d < right {
                        d += 1;
                        let v = self.get(e, d - 1);
                        self.set(e, d, v);
                    }

                    self.set_right_delta(e, d);
                    return (e, row, row + d, true);
                }
            }

            while left <= right && left < 0 && self.get(e, left) < self.edit_match_limit[e as usize]
            {
                left += 1;
            }
            if left >= 0 {
                while left <= right
                    && self.get(e, left) + left < self.edit_match_limit[e as usize]
                {
                    left += 1;
                }
            }
            if left > right {
                break;
            }
            while right > 0 && self.get(e, right) + right < self.edit_match_limit[e as usize] {
                right -= 1;
            }
            if right <= 0 {
                while self.get(e, right) < self.edit_match_limit[e as usize] {
                    right -= 1;
                }
            }
            debug_assert!(left <= right);

            for d in left..=right {
                if self.get(e, d) > longest {
                    best_d = d;
                    best_e = e;
                    longest = self.get(e, d);
                }
            }

            let score = longest as f64 * self.branch_match_value - e as f64;
            if score > max_score {
                max_score = score;
                max_score_len = longest;
                max_best_d = best_d;
                max_best_e = best_e;
            }
        }

        let a_end = max_score_len;
        let t_end = max_score_len + max_best_d;
        self.set_right_delta(max_best_e, max_best_d);
        (max_best_e, a_end, t_end, false)
    }

    /// Same DP, right to left over the prefixes ending the slices.
    /// Returns (errors, a_end, t_end, leftover, match_to_end); ends are
    /// negated offsets from the slice ends, leftover the run of matches
    /// after the last delta.
    fn reverse(&mut self, a: &[u8], t: &[u8], error_limit: i32) -> (i32, i32, i32, i32, bool) {
        let m = a.len() as i32;
        let n = t.len() as i32;
        debug_assert!(m <= n);

        self.left_delta.clear();

        let at = |row: i32| a[(m - 1 - row) as usize];
        let tt = |row_d: i32| t[(n - 1 - row_d) as usize];

        let mut row = 0i32;
        while row < m && ch_eq(at(row), tt(row)) {
            row += 1;
        }

        self.ensure_row(0);
        self.set(0, 0, row);

        if row == m {
            return (0, -m, -m, m, true);
        }

        let mut left = 0i32;
        let mut right = 0i32;
        let mut best_d = 0i32;
        let mut best_e = 0i32;
        let mut longest = 0i32;
        let mut max_score = 0.0f64;
        let mut max_score_len = 0i32;
        let mut max_best_d = 0i32;
        let mut max_best_e = 0i32;

        for e in 1..=error_limit {
            self.ensure_row(e as usize);

            left = (left - 1).max(-e);
            right = (right + 1).min(e);
            self.set(e - 1, left, -2);
            self.set(e - 1, left - 1, -2);
            self.set(e - 1, right, -2);
            self.set(e - 1, right + 1, -2);

            for d in left..=right {
                let mut row = 1 + self.get(e - 1, d);
                row = row.max(self.get(e - 1, d - 1));
                row = row.max(1 + self.get(e - 1, d + 1));
                while row < m && row + d < n && ch_eq(at(row), tt(row + d)) {
                    row += 1;
                }
                self.set(e, d, row);

                if row == m || row + d == n {
                    let score = row as f64 * self.branch_match_value - e as f64;
                    let tail_len = row - max_score_len;
                    if (self.doing_partial && score < max_score)
                        || (e > MIN_BRANCH_END_DIST / 2
                            && tail_len >= MIN_BRANCH_END_DIST
                            && (max_score - score) / tail_len as f64 >= self.min_branch_tail_slope)
                    {
                        let a_end = -max_score_len;
                        let mut t_end = -max_score_len - max_best_d;
                        let mut leftover = 0;
                        self.set_left_delta(max_best_e, max_best_d, &mut leftover, &mut t_end, n);
                        return (max_best_e, a_end, t_end, leftover, false);
                    }

                    let a_end = -row;
                    let mut t_end = -row - d;
                    let mut leftover = 0;
                    self.set_left_delta(e, d, &mut leftover, &mut t_end, n);
                    return (e, a_end, t_end, leftover, true);
                }
            }

            while left <= right && left < 0 && self.get(e, left) < self.edit_match_limit[e as usize]
            {
                left += 1;
            }
            if left >= 0 {
                while left <= right
                    && self.get(e, left) + left < self.edit_match_limit[e as usize]
                {
                    left += 1;
                }
            }
            if left > right {
                break;
            }
            while right > 0 && self.get(e, right) + right < self.edit_match_limit[e as usize] {
                right -= 1;
            }
            if right <= 0 {
                while self.get(e, right) < self.edit_match_limit[e as usize] {
                    right -= 1;
                }
            }
            debug_assert!(left <= right);

            for d in left..=right {
                if self.get(e, d) > longest {
                    best_d = d;
                    best_e = e;
                    longest = self.get(e, d);
                }
            }

            let score = longest as f64 * self.branch_match_value - e as f64;
            if score > max_score {
                max_score = score;
                max_score_len = longest;
                max_best_d = best_d;
                max_best_e = best_e;
            }
        }

        let a_end = -max_score_len;
        let mut t_end = -max_score_len - max_best_d;
        let mut leftover = 0;
        self.set_left_delta(max_best_e, max_best_d, &mut leftover, &mut t_end, n);
        (max_best_e, a_end, t_end, leftover, false)
    }

    /// Trace the DP back from (e, d) into `right_delta`: magnitudes are
    /// runs of matches, signs say which sequence owns each gap.
    fn set_right_delta(&mut self, e: i32, d: i32) {
        let mut d = d;
        let mut last = self.get(e, d);
        self.delta_stack.clear();
        self.right_delta.clear();

        for k in (1..=e).rev() {
            let mut from = d;
            let mut max = 1 + self.get(k - 1, d);
            let j = self.get(k - 1, d - 1);
            if j > max {
                from = d - 1;
                max = j;
            }
            let j = 1 + self.get(k - 1, d + 1);
            if j > max {
                from = d + 1;
                max = j;
            }
            if from == d - 1 {
                self.delta_stack.push(max - last - 1);
                d -= 1;
                last = self.get(k - 1, from);
            } else if from == d + 1 {
                self.delta_stack.push(last - (max - 1));
                d += 1;
                last = self.get(k - 1, from);
            }
        }
        self.delta_stack.push(last + 1);

        for i in (1..self.delta_stack.len()).rev() {
            let v = self.delta_stack[i].abs() * sign(self.delta_stack[i - 1]);
            self.right_delta.push(v);
        }
    }

    /// Reverse-direction traceback into `left_delta`. A leading ±1 delta is
    /// rewritten into a substitution by shifting `t_end` when possible;
    /// `leftover` is the run of matches past the final delta.
    fn set_left_delta(&mut self, e: i32, d: i32, leftover: &mut i32, t_end: &mut i32, t_len: i32) {
        let mut d = d;
        let mut last = self.get(e, d);
        self.left_delta.clear();

        for k in (1..=e).rev() {
            let mut from = d;
            let mut max = 1 + self.get(k - 1, d);
            let j = self.get(k - 1, d - 1);
            if j > max {
                from = d - 1;
                max = j;
            }
            let j = 1 + self.get(k - 1, d + 1);
            if j > max {
                from = d + 1;
                max = j;
            }
            if from == d - 1 {
                self.left_delta.push(max - last - 1);
                d -= 1;
                last = self.get(k - 1, from);
            } else if from == d + 1 {
                self.left_delta.push(last - (max - 1));
                d += 1;
                last = self.get(k - 1, from);
            }
        }
        *leftover = last;

        debug_assert!(self.left_delta.is_empty() || self.left_delta[0] != -1);

        if self.left_delta.len() > 1 && self.left_delta[0] == 1 && *t_end + t_len > 0 {
            self.left_delta[0] = if self.left_delta[1] > 0 {
                self.left_delta[1] + 1
            } else {
                self.left_delta[1] - 1
            };
            self.left_delta.remove(1);
            *t_end -= 1;
            if self.left_delta.is_empty() {
                *leftover += 1;
            }
        }
    }

    /// Extend the exact seed (`start`, `offset`, `len`) in both directions.
    /// `s` is the reference strand, `t` the target read; on return
    /// `left_delta` holds the stitched delta encoding of the alignment.
    pub fn extend_alignment(
        &mut self,
        start: i32,
        len: i32,
        offset: i32,
        s: &[u8],
        t: &[u8],
    ) -> Extension {
        let s_len = s.len() as i32;
        let t_len = t.len() as i32;

        let s_left_begin = start - 1;
        let s_right_begin = start + len;
        let s_right_len = s_len - s_right_begin;

        let t_left_begin = offset - 1;
        let t_right_begin = offset + len;
        let t_right_len = t_len - t_right_begin;

        let total_olap = start.min(offset) + len + s_right_len.min(t_right_len);
        let error_limit = self.error_bound[total_olap as usize];

        let (right_errors, mut s_hi, mut t_hi, right_match_to_end);
        if s_right_len == 0 || t_right_len == 0 {
            right_errors = 0;
            self.right_delta.clear();
            s_hi = 0;
            t_hi = 0;
            right_match_to_end = true;
        } else if s_right_len <= t_right_len {
            let (e, a_end, t_end, to_end) = self.forward(
                &s[s_right_begin as usize..],
                &t[t_right_begin as usize..],
                error_limit,
            );
            right_errors = e;
            s_hi = a_end;
            t_hi = t_end;
            right_match_to_end = to_end;
        } else {
            let (e, a_end, t_end, to_end) = self.forward(
                &t[t_right_begin as usize..],
                &s[s_right_begin as usize..],
                error_limit,
            );
            right_errors = e;
            t_hi = a_end;
            s_hi = t_end;
            right_match_to_end = to_end;
        }

        for v in self.right_delta.iter_mut() {
            *v = -*v;
        }

        s_hi += s_right_begin - 1;
        t_hi += t_right_begin - 1;

        debug_assert!(right_errors <= error_limit);

        let (left_errors, mut s_lo, mut t_lo, leftover, left_match_to_end);
        if s_left_begin < 0 || t_left_begin < 0 {
            left_errors = 0;
            self.left_delta.clear();
            s_lo = 0;
            t_lo = 0;
            leftover = 0;
            left_match_to_end = true;
        } else if s_right_begin <= t_right_begin {
            let (e, a_end, t_end, lo, to_end) = self.reverse(
                &s[..=s_left_begin as usize],
                &t[..=t_left_begin as usize],
                error_limit - right_errors,
            );
            left_errors = e;
            s_lo = a_end;
            t_lo = t_end;
            leftover = lo;
            left_match_to_end = to_end;
        } else {
            let (e, a_end, t_end, lo, to_end) = self.reverse(
                &t[..=t_left_begin as usize],
                &s[..=s_left_begin as usize],
                error_limit - right_errors,
            );
            left_errors = e;
            t_lo = a_end;
            s_lo = t_end;
            leftover = lo;
            left_match_to_end = to_end;
        }

        for v in self.left_delta.iter_mut() {
            *v = -*v;
        }

        s_lo += s_left_begin + 1;
        t_lo += t_left_begin + 1;

        let kind;
        if !right_match_to_end {
            if !self.doing_partial {
                self.left_delta.clear();
            }
            kind = if !left_match_to_end {
                OverlapKind::None
            } else {
                OverlapKind::RightBranchPt
            };
        } else {
            kind = if !left_match_to_end {
                OverlapKind::LeftBranchPt
            } else {
                OverlapKind::Dovetail
            };
        }

        let mut errors = 0;
        if kind == OverlapKind::Dovetail || self.doing_partial {
            errors = left_errors + right_errors;
            debug_assert!(errors <= error_limit);

            if !self.right_delta.is_empty() {
                let first = self.right_delta[0];
                let v = if first > 0 {
                    first + leftover + len
                } else {
                    first - leftover - len
                };
                self.left_delta.push(v);
                for i in 1..self.right_delta.len() {
                    let v = self.right_delta[i];
                    self.left_delta.push(v);
                }
            }
        }

        Extension { kind, s_lo, s_hi, t_lo, t_hi, errors }
    }

    #[inline]
    pub fn max_errors(&self) -> usize {
        self.max_errors
    }
}
