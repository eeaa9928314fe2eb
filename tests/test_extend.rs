#[cfg(test)]
mod tests {
    use seqoverlap::overlap::extend::{EditDist, OverlapKind};

    /* --------------------------------------------------------------------- */
    /*  probability tables                                                   */
    /* --------------------------------------------------------------------- */

    #[test]
    fn edit_match_limit_is_monotone() {
        let ed = EditDist::new(false, 0.06);
        for e in 1..200usize {
            assert!(
                ed.edit_match_limit(e) >= ed.edit_match_limit(e - 1),
                "limit fell at e={e}"
            );
        }
        // Beyond the free errors the limits must actually grow
        assert!(ed.edit_match_limit(50) > ed.edit_match_limit(5));
    }

    #[test]
    fn error_bound_is_ceil_of_rate_times_length() {
        let ed = EditDist::new(false, 0.06);
        assert_eq!(ed.error_bound(0), 0);
        assert_eq!(ed.error_bound(50), 3); // ceil(3.0)
        assert_eq!(ed.error_bound(80), 5); // ceil(4.8)
        assert_eq!(ed.error_bound(100), 6);
        assert_eq!(ed.error_bound(99), 6); // ceil(5.94)
    }

    /* --------------------------------------------------------------------- */
    /*  extension                                                            */
    /* --------------------------------------------------------------------- */

    // 60 bases, no repeated 14-mer
    const S60: &[u8] = b"acgattgcacgtcaagtcgcttgcatgctgcagtaacgctgtacctgaacgtgcattagc";

    #[test]
    fn identical_strings_extend_to_a_perfect_dovetail() {
        let mut ed = EditDist::new(false, 0.06);

        let ext = ed.extend_alignment(10, 14, 10, S60, S60);

        assert_eq!(ext.kind, OverlapKind::Dovetail);
        assert_eq!(ext.errors, 0);
        assert_eq!(ext.s_lo, 0);
        assert_eq!(ext.t_lo, 0);
        assert_eq!(ext.s_hi, 59);
        assert_eq!(ext.t_hi, 59);
        assert!(ed.left_delta.is_empty());
    }

    #[test]
    fn one_substitution_costs_one_error_and_no_delta() {
        let mut ed = EditDist::new(false, 0.06);

        let mut t = S60.to_vec();
        t[40] = match t[40] {
            b'a' => b'c',
            _ => b'a',
        };

        let ext = ed.extend_alignment(0, 14, 0, S60, &t);

        assert_eq!(ext.kind, OverlapKind::Dovetail);
        assert_eq!(ext.errors, 1);
        assert_eq!(ext.s_hi, 59);
        assert_eq!(ext.t_hi, 59);
        // Substitutions carry no indel, so the delta stays empty
        assert!(ed.left_delta.is_empty());
    }

    #[test]
    fn one_insertion_costs_one_error_and_one_delta() {
        let mut ed = EditDist::new(false, 0.06);

        let mut t = S60.to_vec();
        let ins = if t[40] == b'g' { b'c' } else { b'g' };
        t.insert(40, ins);

        let ext = ed.extend_alignment(0, 14, 0, S60, &t);

        assert_eq!(ext.kind, OverlapKind::Dovetail);
        assert_eq!(ext.errors, 1);
        assert_eq!(ext.s_hi, 59);
        assert_eq!(ext.t_hi, 60);
        assert_eq!(ed.left_delta.len(), 1);
    }

    #[test]
    fn unknown_characters_match_anything() {
        let mut ed = EditDist::new(false, 0.06);

        let mut t = S60.to_vec();
        t[30] = b'n';
        t[45] = b'n';

        let ext = ed.extend_alignment(0, 14, 0, S60, &t);

        assert_eq!(ext.kind, OverlapKind::Dovetail);
        assert_eq!(ext.errors, 0);
    }

    #[test]
    fn diverging_tails_stop_at_a_branch_point() {
        let mut ed = EditDist::new(false, 0.06);

        let mut s = S60[..14].to_vec();
        s.extend(std::iter::repeat(b'a').take(100));
        let mut t = S60[..14].to_vec();
        t.extend(std::iter::repeat(b'c').take(100));

        let ext = ed.extend_alignment(0, 14, 0, &s, &t);

        // The left side is flush with the start; the right side diverges
        assert_eq!(ext.kind, OverlapKind::RightBranchPt);
    }
}
