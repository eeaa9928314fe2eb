#[cfg(test)]
mod tests {
    use seqoverlap::overlap::driver::run_overlaps;
    use seqoverlap::overlap::kmer;
    use seqoverlap::overlap::output::{make_full_record, OverlapWriter, Placement};
    use seqoverlap::overlap::process::OlapInfo;
    use seqoverlap::overlap::store::MemStore;
    use seqoverlap::overlap::{Config, Direction};
    use std::path::Path;
    use std::sync::Mutex;

    fn test_config() -> Config {
        Config {
            kmer_len: 14,
            hash_mask_bits: 12,
            min_olap_len: 40,
            ..Config::default()
        }
    }

    fn run_engine(cfg: &Config, store: &MemStore, path: &Path) {
        let out = Mutex::new(OverlapWriter::create(path).unwrap());
        run_overlaps(cfg, store, &out).unwrap();
        out.lock().unwrap().finish().unwrap();
    }

    fn read_records(path: &Path) -> Vec<Vec<String>> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| l.split('\t').map(String::from).collect())
            .collect()
    }

    // 40 bases, no repeated 14-mer
    const READ40: &[u8] = b"acgattgcacgtcaagtcgcttgcatgctgcagtaacgct";

    // 100 bases over {a,c}: 5-char binary counter blocks, so no aligned
    // window repeats and the reverse complement shares no k-mer with it
    const AC100: &[u8] = b"aaaaaaaaacaaacaaaaccaacaaaacacaaccaaaccc\
                           acaaaacaacacacaacaccaccaaaccacacccaacccc\
                           caaaacaaaccaacacaacc";

    /* --------------------------------------------------------------------- */
    /*  literal end-to-end scenarios                                         */
    /* --------------------------------------------------------------------- */

    #[test]
    fn identical_reads_give_one_perfect_overlap() {
        let mut store = MemStore::new();
        store.push(READ40);
        store.push(READ40);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("olaps.txt");
        run_engine(&test_config(), &store, &path);

        let recs = read_records(&path);
        assert_eq!(recs.len(), 1);
        // The scanned read is not left of the alignment, so the target
        // leads the record
        assert_eq!(recs[0][..8].join("\t"), "2\t1\tN\t0\t0\t39\t0\tUTG");
    }

    #[test]
    fn reverse_complement_read_gives_one_flipped_overlap() {
        let mut b = AC100.to_vec();
        kmer::reverse_complement(&mut b);

        let mut store = MemStore::new();
        store.push(AC100);
        store.push(&b);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("olaps.txt");
        run_engine(&test_config(), &store, &path);

        let recs = read_records(&path);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0][..8].join("\t"), "2\t1\tI\t0\t0\t99\t0\tUTG");
    }

    // 80 mixed bases; every window carries a g or t so the {a,c} flanks
    // cannot seed against it
    const CORE80: &[u8] = b"gtacctgaacgtgcattagcttcgaacgcatgactgatcgtgcaagtcgtacgttcgatggcatcaacttagcgtacgtc";

    fn suffix_prefix_reads() -> (Vec<u8>, Vec<u8>) {
        // a: 120-base {a,c} flank, then the shared 80
        let mut a: Vec<u8> = b"ac".repeat(60);
        a.extend_from_slice(CORE80);

        // b: the shared 80 with three substitutions, then a different flank
        let mut core = CORE80.to_vec();
        for pos in [20usize, 40, 60] {
            core[pos] = if core[pos] == b'a' { b'g' } else { b'a' };
        }
        let mut b = core;
        b.extend(b"aacc".repeat(30));

        (a, b)
    }

    #[test]
    fn shared_suffix_prefix_with_three_substitutions() {
        let (a, b) = suffix_prefix_reads();

        let mut store = MemStore::new();
        store.push(&a);
        store.push(&b);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("olaps.txt");
        run_engine(&test_config(), &store, &path);

        let recs = read_records(&path);
        assert_eq!(recs.len(), 1);
        // 3 errors over 80 bases: 375 in 0.01% units
        assert_eq!(recs[0][..8].join("\t"), "1\t2\tN\t120\t120\t79\t375\tUTG");
    }

    #[test]
    fn partial_mode_reports_forward_canonical_hangs() {
        let (a, b) = suffix_prefix_reads();

        let mut store = MemStore::new();
        store.push(&a);
        store.push(&b);

        let cfg = Config { partial_overlaps: true, ..test_config() };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("olaps.txt");
        run_engine(&cfg, &store, &path);

        let recs = read_records(&path);
        assert_eq!(recs.len(), 1);
        assert_eq!(
            recs[0].join("\t"),
            "1\t2\tN\t120\t0\t0\t120\t79\t375\tOBT,DUP"
        );
    }

    #[test]
    fn contained_read_reports_container_first() {
        // Read 1 is bases 50..150 of read 2
        let mut b: Vec<u8> = b"ac".repeat(25);
        b.extend_from_slice(CORE80);
        b.extend_from_slice(&CORE80[..20]);
        b.extend(b"aacc".repeat(12));
        b.extend(b"ca");
        let a = b[50..150].to_vec();
        assert_eq!(b.len(), 200);

        let mut store = MemStore::new();
        store.push(&a);
        store.push(&b);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("olaps.txt");
        run_engine(&test_config(), &store, &path);

        let recs = read_records(&path);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0][..8].join("\t"), "2\t1\tN\t50\t-50\t99\t0\tUTG");
    }

    #[test]
    fn single_shared_kmer_in_unrelated_reads_yields_nothing() {
        let k14 = b"gatcgtacgttgca";

        let mut a = vec![b'a'; 93];
        a.extend_from_slice(k14);
        a.extend(vec![b'a'; 93]);

        let mut b = vec![b'c'; 93];
        b.extend_from_slice(k14);
        b.extend(vec![b'c'; 93]);

        let mut store = MemStore::new();
        store.push(&a);
        store.push(&b);

        // The hopeless check drops the singleton seed outright
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("olaps.txt");
        run_engine(&test_config(), &store, &path);
        assert_eq!(read_records(&path).len(), 0);

        // Without it the branch-point heuristic aborts both extensions
        let cfg = Config { use_hopeless_check: false, ..test_config() };
        let path = dir.path().join("olaps2.txt");
        run_engine(&cfg, &store, &path);
        assert_eq!(read_records(&path).len(), 0);
    }

    #[test]
    fn read_of_length_k_never_overlaps_itself() {
        let mut store = MemStore::new();
        store.push(&READ40[..14]);

        let cfg = Config { min_olap_len: 14, ..test_config() };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("olaps.txt");
        run_engine(&cfg, &store, &path);
        assert_eq!(read_records(&path).len(), 0);
    }

    /* --------------------------------------------------------------------- */
    /*  canonicalisation corner                                              */
    /* --------------------------------------------------------------------- */

    #[test]
    fn reverse_containment_is_rewritten_from_outtie_to_innie() {
        // Scanned strand is reverse, sits left, and its right hang covers
        // the target: the outtie form is regularized to innie with the
        // hang signs inverted.
        let olap = OlapInfo {
            s_lo: 10,
            s_hi: 99,
            t_lo: 0,
            t_hi: 89,
            quality: 0.0,
            delta: vec![],
            s_left_boundary: 10,
            s_right_boundary: 99,
            t_left_boundary: 0,
            t_right_boundary: 89,
            min_diag: -10,
            max_diag: -10,
        };

        let (rec, contained) =
            make_full_record(1, 100, Direction::Reverse, 2, 90, &olap, false);

        assert_eq!(rec.a_iid, 1);
        assert_eq!(rec.b_iid, 2);
        assert!(rec.flipped);
        assert!(contained);
        assert_eq!(rec.placement, Placement::Full { a_hang: 0, b_hang: -10 });
        assert_eq!(rec.span, 89);
    }
}
