#[cfg(test)]
mod tests {
    use seqoverlap::overlap::index::HashIndex;
    use seqoverlap::overlap::kmer::pack_kmer;
    use seqoverlap::overlap::store::MemStore;
    use seqoverlap::overlap::Config;
    use std::io::Write;

    const K: usize = 14;

    fn test_config() -> Config {
        Config {
            kmer_len: K,
            hash_mask_bits: 12,
            min_olap_len: 40,
            ..Config::default()
        }
    }

    // A 40-base sequence without repeated 14-mers
    const READ40: &[u8] = b"acgattgcacgtcaagtcgcttgcatgctgcagtaacgct";

    /* --------------------------------------------------------------------- */
    /*  chains and coalescing                                               */
    /* --------------------------------------------------------------------- */

    #[test]
    fn duplicate_kmer_forms_a_terminated_chain() {
        let mut store = MemStore::new();
        store.push(READ40);
        store.push(READ40);

        let cfg = test_config();
        let params = cfg.hash_params().unwrap();
        let (ix, next) = HashIndex::build(&cfg, params, &store, 1, 2).unwrap();

        assert_eq!(next, 3);
        assert_eq!(ix.string_ct, 2);

        // Probe the first k-mer of the read; both occurrences must be on
        // the chain and the final one must carry the last flag.
        let key = pack_kmer(&READ40[..K]);
        let found = ix.find(key, params.bucket(key), READ40);
        assert!(!found.r.is_empty());
        assert!(!found.hi_hits);

        let mut nums = vec![];
        let mut r = found.r;
        let mut at = found.chain_at;
        loop {
            nums.push(r.string_num());
            assert_eq!(r.offset(), 0);
            if r.is_last() {
                break;
            }
            at += 1;
            r = ix.overflow_ref(at);
        }
        nums.sort_unstable();
        assert_eq!(nums, vec![0, 1]);
    }

    #[test]
    fn read_of_length_k_is_a_single_entry() {
        let mut store = MemStore::new();
        store.push(&READ40[..K]);

        let cfg = Config { min_olap_len: K, ..test_config() };
        let params = cfg.hash_params().unwrap();
        let (ix, _) = HashIndex::build(&cfg, params, &store, 1, 1).unwrap();

        assert_eq!(ix.hash_entries(), 1);

        let key = pack_kmer(&READ40[..K]);
        let found = ix.find(key, params.bucket(key), &READ40[..K]);
        assert!(!found.r.is_empty());
        assert!(found.r.is_last());
    }

    /* --------------------------------------------------------------------- */
    /*  rejection paths                                                      */
    /* --------------------------------------------------------------------- */

    #[test]
    fn short_reads_keep_their_slot_but_no_entries() {
        let mut store = MemStore::new();
        store.push(b"acgtacgt"); // below min overlap length
        store.push(READ40);

        let cfg = test_config();
        let params = cfg.hash_params().unwrap();
        let (ix, next) = HashIndex::build(&cfg, params, &store, 1, 2).unwrap();

        assert_eq!(next, 3);
        assert_eq!(ix.string_ct, 2);
        assert_eq!(ix.skipped_short, 1);
        assert_eq!(ix.read_info(0).length, 0);
        assert_eq!(ix.read_info(1).length, 40);
        // Ids stay dense: string 1 is read 2
        assert_eq!(ix.global_id(1), 2);
    }

    #[test]
    fn all_unknown_read_contributes_nothing() {
        let mut store = MemStore::new();
        store.push(&vec![b'n'; 50]);

        let cfg = test_config();
        let params = cfg.hash_params().unwrap();
        let (ix, _) = HashIndex::build(&cfg, params, &store, 1, 1).unwrap();

        assert_eq!(ix.hash_entries(), 0);
    }

    /* --------------------------------------------------------------------- */
    /*  batch budgets                                                        */
    /* --------------------------------------------------------------------- */

    #[test]
    fn data_budget_splits_the_range_into_batches() {
        let mut store = MemStore::new();
        store.push(READ40);
        store.push(READ40);
        store.push(READ40);

        let cfg = Config { max_hash_data_len: 50, ..test_config() };
        let params = cfg.hash_params().unwrap();

        // First batch takes two reads: the cap is checked before each read
        let (ix, next) = HashIndex::build(&cfg, params, &store, 1, 3).unwrap();
        assert_eq!(ix.string_ct, 2);
        assert_eq!(next, 3);

        // Second batch resumes at the first unread id
        let (ix, next) = HashIndex::build(&cfg, params, &store, next, 3).unwrap();
        assert_eq!(ix.string_ct, 1);
        assert_eq!(ix.first_id, 3);
        assert_eq!(next, 4);
    }

    /* --------------------------------------------------------------------- */
    /*  screening                                                            */
    /* --------------------------------------------------------------------- */

    #[test]
    fn high_hit_kmers_are_screened_and_mark_read_ends() {
        let mut store = MemStore::new();
        for _ in 0..4 {
            store.push(READ40);
        }

        let cfg = Config { kmer_hit_limit: Some(3), ..test_config() };
        let params = cfg.hash_params().unwrap();
        let (ix, _) = HashIndex::build(&cfg, params, &store, 1, 4).unwrap();

        // Every k-mer occurs four times, past the limit
        let key = pack_kmer(&READ40[..K]);
        let found = ix.find(key, params.bucket(key), READ40);
        assert!(found.hi_hits);
        assert!(found.r.is_empty());

        // Occurrences sit within HOPELESS_MATCH of both ends of a 40-base
        // read, so both ends are screened
        for num in 0..4 {
            assert!(ix.read_info(num).left_screened);
            assert!(ix.read_info(num).right_screened);
        }
    }

    #[test]
    fn skip_file_screens_present_and_absent_kmers() {
        let mut store = MemStore::new();
        store.push(READ40);

        let present = &READ40[..K];
        let absent = b"gggggggggggggg";

        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "{}", std::str::from_utf8(present).unwrap()).unwrap();
        writeln!(f, "{}", std::str::from_utf8(absent).unwrap()).unwrap();
        f.flush().unwrap();

        let cfg = Config { skip_file: Some(f.path().to_path_buf()), ..test_config() };
        let params = cfg.hash_params().unwrap();
        let (ix, _) = HashIndex::build(&cfg, params, &store, 1, 1).unwrap();

        let key = pack_kmer(present);
        let found = ix.find(key, params.bucket(key), present);
        assert!(found.hi_hits, "listed k-mer must be screened");

        // The absent k-mer was inserted as a screened entry
        let key = pack_kmer(absent);
        let found = ix.find(key, params.bucket(key), absent);
        assert!(found.hi_hits, "absent listed k-mer must still screen");
    }
}
