#[cfg(test)]
mod tests {
    use seqoverlap::cli::opts::parse_range;
    use seqoverlap::overlap::kmer::*;

    /* --------------------------------------------------------------------- */
    /*  base coding                                                          */
    /* --------------------------------------------------------------------- */

    #[test]
    fn bit_equivalent_matches_two_bit_coding() {
        assert_eq!(bit_equivalent(b'a'), 0);
        assert_eq!(bit_equivalent(b'c'), 1);
        assert_eq!(bit_equivalent(b'g'), 2);
        assert_eq!(bit_equivalent(b't'), 3);
        assert_eq!(bit_equivalent(b'A'), 0);
        assert_eq!(bit_equivalent(b'T'), 3);
    }

    #[test]
    fn bad_characters_are_everything_but_acgt() {
        for b in [b'a', b'c', b'g', b't', b'A', b'C', b'G', b'T'] {
            assert!(!is_bad(b));
        }
        for b in [b'n', b'N', b'x', b'-', b' ', 0u8] {
            assert!(is_bad(b));
        }
    }

    #[test]
    fn reverse_complement_in_place() {
        let mut seq = b"acgtn".to_vec();
        reverse_complement(&mut seq);
        assert_eq!(seq, b"nacgt");

        // An even-length palindrome maps to itself
        let mut pal = b"acgt".to_vec();
        reverse_complement(&mut pal);
        assert_eq!(pal, b"acgt");
    }

    #[test]
    fn pack_kmer_places_first_base_in_low_bits() {
        assert_eq!(pack_kmer(b"aa"), 0);
        assert_eq!(pack_kmer(b"ca"), 1);
        assert_eq!(pack_kmer(b"ac"), 4);
        assert_eq!(pack_kmer(b"tt"), 0b1111);
    }

    /* --------------------------------------------------------------------- */
    /*  hash functions                                                       */
    /* --------------------------------------------------------------------- */

    #[test]
    fn hash_functions_stay_in_range() {
        let params = HashParams::new(14, 12).unwrap();
        assert_eq!(params.table_size(), 1 << 12);

        // A handful of arbitrary keys; packing 28 significant bits
        for key in [0u64, 1, 0xfff, 0xfff_ffff, 0x5a5_a5a5, 0xcafe_babe & 0xfff_ffff] {
            assert!(params.bucket(key) < params.table_size());
            assert!(params.check_bit(key) < 32);

            let probe = params.probe(key);
            assert!(probe % 2 == 1, "probe must be odd");
            assert!(probe >= 1 && probe < params.table_size());
        }
    }

    #[test]
    fn probe_traverses_whole_table() {
        // Odd step on a power-of-two table touches every bucket once
        let params = HashParams::new(14, 8).unwrap();
        let probe = params.probe(0x123_4567);
        let size = params.table_size();

        let mut seen = vec![false; size];
        let mut sub = 0usize;
        for _ in 0..size {
            assert!(!seen[sub]);
            seen[sub] = true;
            sub = (sub + probe) % size;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn hash_params_reject_bad_combinations() {
        assert!(HashParams::new(0, 22).is_err());
        assert!(HashParams::new(32, 22).is_err()); // 2k >= 64
        assert!(HashParams::new(10, 22).is_err()); // mask wider than the key folds
        assert!(HashParams::new(14, 22).is_ok());
    }

    /* --------------------------------------------------------------------- */
    /*  range option parsing                                                 */
    /* --------------------------------------------------------------------- */

    #[test]
    fn parse_range_accepts_pair_and_single() {
        assert_eq!(parse_range("1-100").unwrap(), (1, 100));
        assert_eq!(parse_range("7").unwrap(), (7, 7));
        assert!(parse_range("0-5").is_err());
        assert!(parse_range("9-2").is_err());
        assert!(parse_range("x-2").is_err());
    }
}
