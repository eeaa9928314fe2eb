use anyhow::{bail, Result};

/// Sentinel for a base that could not be called. Matches anything during
/// banded extension but never during exact seed comparison.
pub const UNKNOWN_CHAR: u8 = b'n';

/// Static ASCII→2-bit lookup table.
/// 0 = A, 1 = C, 2 = G, 3 = T; anything else maps to 0 and must be
/// rejected separately via `is_bad`.
static BIT_EQUIVALENT: [u8; 256] = {
    let mut t = [0u8; 256];
    t[b'a' as usize] = 0;
    t[b'A' as usize] = 0;
    t[b'c' as usize] = 1;
    t[b'C' as usize] = 1;
    t[b'g' as usize] = 2;
    t[b'G' as usize] = 2;
    t[b't' as usize] = 3;
    t[b'T' as usize] = 3;
    t
};

/// Per-character flag marking everything that is not a/c/g/t.
static CHAR_IS_BAD: [bool; 256] = {
    let mut t = [true; 256];
    t[b'a' as usize] = false;
    t[b'A' as usize] = false;
    t[b'c' as usize] = false;
    t[b'C' as usize] = false;
    t[b'g' as usize] = false;
    t[b'G' as usize] = false;
    t[b't' as usize] = false;
    t[b'T' as usize] = false;
    t
};

/// 2-bit code of a single base, as a `u64` ready for shifting into a key.
#[inline(always)]
pub fn bit_equivalent(b: u8) -> u64 {
    BIT_EQUIVALENT[b as usize] as u64
}

/// True for any character outside {a,c,g,t} (either case).
#[inline(always)]
pub fn is_bad(b: u8) -> bool {
    CHAR_IS_BAD[b as usize]
}

/// Complement of a single lowercase base; non-ACGT becomes the unknown char.
#[inline]
pub fn complement(b: u8) -> u8 {
    match b {
        b'a' => b't',
        b'c' => b'g',
        b'g' => b'c',
        b't' => b'a',
        _ => UNKNOWN_CHAR,
    }
}

/// Reverse-complement a lowercase sequence in place.
pub fn reverse_complement(seq: &mut [u8]) {
    seq.reverse();
    for b in seq.iter_mut() {
        *b = complement(*b);
    }
}

/// Pack the first `k` bases of `window` into a k-mer key.
/// Base at position j occupies bits 2j..2j+2.
pub fn pack_kmer(window: &[u8]) -> u64 {
    let mut key = 0u64;
    for (j, &b) in window.iter().enumerate() {
        key |= bit_equivalent(b) << (2 * j);
    }
    key
}

/// The four key-derived functions of the hash index, plus the shift
/// constants they share. All must be jointly near-uniform over random
/// k-mers; the shifts fold high key bits down into each result.
#[derive(Debug, Clone, Copy)]
pub struct HashParams {
    pub kmer_len: usize,
    pub mask_bits: u32,
    table_size: usize,
    hash_mask: u64,
    hsf1: u32,
    hsf2: u32,
    sv1: u32,
    sv2: u32,
    sv3: u32,
}

/// Bits available for the per-bucket check vector (one u32 per bucket).
const HASH_CHECK_MASK: u64 = 0x1f;

/// Byte-wide signature stored per bucket entry.
const CHECK_MASK: u64 = 0xff;

/// Probe steps are odd values in 1..=63, coprime with the table size.
const PROBE_MASK: u64 = 0x3e;

impl HashParams {
    pub fn new(kmer_len: usize, mask_bits: u32) -> Result<Self> {
        if kmer_len == 0 {
            bail!("k-mer length is required");
        }
        if 2 * kmer_len >= 64 {
            bail!("k-mer length {kmer_len} too large; need 2k < 64");
        }
        // Shift constants would go negative otherwise.
        if (2 * kmer_len as u32) < mask_bits + 2 || (kmer_len as u32) < mask_bits / 2 {
            bail!(
                "k-mer length {kmer_len} too small for {mask_bits} hash mask bits"
            );
        }
        let k = kmer_len as u32;
        let hsf1 = k - mask_bits / 2;
        let hsf2 = 2 * k - mask_bits;
        Ok(HashParams {
            kmer_len,
            mask_bits,
            table_size: 1usize << mask_bits,
            hash_mask: (1u64 << mask_bits) - 1,
            hsf1,
            hsf2,
            sv1: hsf1 + 2,
            sv2: (hsf1 + hsf2) / 2,
            sv3: hsf2 - 2,
        })
    }

    /// Number of buckets (a power of two).
    #[inline]
    pub fn table_size(&self) -> usize {
        self.table_size
    }

    /// Primary hash: bucket subscript for a key.
    #[inline]
    pub fn bucket(&self, key: u64) -> usize {
        ((key ^ (key >> self.hsf1) ^ (key >> self.hsf2)) & self.hash_mask) as usize
    }

    /// Bit position in the bucket's check vector.
    #[inline]
    pub fn check_bit(&self, key: u64) -> u32 {
        ((key ^ (key >> self.sv1) ^ (key >> self.sv2)) & HASH_CHECK_MASK) as u32
    }

    /// 8-bit signature compared before any string comparison.
    #[inline]
    pub fn key_check(&self, key: u64) -> u8 {
        ((key ^ (key >> self.sv1) ^ (key >> self.sv3)) & CHECK_MASK) as u8
    }

    /// Secondary probe step; forced odd so every bucket is visited.
    #[inline]
    pub fn probe(&self, key: u64) -> usize {
        (((key ^ (key >> self.sv2) ^ (key >> self.sv3)) & PROBE_MASK) | 1) as usize
    }
}
