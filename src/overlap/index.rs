use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::overlap::kmer::{self, pack_kmer, HashParams};
use crate::overlap::store::ReadStore;
use crate::overlap::{Config, ENTRIES_PER_BUCKET, HASH_KMER_SKIP, HOPELESS_MATCH};

/// Packed reference to one k-mer occurrence:
///
/// ```text
/// [ last (1) ][ empty (1) ][ unused ][ offset (17) ][ string_num (13) ]
/// ```
///
/// `string_num` indexes reads within the current batch, `offset` the k-mer
/// start within that read. After chain coalescing a bucket entry with both
/// flag bits clear and `last` unset reinterprets the two fields as a single
/// index into the overflow array.
pub const STRING_NUM_BITS: u32 = 13;
pub const OFFSET_BITS: u32 = 17;
pub const STRING_NUM_MASK: u64 = (1 << STRING_NUM_BITS) - 1;
pub const OFFSET_MASK: u64 = (1 << OFFSET_BITS) - 1;
pub const MAX_STRING_NUM: u64 = STRING_NUM_MASK;
pub const MAX_READ_LEN: usize = 1 << OFFSET_BITS;

const BIT_EMPTY: u32 = 62;
const BIT_LAST: u32 = 63;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KmerRef(u64);

impl KmerRef {
    /// Fill value of the next-ref chain array.
    pub const NONE: KmerRef = KmerRef(u64::MAX);

    pub fn new(string_num: usize, offset: usize) -> Self {
        KmerRef(string_num as u64 | ((offset as u64) << STRING_NUM_BITS))
    }

    #[inline]
    pub fn string_num(self) -> usize {
        (self.0 & STRING_NUM_MASK) as usize
    }

    #[inline]
    pub fn offset(self) -> usize {
        ((self.0 >> STRING_NUM_BITS) & OFFSET_MASK) as usize
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        (self.0 >> BIT_EMPTY) & 1 == 1
    }

    #[inline]
    pub fn is_last(self) -> bool {
        (self.0 >> BIT_LAST) & 1 == 1
    }

    pub fn set_string_num(&mut self, v: usize) {
        self.0 = (self.0 & !STRING_NUM_MASK) | v as u64;
    }

    pub fn set_offset(&mut self, v: usize) {
        self.0 = (self.0 & !(OFFSET_MASK << STRING_NUM_BITS)) | ((v as u64) << STRING_NUM_BITS);
    }

    pub fn set_empty(&mut self, v: bool) {
        self.0 = (self.0 & !(1 << BIT_EMPTY)) | ((v as u64) << BIT_EMPTY);
    }

    pub fn set_last(&mut self, v: bool) {
        self.0 = (self.0 & !(1 << BIT_LAST)) | ((v as u64) << BIT_LAST);
    }
}

/// One open-addressing bucket. `check` holds the 8-bit key signatures,
/// `hits` the saturating occurrence counts used by high-hit screening.
struct Bucket {
    entries: [KmerRef; ENTRIES_PER_BUCKET],
    check: [u8; ENTRIES_PER_BUCKET],
    hits: [u16; ENTRIES_PER_BUCKET],
    entry_ct: u8,
}

impl Bucket {
    fn new() -> Self {
        Bucket {
            entries: [KmerRef(0); ENTRIES_PER_BUCKET],
            check: [0; ENTRIES_PER_BUCKET],
            hits: [0; ENTRIES_PER_BUCKET],
            entry_ct: 0,
        }
    }
}

/// Per hash-read info kept for the life of a batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadInfo {
    pub length: u32,
    pub left_screened: bool,
    pub right_screened: bool,
}

/// Result of a probe: the resolved reference (empty bit set when nothing
/// usable was found), the overflow subscript it came from, and whether the
/// entry was screened out.
pub struct Found {
    pub r: KmerRef,
    pub chain_at: usize,
    pub hi_hits: bool,
}

/// Hash index over one batch of reads. Read-only once built; destroyed at
/// batch end. Buckets refer into the overflow array by integer index, the
/// overflow array into the base arena by integer offset.
pub struct HashIndex {
    params: HashParams,
    buckets: Vec<Bucket>,
    check_vector: Vec<u32>,
    bases: Vec<u8>,
    string_start: Vec<usize>,
    read_info: Vec<ReadInfo>,
    next_ref: Vec<KmerRef>,
    overflow: Vec<KmerRef>,

    /// Store id of in-batch string number 0.
    pub first_id: u32,
    /// Reads occupying slots in this batch (including skipped ones).
    pub string_ct: usize,
    /// Reads skipped for being shorter than the minimum overlap length.
    pub skipped_short: u64,
    hash_entries: u64,

    extra_string_ct: usize,
    extra_string_subcount: usize,
    max_extra_subcount: usize,
}

impl HashIndex {
    /// Build an index over a contiguous range of reads starting at `bgn_id`,
    /// honouring the entry-count, base-count and read-count budgets.
    /// Returns the index and the first id that was not loaded.
    pub fn build(
        cfg: &Config,
        params: HashParams,
        store: &dyn ReadStore,
        bgn_id: u32,
        end_id: u32,
    ) -> Result<(HashIndex, u32)> {
        let table_size = params.table_size();
        let mut ix = HashIndex {
            params,
            buckets: (0..table_size).map(|_| Bucket::new()).collect(),
            check_vector: vec![0; table_size],
            bases: Vec::new(),
            string_start: Vec::new(),
            read_info: Vec::new(),
            next_ref: Vec::new(),
            overflow: Vec::new(),
            first_id: bgn_id,
            string_ct: 0,
            skipped_short: 0,
            hash_entries: 0,
            extra_string_ct: 0,
            extra_string_subcount: usize::MAX,
            max_extra_subcount: MAX_READ_LEN / cfg.kmer_len,
        };

        let entry_limit =
            (cfg.max_hash_load * table_size as f64 * ENTRIES_PER_BUCKET as f64) as u64;

        let mut buf: Vec<u8> = Vec::new();
        let mut id = bgn_id;

        while id <= end_id
            && (ix.string_ct as u64) < MAX_STRING_NUM
            && ix.bases.len() < cfg.max_hash_data_len
            && ix.hash_entries < entry_limit
        {
            let len = store.length(id) as usize;

            ix.string_start.push(ix.bases.len());

            if len < cfg.min_olap_len {
                // Keep the slot so string numbers stay dense with ids.
                ix.read_info.push(ReadInfo::default());
                ix.skipped_short += 1;
                ix.string_ct += 1;
                id += 1;
                continue;
            }

            if len > MAX_READ_LEN {
                bail!("read {id} is {len} bases; longest supported is {MAX_READ_LEN}");
            }

            store.bases(id, &mut buf);
            for b in buf.iter_mut() {
                *b = b.to_ascii_lowercase();
            }

            ix.bases.extend_from_slice(&buf);
            while ix.bases.len() % (1 + HASH_KMER_SKIP) != 0 {
                ix.bases.push(0);
            }
            ix.next_ref
                .resize(ix.bases.len() / (1 + HASH_KMER_SKIP) + 1, KmerRef::NONE);

            ix.read_info.push(ReadInfo {
                length: len as u32,
                left_screened: false,
                right_screened: false,
            });

            ix.put_string_in_hash(cfg, ix.string_ct)?;

            ix.string_ct += 1;
            id += 1;
        }

        if let Some(path) = &cfg.skip_file {
            ix.mark_skip_kmers(cfg, path)?;
        }

        if let Some(limit) = cfg.kmer_hit_limit {
            ix.mark_high_hit_kmers(limit);
        }

        ix.coalesce_chains();

        Ok((ix, id))
    }

    #[inline]
    pub fn table_size(&self) -> usize {
        self.params.table_size()
    }

    #[inline]
    pub fn global_id(&self, string_num: usize) -> u32 {
        self.first_id + string_num as u32
    }

    #[inline]
    pub fn read_info(&self, string_num: usize) -> ReadInfo {
        self.read_info[string_num]
    }

    /// Bases of a real read (not an extra skip-kmer string).
    pub fn read_bases(&self, string_num: usize) -> &[u8] {
        let start = self.string_start[string_num];
        &self.bases[start..start + self.read_info[string_num].length as usize]
    }

    #[inline]
    pub fn overflow_ref(&self, at: usize) -> KmerRef {
        self.overflow[at]
    }

    #[inline]
    pub fn check_vector_has(&self, sub: usize, shift: u32) -> bool {
        self.check_vector[sub] & (1u32 << shift) != 0
    }

    #[inline]
    pub fn hash_entries(&self) -> u64 {
        self.hash_entries
    }

    /// Search for the k-mer whose bases are `window[..k]` with key `key`,
    /// starting from bucket `sub`. A returned reference with the empty bit
    /// set means either "not present" or "screened"; `hi_hits` separates
    /// the screened case.
    pub fn find(&self, key: u64, sub: usize, window: &[u8]) -> Found {
        let k = self.params.kmer_len;
        let key_check = self.params.key_check(key);
        let probe = self.params.probe(key);
        let table_size = self.table_size();

        let mut not_found = KmerRef(0);
        not_found.set_empty(true);

        let mut sub = sub;
        for _ in 0..table_size {
            let b = &self.buckets[sub];
            for i in 0..b.entry_ct as usize {
                if b.check[i] != key_check {
                    continue;
                }
                let mut h_ref = b.entries[i];
                let mut chain_at = 0usize;
                let is_empty = h_ref.is_empty();
                if !h_ref.is_last() && !is_empty {
                    chain_at = (h_ref.string_num() << OFFSET_BITS) + h_ref.offset();
                    h_ref = self.overflow[chain_at];
                }
                let t = self.string_start[h_ref.string_num()] + h_ref.offset();
                if &self.bases[t..t + k] == &window[..k] {
                    if is_empty {
                        h_ref.set_empty(true);
                        return Found { r: h_ref, chain_at, hi_hits: true };
                    }
                    return Found { r: h_ref, chain_at, hi_hits: false };
                }
            }
            if (b.entry_ct as usize) < ENTRIES_PER_BUCKET {
                return Found { r: not_found, chain_at: 0, hi_hits: false };
            }
            sub = (sub + probe) % table_size;
        }

        Found { r: not_found, chain_at: 0, hi_hits: false }
    }

    /// Slide a window over read `string_num` and insert every k-mer that is
    /// stride-aligned and free of non-ACGT characters.
    fn put_string_in_hash(&mut self, cfg: &Config, string_num: usize) -> Result<()> {
        let k = cfg.kmer_len;
        let len = self.read_info[string_num].length as usize;
        if len < k {
            return Ok(());
        }

        let start = self.string_start[string_num];

        let mut key = 0u64;
        let mut key_is_bad = 0u64;
        for j in 0..k {
            let b = self.bases[start + j];
            key_is_bad |= (kmer::is_bad(b) as u64) << j;
            key |= kmer::bit_equivalent(b) << (2 * j);
        }

        let mut r = KmerRef::new(string_num, 0);
        r.set_empty(false);

        if key_is_bad == 0 {
            self.insert(key, r, start)?;
        }

        let mut skip_ct = 0usize;
        for p in 1..=(len - k) {
            r.set_offset(p);

            skip_ct += 1;
            if skip_ct > HASH_KMER_SKIP {
                skip_ct = 0;
            }

            let b = self.bases[start + p + k - 1];
            key_is_bad >>= 1;
            key_is_bad |= (kmer::is_bad(b) as u64) << (k - 1);
            key >>= 2;
            key |= kmer::bit_equivalent(b) << (2 * (k - 1));

            if skip_ct == 0 && key_is_bad == 0 {
                self.insert(key, r, start + p)?;
            }
        }

        Ok(())
    }

    /// Insert `r` (whose bases start at arena offset `at`) under `key`.
    /// A duplicate k-mer threads the previous head into the next-ref chain;
    /// a full probe cycle is a fatal misconfiguration.
    fn insert(&mut self, key: u64, mut r: KmerRef, at: usize) -> Result<()> {
        let k = self.params.kmer_len;
        let mut sub = self.params.bucket(key);
        let shift = self.params.check_bit(key);
        let key_check = self.params.key_check(key);
        let probe = self.params.probe(key);
        let table_size = self.table_size();

        self.check_vector[sub] |= 1u32 << shift;

        for _ in 0..table_size {
            for i in 0..self.buckets[sub].entry_ct as usize {
                if self.buckets[sub].check[i] != key_check {
                    continue;
                }
                let h_ref = self.buckets[sub].entries[i];
                let t = self.string_start[h_ref.string_num()] + h_ref.offset();
                if self.bases[t..t + k] == self.bases[at..at + k] {
                    self.next_ref[at / (1 + HASH_KMER_SKIP)] = h_ref;
                    r.set_last(false);
                    self.buckets[sub].entries[i] = r;
                    self.buckets[sub].hits[i] = self.buckets[sub].hits[i].saturating_add(1);
                    return Ok(());
                }
            }
            let ct = self.buckets[sub].entry_ct as usize;
            if ct < ENTRIES_PER_BUCKET {
                r.set_last(true);
                self.buckets[sub].entries[ct] = r;
                self.buckets[sub].check[ct] = key_check;
                self.buckets[sub].hits[ct] = 1;
                self.buckets[sub].entry_ct += 1;
                self.hash_entries += 1;
                return Ok(());
            }
            sub = (sub + probe) % table_size;
        }

        bail!("hash table full; raise --hash-bits or lower --hash-load")
    }

    /// Load the frequent-k-mer file and mark every listed k-mer (and its
    /// reverse complement) empty, inserting screened entries for absentees.
    fn mark_skip_kmers(&mut self, cfg: &Config, path: &Path) -> Result<()> {
        let k = cfg.kmer_len;
        let content = std::fs::read_to_string(path)
            .context(format!("reading k-mer skip file {:?}", path))?;

        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('>') {
                continue;
            }
            if line.len() != k {
                bail!(
                    "k-mer skip file {:?} line {}: expected length {}, got {}",
                    path,
                    lineno + 1,
                    k,
                    line.len()
                );
            }
            let mut seq: Vec<u8> = line.bytes().map(|b| b.to_ascii_lowercase()).collect();

            self.hash_mark_empty(cfg, pack_kmer(&seq), &seq)?;

            kmer::reverse_complement(&mut seq);
            self.hash_mark_empty(cfg, pack_kmer(&seq), &seq)?;
        }

        Ok(())
    }

    /// Set the empty bit on the entry for `s`, marking screened read ends
    /// along its chain. Absent k-mers are added as screened entries so that
    /// later probes still see them.
    fn hash_mark_empty(&mut self, cfg: &Config, key: u64, s: &[u8]) -> Result<()> {
        let k = cfg.kmer_len;
        let mut sub = self.params.bucket(key);
        let key_check = self.params.key_check(key);
        let probe = self.params.probe(key);
        let table_size = self.table_size();

        for _ in 0..table_size {
            for i in 0..self.buckets[sub].entry_ct as usize {
                if self.buckets[sub].check[i] != key_check {
                    continue;
                }
                let h_ref = self.buckets[sub].entries[i];
                let t = self.string_start[h_ref.string_num()] + h_ref.offset();
                if &self.bases[t..t + k] == s {
                    if !h_ref.is_empty() {
                        self.mark_screened_ends_chain(h_ref);
                    }
                    self.buckets[sub].entries[i].set_empty(true);
                    return Ok(());
                }
            }
            let ct = self.buckets[sub].entry_ct as usize;
            if ct < ENTRIES_PER_BUCKET {
                if cfg.use_hopeless_check {
                    let mut r = self.add_extra_hash_string(s)?;
                    r.set_empty(true);
                    self.buckets[sub].entries[ct] = r;
                    self.buckets[sub].check[ct] = key_check;
                    self.buckets[sub].hits[ct] = 0;
                    self.buckets[sub].entry_ct += 1;
                    self.hash_entries += 1;
                    let shift = self.params.check_bit(key);
                    self.check_vector[sub] |= 1u32 << shift;
                }
                return Ok(());
            }
            sub = (sub + probe) % table_size;
        }

        bail!("hash table full; raise --hash-bits or lower --hash-load")
    }

    /// Append `s` to the arena as part of an "extra string" slot and return
    /// a reference to it. Extra strings pack many screened k-mers so the
    /// offset field stays in range.
    fn add_extra_hash_string(&mut self, s: &[u8]) -> Result<KmerRef> {
        let k = self.params.kmer_len;

        let sub = if self.extra_string_subcount < self.max_extra_subcount {
            self.string_ct + self.extra_string_ct - 1
        } else {
            let sub = self.string_ct + self.extra_string_ct;
            self.string_start.push(self.bases.len());
            self.extra_string_ct += 1;
            self.extra_string_subcount = 0;
            sub
        };

        if sub as u64 > MAX_STRING_NUM {
            bail!("too many screened k-mer strings for this batch; shrink the skip file");
        }

        self.bases.extend_from_slice(s);

        let mut r = KmerRef::new(sub, self.extra_string_subcount * k);
        r.set_last(true);
        r.set_empty(true);
        self.extra_string_subcount += 1;

        Ok(r)
    }

    /// Mark every bucket entry whose occurrence count reached `limit` as
    /// empty, flagging near-end occurrences on the owning reads.
    fn mark_high_hit_kmers(&mut self, limit: u16) {
        for sub in 0..self.buckets.len() {
            for i in 0..self.buckets[sub].entry_ct as usize {
                if self.buckets[sub].hits[i] < limit {
                    continue;
                }
                let h_ref = self.buckets[sub].entries[i];
                if !h_ref.is_empty() {
                    self.mark_screened_ends_chain(h_ref);
                }
                self.buckets[sub].entries[i].set_empty(true);
            }
        }
    }

    fn mark_screened_ends_single(&mut self, r: KmerRef) {
        let num = r.string_num();
        debug_assert!(num < self.string_ct);
        let k = self.params.kmer_len as i32;
        let len = self.read_info[num].length as i32;
        let offset = r.offset() as i32;

        if offset < HOPELESS_MATCH {
            self.read_info[num].left_screened = true;
        }
        if len - offset - k + 1 < HOPELESS_MATCH {
            self.read_info[num].right_screened = true;
        }
    }

    fn mark_screened_ends_chain(&mut self, mut r: KmerRef) {
        self.mark_screened_ends_single(r);
        while !r.is_last() {
            r = self.next_ref[(self.string_start[r.string_num()] + r.offset()) / (1 + HASH_KMER_SKIP)];
            self.mark_screened_ends_single(r);
        }
    }

    /// Copy every multi-occurrence chain into the contiguous overflow array
    /// and rewrite its bucket head as an index into it, then drop the
    /// per-position chain storage.
    fn coalesce_chains(&mut self) {
        for sub in 0..self.buckets.len() {
            for i in 0..self.buckets[sub].entry_ct as usize {
                let head = self.buckets[sub].entries[i];
                if head.is_last() || head.is_empty() {
                    continue;
                }

                let at = self.overflow.len();
                self.buckets[sub].entries[i].set_string_num(at >> OFFSET_BITS);
                self.buckets[sub].entries[i].set_offset(at & OFFSET_MASK as usize);

                let mut r = head;
                self.overflow.push(r);
                while !r.is_last() {
                    r = self.next_ref
                        [(self.string_start[r.string_num()] + r.offset()) / (1 + HASH_KMER_SKIP)];
                    self.overflow.push(r);
                }
            }
        }

        self.next_ref = Vec::new();
    }
}
