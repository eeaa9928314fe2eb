use anyhow::{bail, Context, Result};
use seq_io::fasta::{Reader, Record};
use std::path::Path;

use crate::overlap::index::MAX_READ_LEN;

/// Supplier of reads for both the hash and reference ranges.
///
/// Ids are 1-based and dense; bases are lowercase with non-ACGT characters
/// preserved as-is (they are screened later). Implementations must be safe
/// to share read-only across worker threads.
pub trait ReadStore: Send + Sync {
    /// Highest read id in the store.
    fn last_id(&self) -> u32;

    /// Length in bases of read `id`.
    fn length(&self, id: u32) -> u32;

    /// Replace `out` with the bases of read `id`.
    fn bases(&self, id: u32, out: &mut Vec<u8>);
}

/// In-memory store; the test mock and the backing of [`FastaStore`].
#[derive(Debug, Default)]
pub struct MemStore {
    reads: Vec<Vec<u8>>,
}

impl MemStore {
    pub fn new() -> Self {
        MemStore { reads: Vec::new() }
    }

    /// Append a read, returning its 1-based id.
    pub fn push(&mut self, seq: &[u8]) -> u32 {
        let lower: Vec<u8> = seq.iter().map(|b| b.to_ascii_lowercase()).collect();
        self.reads.push(lower);
        self.reads.len() as u32
    }
}

impl ReadStore for MemStore {
    fn last_id(&self) -> u32 {
        self.reads.len() as u32
    }

    fn length(&self, id: u32) -> u32 {
        self.reads[(id - 1) as usize].len() as u32
    }

    fn bases(&self, id: u32, out: &mut Vec<u8>) {
        out.clear();
        out.extend_from_slice(&self.reads[(id - 1) as usize]);
    }
}

/// On-disk store: a FASTA file loaded fully into memory at open so that
/// worker access is lock-free.
pub struct FastaStore {
    inner: MemStore,
}

impl FastaStore {
    pub fn open(path: &Path) -> Result<Self> {
        let mut reader = Reader::from_path(path)
            .context(format!("opening read store {:?}", path))?;
        let mut inner = MemStore::new();
        while let Some(rec) = reader.next() {
            let rec = rec.context(format!("parsing read store {:?}", path))?;
            // Strip line breaks; seq() spans the raw record body.
            let seq: Vec<u8> = rec
                .seq()
                .iter()
                .copied()
                .filter(|b| *b != b'\n' && *b != b'\r')
                .collect();
            if seq.len() > MAX_READ_LEN {
                bail!(
                    "read {} is {} bases; longest supported is {}",
                    inner.last_id() + 1,
                    seq.len(),
                    MAX_READ_LEN
                );
            }
            inner.push(&seq);
        }
        if inner.last_id() == 0 {
            bail!("read store {:?} contains no reads", path);
        }
        Ok(FastaStore { inner })
    }
}

impl ReadStore for FastaStore {
    fn last_id(&self) -> u32 {
        self.inner.last_id()
    }

    fn length(&self, id: u32) -> u32 {
        self.inner.length(id)
    }

    fn bases(&self, id: u32, out: &mut Vec<u8>) {
        self.inner.bases(id, out)
    }
}
