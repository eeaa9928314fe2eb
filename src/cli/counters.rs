/// Per-worker statistics, folded into run totals after each batch.
/// The window-rejection counters are kept for stats-file compatibility;
/// nothing increments them without quality data.
#[derive(Debug, Default)]
pub struct OverlapCounters {
    pub total_overlaps: u64,
    pub contained: u64,
    pub dovetail: u64,
    pub kmer_hits_with_olap: u64,
    pub kmer_hits_without_olap: u64,
    pub kmer_hits_skipped: u64,
    pub multi_overlap: u64,
    pub bad_short_window: u64,
    pub bad_long_window: u64,
}

impl std::ops::AddAssign for OverlapCounters {
    fn add_assign(&mut self, other: Self) {
        self.total_overlaps += other.total_overlaps;
        self.contained += other.contained;
        self.dovetail += other.dovetail;
        self.kmer_hits_with_olap += other.kmer_hits_with_olap;
        self.kmer_hits_without_olap += other.kmer_hits_without_olap;
        self.kmer_hits_skipped += other.kmer_hits_skipped;
        self.multi_overlap += other.multi_overlap;
        self.bad_short_window += other.bad_short_window;
        self.bad_long_window += other.bad_long_window;
    }
}
