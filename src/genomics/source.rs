use crate::genomics::{AlignmentRecord, GenomicInterval};

/// Re-iterable supply of coordinate-sorted alignment records.
///
/// Sharded traversals query the source once per shard from worker threads,
/// so implementations must be shareable.
pub trait AlignmentSource: Send + Sync {
    /// Every record in file order.
    fn records(&self) -> Box<dyn Iterator<Item = AlignmentRecord> + '_>;

    /// Records whose aligned span touches any of `intervals`, in file order.
    ///
    /// The default scans [`AlignmentSource::records`]; indexed sources override it.
    fn overlapping<'s>(
        &'s self,
        intervals: &'s [GenomicInterval],
    ) -> Box<dyn Iterator<Item = AlignmentRecord> + 's> {
        Box::new(self.records().filter(move |record| {
            !record.unmapped
                && record.start > 0
                && intervals.iter().any(|interval| {
                    interval.contig == record.contig
                        && record.start <= interval.end
                        && record.end().max(record.start) >= interval.start
                })
        }))
    }
}

/// Records held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAlignments {
    records: Vec<AlignmentRecord>,
}

impl InMemoryAlignments {
    /// Wrap already-sorted records.
    pub fn new(records: Vec<AlignmentRecord>) -> Self {
        Self { records }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no record is held.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Borrow the records.
    pub fn as_slice(&self) -> &[AlignmentRecord] {
        &self.records
    }
}

impl From<Vec<AlignmentRecord>> for InMemoryAlignments {
    fn from(records: Vec<AlignmentRecord>) -> Self {
        Self::new(records)
    }
}

impl AlignmentSource for InMemoryAlignments {
    fn records(&self) -> Box<dyn Iterator<Item = AlignmentRecord> + '_> {
        Box::new(self.records.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genomics::Strand;

    #[test]
    fn overlapping_keeps_reads_touching_intervals() {
        let source = InMemoryAlignments::new(vec![
            AlignmentRecord::gapless("chr1", 1, b"ACG".to_vec(), vec![30u8; 3], Strand::Forward),
            AlignmentRecord::gapless("chr1", 3, b"GTA".to_vec(), vec![30u8; 3], Strand::Forward),
            AlignmentRecord::gapless("chr1", 9, b"AC".to_vec(), vec![30u8; 2], Strand::Forward),
            AlignmentRecord::gapless("chr2", 4, b"AC".to_vec(), vec![30u8; 2], Strand::Forward)
                .with_unmapped(true),
        ]);
        let intervals = vec![GenomicInterval::new("chr1", 4, 6), GenomicInterval::contig("chr2")];
        let starts: Vec<u32> = source.overlapping(&intervals).map(|r| r.start).collect();
        assert_eq!(starts, vec![3]);
        assert_eq!(source.records().count(), 4);
    }
}
