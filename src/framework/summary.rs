use std::collections::HashSet;
use std::sync::Arc;

use crate::framework::{MapError, PileupConsistencyError, TraversalState};
use crate::genomics::{Granularity, ReadCounts};

/// A unit whose map step failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitError {
    /// Contig of the unit.
    pub contig: Arc<str>,
    /// Position of the unit (read start or locus).
    pub position: u32,
    /// What the mapper reported.
    pub error: MapError,
}

/// Bookkeeping reported alongside the final accumulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalSummary {
    /// Unit kind traversed.
    pub granularity: Granularity,
    /// State the engine ended in.
    pub final_state: TraversalState,
    /// Units pulled from the adapter.
    pub units_visited: u64,
    /// Units the filter rejected.
    pub units_filtered: u64,
    /// Units mapped and folded.
    pub units_mapped: u64,
    /// Units whose map step failed, in traversal order.
    pub map_errors: Vec<UnitError>,
    /// Reads excluded from pileups, in traversal order.
    pub pileup_warnings: Vec<PileupConsistencyError>,
    /// Records dropped by the adapter.
    pub reads: ReadCounts,
    /// Shards run (1 for sequential traversals).
    pub shards: usize,
}

impl TraversalSummary {
    pub(crate) fn new(granularity: Granularity) -> Self {
        Self {
            granularity,
            final_state: TraversalState::Idle,
            units_visited: 0,
            units_filtered: 0,
            units_mapped: 0,
            map_errors: Vec::new(),
            pileup_warnings: Vec::new(),
            reads: ReadCounts::default(),
            shards: 1,
        }
    }

    /// Units that contributed nothing: filtered out or failed in map.
    pub fn skipped_units(&self) -> u64 {
        self.units_filtered + self.map_errors.len() as u64
    }

    /// Fold a later shard's bookkeeping into this one.
    ///
    /// A read straddling a shard boundary is admitted by every shard it
    /// touches; its pileup warning is kept once.
    pub(crate) fn absorb(&mut self, later: TraversalSummary) {
        self.units_visited += later.units_visited;
        self.units_filtered += later.units_filtered;
        self.units_mapped += later.units_mapped;
        self.map_errors.extend(later.map_errors);
        self.reads.absorb(&later.reads);

        let reported: HashSet<(Arc<str>, Arc<str>, u32)> = self
            .pileup_warnings
            .iter()
            .map(warning_key)
            .collect();
        for warning in later.pileup_warnings {
            if reported.contains(&warning_key(&warning)) {
                self.reads.inconsistent = self.reads.inconsistent.saturating_sub(1);
            } else {
                self.pileup_warnings.push(warning);
            }
        }
    }
}

fn warning_key(warning: &PileupConsistencyError) -> (Arc<str>, Arc<str>, u32) {
    (
        Arc::clone(&warning.read),
        Arc::clone(&warning.contig),
        warning.start,
    )
}

/// Result of a completed traversal.
#[derive(Debug)]
pub struct TraversalOutcome<O> {
    /// Whatever the completion hook produced from the final accumulator.
    pub output: O,
    /// Unit and read bookkeeping.
    pub summary: TraversalSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skipped_units_counts_filters_and_map_failures() {
        let mut summary = TraversalSummary::new(Granularity::Locus);
        summary.units_filtered = 3;
        summary.map_errors.push(UnitError {
            contig: Arc::from("chr1"),
            position: 7,
            error: MapError::new("bad"),
        });
        assert_eq!(summary.skipped_units(), 4);

        let mut later = TraversalSummary::new(Granularity::Locus);
        later.units_visited = 5;
        later.units_filtered = 1;
        summary.absorb(later);
        assert_eq!(summary.units_visited, 5);
        assert_eq!(summary.skipped_units(), 5);
    }

    #[test]
    fn boundary_warnings_are_kept_once() {
        let warning = |read: &str, start: u32| PileupConsistencyError {
            read: Arc::from(read),
            contig: Arc::from("chr1"),
            start,
            reason: "cigar covers 5 bases but read has 4".to_string(),
        };
        let mut left = TraversalSummary::new(Granularity::Locus);
        left.pileup_warnings = vec![warning("a", 3), warning("b", 48)];
        left.reads.inconsistent = 2;
        let mut right = TraversalSummary::new(Granularity::Locus);
        right.pileup_warnings = vec![warning("b", 48), warning("c", 55)];
        right.reads.inconsistent = 2;

        left.absorb(right);
        let names: Vec<&str> = left.pileup_warnings.iter().map(|w| w.read.as_ref()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(left.reads.inconsistent, 3);
    }
}
