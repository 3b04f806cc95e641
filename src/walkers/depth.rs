use crate::framework::{MapError, ReduceError};
use crate::genomics::LocusUnit;
use crate::walker::{Mapper, Reducer};
use crate::walkers::Histogram;

/// Per-locus depth distribution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CoverageSummary {
    /// Loci visited, keyed by depth.
    pub depths: Histogram<u32>,
    /// Sum of depth over every locus.
    pub total_depth: u64,
}

impl CoverageSummary {
    /// Loci visited.
    pub fn loci(&self) -> u64 {
        self.depths.total()
    }

    /// Mean depth over visited loci (0 when none were visited).
    pub fn mean_depth(&self) -> f64 {
        match self.loci() {
            0 => 0.0,
            loci => self.total_depth as f64 / loci as f64,
        }
    }

    /// Loci with depth at least `threshold`.
    pub fn loci_at_least(&self, threshold: u32) -> u64 {
        self.depths
            .iter()
            .filter(|(depth, _)| *depth >= threshold)
            .map(|(_, count)| count)
            .sum()
    }
}

/// Depth of coverage at every visited locus.
///
/// Depth counts base and indel observations alike. Combine with
/// `visit_uncovered` to include zero-depth loci.
#[derive(Debug, Clone, Copy, Default)]
pub struct DepthOfCoverage;

impl Mapper for DepthOfCoverage {
    type Unit = LocusUnit;
    type Value = u32;

    fn map(&self, unit: &LocusUnit) -> Result<u32, MapError> {
        u32::try_from(unit.pileup.depth())
            .map_err(|_| MapError::new(format!("depth at {} overflows", unit.locus())))
    }
}

impl Reducer<u32> for DepthOfCoverage {
    type Accumulator = CoverageSummary;

    fn reduce_init(&self) -> CoverageSummary {
        CoverageSummary::default()
    }

    fn reduce(&self, depth: u32, mut summary: CoverageSummary) -> Result<CoverageSummary, ReduceError> {
        summary.depths.increment(depth);
        summary.total_depth += u64::from(depth);
        Ok(summary)
    }

    fn supports_combine(&self) -> bool {
        true
    }

    fn combine(&self, left: CoverageSummary, right: CoverageSummary) -> Result<CoverageSummary, ReduceError> {
        Ok(CoverageSummary {
            depths: left.depths.merge(right.depths),
            total_depth: left.total_depth + right.total_depth,
        })
    }
}
