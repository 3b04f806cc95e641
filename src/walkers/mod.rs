//! Concrete walkers built on the traversal engine.
//!
//! Each walker pairs a mapper with a reducer (usually the same unit struct)
//! and relies on the default completion hook unless it owns an output sink.

mod depth;
mod emit;
mod histogram;
mod indel;
mod mismatch;
mod quality;

pub use depth::{CoverageSummary, DepthOfCoverage};
pub use emit::{CountUnits, PrintReads, SamOutput, SamWriterHook};
pub use histogram::Histogram;
pub use indel::{IndelCounter, IndelTally};
pub use mismatch::{MismatchCounter, MismatchTally, ReadMismatches};
pub use quality::QualityHistogram;

use crate::genomics::ContigInfo;
use crate::walker::{AcceptAll, ReturnAccumulator, Walker};

/// Base quality histogram walker.
pub fn quality_histogram() -> Walker<AcceptAll, QualityHistogram, QualityHistogram, ReturnAccumulator> {
    Walker::new("QualityHistogram", QualityHistogram, QualityHistogram)
}

/// Per-read mismatch walker.
pub fn mismatch_counter() -> Walker<AcceptAll, MismatchCounter, MismatchCounter, ReturnAccumulator> {
    Walker::new("MismatchCounter", MismatchCounter, MismatchCounter)
}

/// Per-locus indel walker.
pub fn indel_counter() -> Walker<AcceptAll, IndelCounter, IndelCounter, ReturnAccumulator> {
    Walker::new("IndelCounter", IndelCounter, IndelCounter)
}

/// Depth of coverage walker.
pub fn depth_of_coverage() -> Walker<AcceptAll, DepthOfCoverage, DepthOfCoverage, ReturnAccumulator> {
    Walker::new("DepthOfCoverage", DepthOfCoverage, DepthOfCoverage)
}

/// Read re-emission walker writing SAM through htslib into `output`.
///
/// The output is opened when the traversal initializes its hook.
pub fn print_reads(
    output: SamOutput,
    contigs: Vec<ContigInfo>,
) -> Walker<AcceptAll, PrintReads, CountUnits<()>, SamWriterHook> {
    let hook = SamWriterHook::new(output, contigs);
    Walker::new("PrintReads", hook.mapper(), CountUnits::new()).with_hook(hook)
}
