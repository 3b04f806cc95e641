//! # Reference-Ordered Traversal over Read Alignments
//!
//! This library visits a coordinate-sorted alignment stream either read by
//! read or locus by locus, and folds per-unit values into a single result.
//!
//! ## Pipeline
//!
//! 1. **Stream adapter**: validates sort order and yields read or pileup units
//! 2. **Filter**: consumer predicate deciding which units reach the mapper
//! 3. **Map**: per-unit computation, failures reported but not fatal
//! 4. **Reduce**: fold in coordinate order, or per shard plus a tree-combine
//! 5. **Completion hook**: runs once after a successful traversal
//!
//! ## Usage Example
//!
//! ```ignore
//! use locuswalk::{walkers, TraversalConfig, TraversalEngine};
//!
//! let mut engine = TraversalEngine::new(&reference, TraversalConfig::parallel(4));
//! let outcome = engine.run(&alignments, &mut walkers::quality_histogram())?;
//! print!("{}", outcome.output);
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![allow(clippy::new_without_default)]

pub mod framework; // Engine, configuration, errors and state machine
pub mod genomics; // Records, reference, pileups and stream adapters
pub mod walker; // Stage traits and the walker bundle
pub mod walkers; // Concrete consumers

pub use framework::{
    CancellationToken, ExecutionMode, TraversalConfig, TraversalEngine, TraversalError,
    TraversalOutcome, TraversalState, TraversalSummary,
};
pub use genomics::{
    AlignmentRecord, AlignmentSource, GenomicInterval, InMemoryAlignments, InMemoryReference,
    Locus, LocusUnit, Pileup, ReadUnit, ReferenceSource,
};
pub use walker::{CompletionHook, Mapper, Reducer, UnitFilter, Walker};
