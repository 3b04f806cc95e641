//! Reference-ordered traversal engine.
//!
//! Orchestrates the stream adapter, filter, map and reduce stages in
//! coordinate order, sequentially or over disjoint shards merged with a
//! tree-reduce, and drives the completion hook through the traversal state
//! machine.

mod cancel;
mod config;
mod engine;
mod error;
mod shard;
mod state;
mod summary;

pub use cancel::CancellationToken;
pub use config::{ExecutionMode, TraversalConfig, DEFAULT_PROGRESS_INTERVAL};
pub use engine::TraversalEngine;
pub use error::{
    MalformedInputError, MapError, PileupConsistencyError, ReduceError, ResourceError,
    TraversalError,
};
pub use shard::{tree_combine, ShardNode};
pub use state::TraversalState;
pub use summary::{TraversalOutcome, TraversalSummary, UnitError};
