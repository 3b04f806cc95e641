use std::sync::Arc;

use thiserror::Error;

/// Input stream violates the coordinate contract (fatal).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedInputError {
    /// A record started before the record that preceded it.
    #[error("records not sorted by coordinate: {contig}:{start} follows {previous_contig}:{previous_start}")]
    Unsorted {
        /// Contig of the offending record.
        contig: Arc<str>,
        /// Start (1-based) of the offending record.
        start: u32,
        /// Contig of the preceding record.
        previous_contig: Arc<str>,
        /// Start (1-based) of the preceding record.
        previous_start: u32,
    },

    /// A record names a contig missing from the reference dictionary.
    #[error("contig '{contig}' is not present in the reference")]
    UnknownContig {
        /// Contig name as given by the record.
        contig: Arc<str>,
    },

    /// A record extends past the bounds of its contig.
    #[error("alignment {contig}:{start}-{end} falls outside contig of length {length}")]
    OutOfRange {
        /// Contig name.
        contig: Arc<str>,
        /// First aligned position (1-based).
        start: u32,
        /// Last aligned position (1-based, inclusive).
        end: u32,
        /// Contig length from the reference dictionary.
        length: u32,
    },

    /// A traversal interval does not fit the reference.
    #[error("interval {0} falls outside the reference")]
    IntervalOutOfRange(String),
}

/// A read whose block structure disagrees with its declared span (non-fatal).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("read '{read}' at {contig}:{start} excluded from pileup: {reason}")]
pub struct PileupConsistencyError {
    /// Read name.
    pub read: Arc<str>,
    /// Contig of the read.
    pub contig: Arc<str>,
    /// Alignment start (1-based).
    pub start: u32,
    /// Description of the disagreement.
    pub reason: String,
}

/// Consumer map logic failed for one unit (non-fatal).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("map failed: {0}")]
pub struct MapError(pub String);

impl MapError {
    /// Build a map error from any message.
    pub fn new(msg: impl Into<String>) -> Self {
        MapError(msg.into())
    }
}

/// Fold or combine failed (fatal).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReduceError {
    /// The reducer rejected a value.
    #[error("reduce failed: {0}")]
    Fold(String),

    /// Two partial accumulators could not be merged.
    #[error("combine failed: {0}")]
    Combine(String),

    /// Tree-reduce requested from a reducer that has no combine operation.
    #[error("reducer does not support combining partial accumulators")]
    CombineUnsupported,
}

/// Failure acquiring, writing or releasing an external resource (fatal).
#[derive(Debug, Error)]
pub enum ResourceError {
    /// Underlying I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure reported by the consumer's own resource handling.
    #[error("{0}")]
    Other(String),
}

impl ResourceError {
    /// Helper for constructing consumer-originated resource errors.
    pub fn other(msg: impl Into<String>) -> Self {
        ResourceError::Other(msg.into())
    }
}

/// Errors that abort a whole traversal.
#[derive(Debug, Error)]
pub enum TraversalError {
    /// Unsorted or out-of-range input.
    #[error("malformed input: {0}")]
    MalformedInput(#[from] MalformedInputError),

    /// Fold or combine failed.
    #[error(transparent)]
    Reduce(#[from] ReduceError),

    /// External resource failure.
    #[error("resource error: {0}")]
    Resource(#[from] ResourceError),

    /// Configuration rejected before any unit was visited.
    #[error("invalid traversal configuration: {0}")]
    InvalidConfiguration(String),

    /// Cancellation was requested by the host.
    #[error("traversal cancelled after {units_visited} units")]
    Cancelled {
        /// Units visited before the cancellation took effect.
        units_visited: u64,
    },
}

impl TraversalError {
    /// Helper for constructing configuration errors.
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        TraversalError::InvalidConfiguration(msg.into())
    }
}
