use crate::framework::{CancellationToken, TraversalError};
use crate::genomics::GenomicInterval;

/// Default number of units between progress lines.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 100_000;

/// How units are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// One thread, strict coordinate order.
    #[default]
    Sequential,
    /// Disjoint contiguous shards on worker threads, merged with `combine`.
    Parallel {
        /// Requested shard count (at least 1).
        shards: usize,
    },
}

/// Configuration parameters for one traversal.
#[derive(Debug, Clone)]
pub struct TraversalConfig {
    /// Scheduling mode.
    pub mode: ExecutionMode,
    /// Restrict the traversal to these intervals (`None` = whole reference).
    pub intervals: Option<Vec<GenomicInterval>>,
    /// Stop after this many units have been pulled from the adapter.
    pub max_units: Option<u64>,
    /// Visit loci no read covers (locus granularity).
    pub visit_uncovered: bool,
    /// Units between progress lines; 0 disables them.
    pub progress_interval: u64,
    /// Optional host cancellation signal.
    pub cancellation: Option<CancellationToken>,
    /// Annotation tracks to bind at each locus (`None` = every track the source has).
    pub tracks: Option<Vec<String>>,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Sequential,
            intervals: None,
            max_units: None,
            visit_uncovered: false,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            cancellation: None,
            tracks: None,
        }
    }
}

impl TraversalConfig {
    /// Sequential traversal over the whole reference.
    pub fn sequential() -> Self {
        Self::default()
    }

    /// Parallel traversal with the given shard count.
    pub fn parallel(shards: usize) -> Self {
        Self::default().with_mode(ExecutionMode::Parallel { shards })
    }

    /// Set the scheduling mode.
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Restrict to intervals.
    pub fn with_intervals(mut self, intervals: Vec<GenomicInterval>) -> Self {
        self.intervals = Some(intervals);
        self
    }

    /// Stop after `max_units` units.
    pub fn with_max_units(mut self, max_units: u64) -> Self {
        self.max_units = Some(max_units);
        self
    }

    /// Visit loci without coverage.
    pub fn with_visit_uncovered(mut self, enabled: bool) -> Self {
        self.visit_uncovered = enabled;
        self
    }

    /// Set the progress interval (0 disables progress lines).
    pub fn with_progress_interval(mut self, units: u64) -> Self {
        self.progress_interval = units;
        self
    }

    /// Attach a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Bind only the named annotation tracks.
    pub fn with_tracks<I, S>(mut self, tracks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tracks = Some(tracks.into_iter().map(Into::into).collect());
        self
    }

    /// Whether this configuration runs shards.
    pub fn is_parallel(&self) -> bool {
        matches!(self.mode, ExecutionMode::Parallel { .. })
    }

    /// Reject settings that can never run.
    pub fn validate(&self) -> Result<(), TraversalError> {
        if let ExecutionMode::Parallel { shards } = self.mode {
            if shards == 0 {
                return Err(TraversalError::invalid_configuration(
                    "parallel mode needs at least one shard",
                ));
            }
            if self.max_units.is_some() {
                return Err(TraversalError::invalid_configuration(
                    "a unit limit cannot be split across shards; run sequentially",
                ));
            }
        }
        if matches!(&self.intervals, Some(intervals) if intervals.is_empty()) {
            return Err(TraversalError::invalid_configuration(
                "interval list is empty",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sequential_with_progress() {
        let config = TraversalConfig::default();
        assert_eq!(config.mode, ExecutionMode::Sequential);
        assert_eq!(config.progress_interval, DEFAULT_PROGRESS_INTERVAL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_unusable_settings() {
        assert!(TraversalConfig::parallel(0).validate().is_err());
        assert!(TraversalConfig::parallel(4).with_max_units(10).validate().is_err());
        assert!(TraversalConfig::sequential().with_intervals(Vec::new()).validate().is_err());
        assert!(TraversalConfig::parallel(4).validate().is_ok());
    }
}
