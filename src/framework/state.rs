use std::fmt;

use tracing::debug;

/// Lifecycle of one traversal.
///
/// `Idle → Initializing → Traversing → Finalizing → Done`; `Failed` is
/// reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum TraversalState {
    /// Not started.
    #[default]
    Idle,
    /// Consumer setup running.
    Initializing,
    /// Units flowing through filter, map and reduce.
    Traversing,
    /// Completion hook running.
    Finalizing,
    /// Finished successfully.
    Done,
    /// Aborted.
    Failed,
}

impl TraversalState {
    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, TraversalState::Done | TraversalState::Failed)
    }

    /// Whether `next` is a legal successor.
    pub fn can_advance_to(self, next: TraversalState) -> bool {
        use TraversalState::*;
        match (self, next) {
            (Idle, Initializing)
            | (Initializing, Traversing)
            | (Traversing, Finalizing)
            | (Finalizing, Done) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for TraversalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TraversalState::Idle => "idle",
            TraversalState::Initializing => "initializing",
            TraversalState::Traversing => "traversing",
            TraversalState::Finalizing => "finalizing",
            TraversalState::Done => "done",
            TraversalState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Current state plus transition logging.
#[derive(Debug, Default)]
pub(crate) struct StateMachine {
    state: TraversalState,
}

impl StateMachine {
    pub(crate) fn state(&self) -> TraversalState {
        self.state
    }

    pub(crate) fn reset(&mut self) {
        self.state = TraversalState::Idle;
    }

    pub(crate) fn advance(&mut self, next: TraversalState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal traversal transition {} -> {}",
            self.state,
            next
        );
        debug!(from = %self.state, to = %next, "traversal state change");
        self.state = next;
    }

    /// Move to `Failed` unless already terminal.
    pub(crate) fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.advance(TraversalState::Failed);
        }
    }
}
