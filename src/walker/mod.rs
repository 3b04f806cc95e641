//! Pluggable traversal stages.
//!
//! A walker is composed from four independent pieces: a filter, a mapper,
//! a reducer (optionally with `combine`), and a completion hook. The engine
//! drives them; none of them knows about the others.

mod api;

pub use api::{
    AcceptAll, CombiningReducer, CompletionHook, FilterFn, FoldReducer, HookFn, MapFn, Mapper,
    Reducer, ReturnAccumulator, UnitFilter,
};

/// Filter, map, reduce and completion stages bundled for one traversal.
#[derive(Debug, Clone)]
pub struct Walker<F, M, R, H> {
    name: String,
    /// Unit gate.
    pub filter: F,
    /// Per-unit computation.
    pub mapper: M,
    /// Fold (and optional combine).
    pub reducer: R,
    /// Finalization.
    pub hook: H,
}

impl<M, R> Walker<AcceptAll, M, R, ReturnAccumulator> {
    /// Walker that visits every unit and returns the final accumulator.
    pub fn new(name: impl Into<String>, mapper: M, reducer: R) -> Self {
        Self {
            name: name.into(),
            filter: AcceptAll,
            mapper,
            reducer,
            hook: ReturnAccumulator,
        }
    }
}

impl<F, M, R, H> Walker<F, M, R, H> {
    /// Name used in log lines.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the filter.
    pub fn with_filter<F2>(self, filter: F2) -> Walker<F2, M, R, H> {
        Walker {
            name: self.name,
            filter,
            mapper: self.mapper,
            reducer: self.reducer,
            hook: self.hook,
        }
    }

    /// Replace the completion hook.
    pub fn with_hook<H2>(self, hook: H2) -> Walker<F, M, R, H2> {
        Walker {
            name: self.name,
            filter: self.filter,
            mapper: self.mapper,
            reducer: self.reducer,
            hook,
        }
    }
}
