use std::fmt;
use std::marker::PhantomData;

use crate::framework::{MapError, ReduceError, ResourceError};
use crate::genomics::TraversalUnit;

/// Gate deciding whether a unit is visited.
///
/// Must be a pure function of the unit: it sees neither the accumulator nor
/// any mutable state. A rejected unit is neither mapped nor folded.
pub trait UnitFilter<U> {
    /// Whether to visit `unit`.
    fn accept(&self, unit: &U) -> bool;
}

/// Filter accepting every unit.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl<U> UnitFilter<U> for AcceptAll {
    fn accept(&self, _unit: &U) -> bool {
        true
    }
}

/// Filter backed by a closure.
pub struct FilterFn<U, P> {
    predicate: P,
    unit: PhantomData<fn(&U)>,
}

impl<U, P> FilterFn<U, P>
where
    P: Fn(&U) -> bool,
{
    /// Wrap a predicate.
    pub fn new(predicate: P) -> Self {
        Self {
            predicate,
            unit: PhantomData,
        }
    }
}

impl<U, P> UnitFilter<U> for FilterFn<U, P>
where
    P: Fn(&U) -> bool,
{
    fn accept(&self, unit: &U) -> bool {
        (self.predicate)(unit)
    }
}

impl<U, P> fmt::Debug for FilterFn<U, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterFn").finish_non_exhaustive()
    }
}

/// Per-unit computation.
///
/// The unit type fixes the traversal granularity. Mappers communicate only
/// through their return value; a failure affects that unit alone.
pub trait Mapper {
    /// Unit the mapper consumes.
    type Unit: TraversalUnit;
    /// Value handed to the reducer.
    type Value;

    /// Compute the value for one unit.
    fn map(&self, unit: &Self::Unit) -> Result<Self::Value, MapError>;

    /// Whether `map` writes to an external sink whose output order matters.
    ///
    /// Such mappers only run sequentially.
    fn has_ordered_side_effects(&self) -> bool {
        false
    }
}

/// Mapper backed by a closure.
pub struct MapFn<U, P> {
    func: P,
    unit: PhantomData<fn(&U)>,
}

impl<U, V, P> MapFn<U, P>
where
    P: Fn(&U) -> Result<V, MapError>,
{
    /// Wrap a map function.
    pub fn new(func: P) -> Self {
        Self {
            func,
            unit: PhantomData,
        }
    }
}

impl<U, V, P> Mapper for MapFn<U, P>
where
    U: TraversalUnit,
    P: Fn(&U) -> Result<V, MapError>,
{
    type Unit = U;
    type Value = V;

    fn map(&self, unit: &U) -> Result<V, MapError> {
        (self.func)(unit)
    }
}

impl<U, P> fmt::Debug for MapFn<U, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapFn").finish_non_exhaustive()
    }
}

/// Fold of map values into an accumulator.
///
/// `reduce` must be associative with respect to `reduce_init` for sharded
/// traversals to agree with sequential ones. `combine` merges accumulators of
/// two adjacent coordinate ranges, left before right.
pub trait Reducer<V> {
    /// Reduction state.
    type Accumulator;

    /// Zero value.
    fn reduce_init(&self) -> Self::Accumulator;

    /// Fold one value in.
    fn reduce(
        &self,
        value: V,
        accumulator: Self::Accumulator,
    ) -> Result<Self::Accumulator, ReduceError>;

    /// Whether [`Reducer::combine`] is available.
    fn supports_combine(&self) -> bool {
        false
    }

    /// Merge two partial accumulators; `left` covers lower coordinates.
    fn combine(
        &self,
        _left: Self::Accumulator,
        _right: Self::Accumulator,
    ) -> Result<Self::Accumulator, ReduceError> {
        Err(ReduceError::CombineUnsupported)
    }
}

/// Reducer built from an init and a fold closure, without `combine`.
pub struct FoldReducer<I, F> {
    init: I,
    fold: F,
}

impl<I, F> FoldReducer<I, F> {
    /// Build from closures.
    pub fn new<V, A>(init: I, fold: F) -> Self
    where
        I: Fn() -> A,
        F: Fn(V, A) -> Result<A, ReduceError>,
    {
        Self { init, fold }
    }

    /// Add a combine closure, enabling sharded traversal.
    pub fn with_combine<A, C>(self, combine: C) -> CombiningReducer<I, F, C>
    where
        C: Fn(A, A) -> Result<A, ReduceError>,
    {
        CombiningReducer {
            init: self.init,
            fold: self.fold,
            combine,
        }
    }
}

impl<V, A, I, F> Reducer<V> for FoldReducer<I, F>
where
    I: Fn() -> A,
    F: Fn(V, A) -> Result<A, ReduceError>,
{
    type Accumulator = A;

    fn reduce_init(&self) -> A {
        (self.init)()
    }

    fn reduce(&self, value: V, accumulator: A) -> Result<A, ReduceError> {
        (self.fold)(value, accumulator)
    }
}

impl<I, F> fmt::Debug for FoldReducer<I, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FoldReducer").finish_non_exhaustive()
    }
}

/// Closure reducer with a `combine` step.
pub struct CombiningReducer<I, F, C> {
    init: I,
    fold: F,
    combine: C,
}

impl<V, A, I, F, C> Reducer<V> for CombiningReducer<I, F, C>
where
    I: Fn() -> A,
    F: Fn(V, A) -> Result<A, ReduceError>,
    C: Fn(A, A) -> Result<A, ReduceError>,
{
    type Accumulator = A;

    fn reduce_init(&self) -> A {
        (self.init)()
    }

    fn reduce(&self, value: V, accumulator: A) -> Result<A, ReduceError> {
        (self.fold)(value, accumulator)
    }

    fn supports_combine(&self) -> bool {
        true
    }

    fn combine(&self, left: A, right: A) -> Result<A, ReduceError> {
        (self.combine)(left, right)
    }
}

impl<I, F, C> fmt::Debug for CombiningReducer<I, F, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CombiningReducer").finish_non_exhaustive()
    }
}

/// Consumer finalization.
///
/// `initialize` runs before the first unit. `on_traversal_done` runs exactly
/// once and only after a successful traversal. `release` runs on every exit
/// path once `initialize` has been attempted, success or failure.
pub trait CompletionHook<A> {
    /// What the traversal returns to its caller.
    type Output;

    /// Acquire resources (open sinks, zero buckets).
    fn initialize(&mut self) -> Result<(), ResourceError> {
        Ok(())
    }

    /// Consume the final accumulator.
    fn on_traversal_done(&mut self, accumulator: A) -> Result<Self::Output, ResourceError>;

    /// Release whatever `initialize` acquired.
    fn release(&mut self) {}
}

/// Hook that hands back the accumulator unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReturnAccumulator;

impl<A> CompletionHook<A> for ReturnAccumulator {
    type Output = A;

    fn on_traversal_done(&mut self, accumulator: A) -> Result<A, ResourceError> {
        Ok(accumulator)
    }
}

/// Hook backed by a closure over the final accumulator.
pub struct HookFn<P> {
    func: P,
}

impl<P> HookFn<P> {
    /// Wrap a finalizer.
    pub fn new<A, O>(func: P) -> Self
    where
        P: FnMut(A) -> Result<O, ResourceError>,
    {
        Self { func }
    }
}

impl<A, O, P> CompletionHook<A> for HookFn<P>
where
    P: FnMut(A) -> Result<O, ResourceError>,
{
    type Output = O;

    fn on_traversal_done(&mut self, accumulator: A) -> Result<O, ResourceError> {
        (self.func)(accumulator)
    }
}

impl<P> fmt::Debug for HookFn<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookFn").finish_non_exhaustive()
    }
}
