use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::framework::shard::tree_combine;
use crate::framework::state::StateMachine;
use crate::framework::{
    ExecutionMode, TraversalConfig, TraversalError, TraversalOutcome, TraversalState,
    TraversalSummary, UnitError,
};
use crate::genomics::{
    verify_coordinates, AlignmentRecord, AlignmentSource, AnnotationSource, Granularity,
    ReferenceSource, StreamContext, TraversalSpan, TraversalUnit,
};
use crate::walker::{CompletionHook, Mapper, Reducer, UnitFilter, Walker};

/// Drives adapter → filter → map → reduce, then the completion hook.
///
/// The reference and annotation sources are shared read-only with every
/// shard. One engine may run several traversals one after another; each run
/// starts from [`TraversalState::Idle`].
pub struct TraversalEngine<'r> {
    reference: &'r dyn ReferenceSource,
    annotations: Option<&'r dyn AnnotationSource>,
    config: TraversalConfig,
    machine: StateMachine,
}

impl fmt::Debug for TraversalEngine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraversalEngine")
            .field("contigs", &self.reference.contigs().len())
            .field("annotated", &self.annotations.is_some())
            .field("config", &self.config)
            .field("state", &self.machine.state())
            .finish()
    }
}

/// Accumulator and bookkeeping from one shard (or the whole sequential run).
struct ShardRun<A> {
    accumulator: A,
    summary: TraversalSummary,
}

struct Stages<'w, F, M, R> {
    filter: &'w F,
    mapper: &'w M,
    reducer: &'w R,
}

/// Calls `release` when dropped, whatever path leaves the traversal.
struct ReleaseOnExit<'h, A, H: CompletionHook<A>> {
    hook: &'h mut H,
    accumulator: PhantomData<fn(A)>,
}

impl<'h, A, H: CompletionHook<A>> ReleaseOnExit<'h, A, H> {
    fn new(hook: &'h mut H) -> Self {
        Self {
            hook,
            accumulator: PhantomData,
        }
    }
}

impl<A, H: CompletionHook<A>> Drop for ReleaseOnExit<'_, A, H> {
    fn drop(&mut self) {
        self.hook.release();
    }
}

impl<'r> TraversalEngine<'r> {
    /// Create an engine over a reference.
    pub fn new(reference: &'r dyn ReferenceSource, config: TraversalConfig) -> Self {
        Self {
            reference,
            annotations: None,
            config,
            machine: StateMachine::default(),
        }
    }

    /// Bind an annotation source looked up at every locus.
    pub fn with_annotations(mut self, annotations: &'r dyn AnnotationSource) -> Self {
        self.annotations = Some(annotations);
        self
    }

    /// Access configuration.
    pub fn config(&self) -> &TraversalConfig {
        &self.config
    }

    /// Mutable access to configuration.
    pub fn config_mut(&mut self) -> &mut TraversalConfig {
        &mut self.config
    }

    /// State of the most recent traversal.
    pub fn state(&self) -> TraversalState {
        self.machine.state()
    }

    /// Run a walker over every record of `source`.
    ///
    /// Unit-level failures (map errors, inconsistent reads) are collected in
    /// the returned summary; anything else aborts the run, skips the
    /// completion hook, and still releases the hook's resources.
    pub fn run<F, M, R, H>(
        &mut self,
        source: &dyn AlignmentSource,
        walker: &mut Walker<F, M, R, H>,
    ) -> Result<TraversalOutcome<H::Output>, TraversalError>
    where
        M: Mapper + Sync,
        F: UnitFilter<M::Unit> + Sync,
        R: Reducer<M::Value> + Sync,
        R::Accumulator: Send,
        H: CompletionHook<R::Accumulator>,
    {
        self.machine.reset();
        let (span, shards) = match self.prepare(walker) {
            Ok(prepared) => prepared,
            Err(err) => {
                self.machine.fail();
                return Err(err);
            }
        };

        let stages = Stages {
            filter: &walker.filter,
            mapper: &walker.mapper,
            reducer: &walker.reducer,
        };
        info!(
            "Starting {} traversal '{}' over {} positions in {} interval(s)",
            <M::Unit as TraversalUnit>::GRANULARITY,
            walker.name(),
            span.total_len(),
            span.intervals().len()
        );

        let hook = ReleaseOnExit::new(&mut walker.hook);
        let traversed = self.traverse_with(hook, move |engine| match shards {
            None => engine.traverse_sequential(source.records(), span, &stages),
            Some(shards) => engine.traverse_parallel(source, span, shards, &stages),
        });
        self.finish(traversed)
    }

    /// Run a walker sequentially over a one-shot record stream.
    ///
    /// Accepts any iterator (e.g. records decoded straight from a file) and
    /// places no thread-safety bounds on the stages. Parallel configurations
    /// are rejected since the stream cannot be re-queried per shard.
    pub fn run_stream<I, F, M, R, H>(
        &mut self,
        records: I,
        walker: &mut Walker<F, M, R, H>,
    ) -> Result<TraversalOutcome<H::Output>, TraversalError>
    where
        I: IntoIterator<Item = AlignmentRecord>,
        M: Mapper,
        F: UnitFilter<M::Unit>,
        R: Reducer<M::Value>,
        H: CompletionHook<R::Accumulator>,
    {
        self.machine.reset();
        let prepared = if self.config.is_parallel() {
            Err(TraversalError::invalid_configuration(
                "a one-shot record stream cannot be sharded; use a re-iterable source",
            ))
        } else {
            self.prepare(walker)
        };
        let span = match prepared {
            Ok((span, _)) => span,
            Err(err) => {
                self.machine.fail();
                return Err(err);
            }
        };

        let stages = Stages {
            filter: &walker.filter,
            mapper: &walker.mapper,
            reducer: &walker.reducer,
        };
        let hook = ReleaseOnExit::new(&mut walker.hook);
        let traversed = self.traverse_with(hook, move |engine| {
            engine.traverse_sequential(Box::new(records.into_iter()), span, &stages)
        });
        self.finish(traversed)
    }

    /// Validate configuration against the walker and resolve the span.
    ///
    /// Returns the shard count when the traversal runs in parallel.
    fn prepare<F, M, R, H>(
        &self,
        walker: &Walker<F, M, R, H>,
    ) -> Result<(TraversalSpan, Option<usize>), TraversalError>
    where
        M: Mapper,
        R: Reducer<M::Value>,
    {
        self.config.validate()?;

        let shards = match self.config.mode {
            ExecutionMode::Sequential => None,
            ExecutionMode::Parallel { shards } => {
                if walker.mapper.has_ordered_side_effects() {
                    return Err(TraversalError::invalid_configuration(format!(
                        "walker '{}' writes ordered output and cannot run in parallel",
                        walker.name()
                    )));
                }
                if walker.reducer.supports_combine() {
                    Some(shards)
                } else {
                    warn!(
                        "Walker '{}' has no combine step; falling back to sequential traversal",
                        walker.name()
                    );
                    None
                }
            }
        };

        let span = TraversalSpan::resolve(self.reference, self.config.intervals.as_deref())?;
        Ok((span, shards))
    }

    /// Initialize the hook, traverse, and finalize; the guard releases on every path.
    fn traverse_with<A, H, T>(
        &mut self,
        mut guard: ReleaseOnExit<'_, A, H>,
        traverse: T,
    ) -> Result<(H::Output, TraversalSummary), TraversalError>
    where
        H: CompletionHook<A>,
        T: FnOnce(&Self) -> Result<ShardRun<A>, TraversalError>,
    {
        self.machine.advance(TraversalState::Initializing);
        if let Err(err) = guard.hook.initialize() {
            return Err(err.into());
        }

        self.machine.advance(TraversalState::Traversing);
        let ShardRun {
            accumulator,
            summary,
        } = traverse(&*self)?;

        self.machine.advance(TraversalState::Finalizing);
        let output = guard.hook.on_traversal_done(accumulator)?;
        drop(guard);
        Ok((output, summary))
    }

    fn finish<O>(
        &mut self,
        traversed: Result<(O, TraversalSummary), TraversalError>,
    ) -> Result<TraversalOutcome<O>, TraversalError> {
        match traversed {
            Ok((output, mut summary)) => {
                self.machine.advance(TraversalState::Done);
                summary.final_state = TraversalState::Done;
                report(&summary);
                Ok(TraversalOutcome { output, summary })
            }
            Err(err) => {
                self.machine.fail();
                warn!("Traversal failed: {err}");
                Err(err)
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.config
            .cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }

    fn tracks(&self) -> Vec<Arc<str>> {
        match (&self.config.tracks, self.annotations) {
            (Some(names), Some(_)) => names.iter().map(|name| Arc::from(name.as_str())).collect(),
            (None, Some(source)) => source.tracks(),
            (_, None) => Vec::new(),
        }
    }

    fn traverse_sequential<F, M, R>(
        &self,
        records: Box<dyn Iterator<Item = AlignmentRecord> + '_>,
        span: TraversalSpan,
        stages: &Stages<'_, F, M, R>,
    ) -> Result<ShardRun<R::Accumulator>, TraversalError>
    where
        M: Mapper,
        F: UnitFilter<M::Unit>,
        R: Reducer<M::Value>,
    {
        let tracks = self.tracks();
        self.traverse_shard(None, records, span, &tracks, stages)
    }

    fn traverse_parallel<F, M, R>(
        &self,
        source: &dyn AlignmentSource,
        span: TraversalSpan,
        shards: usize,
        stages: &Stages<'_, F, M, R>,
    ) -> Result<ShardRun<R::Accumulator>, TraversalError>
    where
        M: Mapper + Sync,
        F: UnitFilter<M::Unit> + Sync,
        R: Reducer<M::Value> + Sync,
        R::Accumulator: Send,
    {
        verify_coordinates(
            source.records(),
            self.reference,
            &span,
            <M::Unit as TraversalUnit>::GRANULARITY,
        )?;

        let parts = span.partition(shards);
        debug!("Partitioned {} positions into {} shard(s)", span.total_len(), parts.len());
        let tracks = self.tracks();

        let runs: Vec<Result<ShardRun<R::Accumulator>, TraversalError>> = parts
            .into_par_iter()
            .enumerate()
            .map(|(index, part)| {
                if self.is_cancelled() {
                    return Err(TraversalError::Cancelled { units_visited: 0 });
                }
                let intervals = part.to_intervals();
                let records = source.overlapping(&intervals);
                self.traverse_shard(Some(index), records, part, &tracks, stages)
            })
            .collect();

        let shard_count = runs.len();
        let mut accumulators = Vec::with_capacity(shard_count);
        let mut summary = TraversalSummary::new(<M::Unit as TraversalUnit>::GRANULARITY);
        for run in runs {
            let run = run?;
            accumulators.push(run.accumulator);
            summary.absorb(run.summary);
        }
        if self.is_cancelled() {
            return Err(TraversalError::Cancelled {
                units_visited: summary.units_visited,
            });
        }
        summary.shards = shard_count;

        let accumulator = tree_combine::<M::Value, R>(stages.reducer, accumulators)?;
        Ok(ShardRun {
            accumulator,
            summary,
        })
    }

    fn traverse_shard<F, M, R>(
        &self,
        shard: Option<usize>,
        records: Box<dyn Iterator<Item = AlignmentRecord> + '_>,
        span: TraversalSpan,
        tracks: &[Arc<str>],
        stages: &Stages<'_, F, M, R>,
    ) -> Result<ShardRun<R::Accumulator>, TraversalError>
    where
        M: Mapper,
        F: UnitFilter<M::Unit>,
        R: Reducer<M::Value>,
    {
        let granularity = <M::Unit as TraversalUnit>::GRANULARITY;
        let context = StreamContext {
            reference: self.reference,
            annotations: self.annotations,
            tracks,
            span,
            visit_uncovered: self.config.visit_uncovered,
        };
        let mut stream = <M::Unit as TraversalUnit>::open(records, context);
        let mut summary = TraversalSummary::new(granularity);
        let mut accumulator = stages.reducer.reduce_init();

        for unit in stream.by_ref() {
            let unit = unit?;
            if self.is_cancelled() {
                return Err(TraversalError::Cancelled {
                    units_visited: summary.units_visited,
                });
            }
            if let Some(limit) = self.config.max_units {
                if summary.units_visited >= limit {
                    warn!("Stopping after {limit} {granularity} units (unit limit reached)");
                    break;
                }
            }
            summary.units_visited += 1;

            if !stages.filter.accept(&unit) {
                summary.units_filtered += 1;
            } else {
                match stages.mapper.map(&unit) {
                    Ok(value) => {
                        summary.units_mapped += 1;
                        accumulator = stages.reducer.reduce(value, accumulator)?;
                    }
                    Err(error) => {
                        warn!("Skipping {granularity} at {}:{}: {error}", unit.contig(), unit.position());
                        summary.map_errors.push(UnitError {
                            contig: Arc::clone(unit.contig()),
                            position: unit.position(),
                            error,
                        });
                    }
                }
            }

            let interval = self.config.progress_interval;
            if interval > 0 && summary.units_visited % interval == 0 {
                log_progress(shard, granularity, &unit, summary.units_visited);
            }
        }

        summary.pileup_warnings = stream.take_warnings();
        summary.reads = stream.read_counts();
        Ok(ShardRun {
            accumulator,
            summary,
        })
    }
}

fn log_progress<U: TraversalUnit>(shard: Option<usize>, granularity: Granularity, unit: &U, visited: u64) {
    match shard {
        Some(index) => info!(
            "[PROGRESS] shard {index}: traversed to {}:{}, {visited} {granularity} units",
            unit.contig(),
            unit.position()
        ),
        None => info!(
            "[PROGRESS] traversed to {}:{}, {visited} {granularity} units",
            unit.contig(),
            unit.position()
        ),
    }
}

fn report(summary: &TraversalSummary) {
    info!(
        "Traversal complete: {} {} units visited, {} mapped, {} skipped ({} filtered, {} map errors) in {} shard(s)",
        summary.units_visited,
        summary.granularity,
        summary.units_mapped,
        summary.skipped_units(),
        summary.units_filtered,
        summary.map_errors.len(),
        summary.shards
    );
    let reads = &summary.reads;
    if reads.skipped() > 0 {
        info!(
            "Reads skipped: {} of {} ({} unmapped, {} secondary, {} without alignment start, {} inconsistent, {} outside intervals)",
            reads.skipped(),
            reads.seen,
            reads.unmapped,
            reads.secondary,
            reads.no_alignment_start,
            reads.inconsistent,
            reads.outside_intervals
        );
    }
}
