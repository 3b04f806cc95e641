use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Context};
use crossbeam_channel::{bounded, Receiver, Sender};
use rust_htslib::bam::{self, Format};
use tracing::{debug, warn};

use crate::framework::{MapError, ReduceError, ResourceError};
use crate::genomics::io::{encode_record, sam_header};
use crate::genomics::{AlignmentRecord, ContigInfo, ReadUnit};
use crate::walker::{CompletionHook, Mapper, Reducer};

/// Reads buffered between the traversal and the writer thread.
const QUEUE_DEPTH: usize = 1024;

/// Where re-emitted reads go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SamOutput {
    /// Standard output.
    Stdout,
    /// A SAM file, created or truncated.
    Path(PathBuf),
}

impl fmt::Display for SamOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamOutput::Stdout => write!(f, "stdout"),
            SamOutput::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

type OutputSlot = Arc<RwLock<Option<Sender<Arc<AlignmentRecord>>>>>;

/// Re-emits every accepted read through the writer opened by [`SamWriterHook`].
///
/// Output order must follow traversal order, so the mapper reports ordered
/// side effects and parallel traversal is refused.
#[derive(Debug)]
pub struct PrintReads {
    output: OutputSlot,
}

impl Mapper for PrintReads {
    type Unit = ReadUnit;
    type Value = ();

    fn map(&self, unit: &ReadUnit) -> Result<(), MapError> {
        let slot = self
            .output
            .read()
            .map_err(|_| MapError::new("SAM output handle poisoned"))?;
        let sender = slot
            .as_ref()
            .ok_or_else(|| MapError::new("SAM output is not open"))?;
        sender
            .send(Arc::clone(&unit.read))
            .map_err(|_| MapError::new(format!("SAM writer stopped before read {}", unit.read.name)))
    }

    fn has_ordered_side_effects(&self) -> bool {
        true
    }
}

/// Counts mapped values, whatever their type.
#[derive(Debug, Clone, Copy)]
pub struct CountUnits<V> {
    _value: PhantomData<fn(V)>,
}

impl<V> CountUnits<V> {
    /// New counter.
    pub fn new() -> Self {
        Self { _value: PhantomData }
    }
}

impl<V> Default for CountUnits<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Reducer<V> for CountUnits<V> {
    type Accumulator = u64;

    fn reduce_init(&self) -> u64 {
        0
    }

    fn reduce(&self, _value: V, count: u64) -> Result<u64, ReduceError> {
        Ok(count + 1)
    }

    fn supports_combine(&self) -> bool {
        true
    }

    fn combine(&self, left: u64, right: u64) -> Result<u64, ReduceError> {
        Ok(left + right)
    }
}

/// Owns the htslib SAM writer for one traversal.
///
/// `initialize` opens the output on a dedicated writer thread and hands the
/// sending half of a bounded channel to the mapper. Completion closes the
/// channel and joins the thread; a write failure there becomes a resource
/// error, so the traversal fails.
#[derive(Debug)]
pub struct SamWriterHook {
    output: OutputSlot,
    destination: SamOutput,
    contigs: Vec<ContigInfo>,
    writer: Option<JoinHandle<anyhow::Result<u64>>>,
}

impl SamWriterHook {
    /// Hook writing to `destination`, declaring `contigs` in the header.
    pub fn new(destination: SamOutput, contigs: Vec<ContigInfo>) -> Self {
        Self {
            output: OutputSlot::default(),
            destination,
            contigs,
            writer: None,
        }
    }

    /// Mapper feeding this hook's writer.
    pub fn mapper(&self) -> PrintReads {
        PrintReads {
            output: Arc::clone(&self.output),
        }
    }

    /// Drop the sender and wait for the writer thread. Returns the records written.
    fn close(&mut self) -> anyhow::Result<Option<u64>> {
        self.output
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match self.writer.take() {
            None => Ok(None),
            Some(handle) => handle
                .join()
                .map_err(|_| anyhow!("SAM writer thread panicked"))?
                .map(Some),
        }
    }
}

impl CompletionHook<u64> for SamWriterHook {
    type Output = u64;

    fn initialize(&mut self) -> Result<(), ResourceError> {
        let (records_tx, records_rx) = bounded(QUEUE_DEPTH);
        let (ready_tx, ready_rx) = bounded(1);
        let destination = self.destination.clone();
        let contigs = self.contigs.clone();
        let handle = thread::spawn(move || write_sam(&destination, &contigs, records_rx, ready_tx));

        let opened = ready_rx
            .recv()
            .unwrap_or_else(|_| Err("SAM writer thread exited before opening its output".to_string()));
        if let Err(reason) = opened {
            // The thread has already returned the same failure.
            let _ = handle.join();
            return Err(ResourceError::other(reason));
        }

        *self
            .output
            .write()
            .map_err(|_| ResourceError::other("SAM output handle poisoned"))? = Some(records_tx);
        self.writer = Some(handle);
        Ok(())
    }

    fn on_traversal_done(&mut self, emitted: u64) -> Result<u64, ResourceError> {
        let written = self
            .close()
            .map_err(|err| ResourceError::other(format!("{err:#}")))?
            .unwrap_or(0);
        debug!(records = written, output = %self.destination, "SAM output closed");
        Ok(emitted)
    }

    fn release(&mut self) {
        if let Err(err) = self.close() {
            warn!("closing SAM output {} failed: {err:#}", self.destination);
        }
    }
}

/// Writer thread body: open the output, report readiness, then drain the channel.
fn write_sam(
    destination: &SamOutput,
    contigs: &[ContigInfo],
    records: Receiver<Arc<AlignmentRecord>>,
    ready: Sender<Result<(), String>>,
) -> anyhow::Result<u64> {
    let header = sam_header(contigs);
    let opened = match destination {
        SamOutput::Stdout => bam::Writer::from_stdout(&header, Format::Sam),
        SamOutput::Path(path) => bam::Writer::from_path(path, &header, Format::Sam),
    };
    let mut writer = match opened {
        Ok(writer) => {
            let _ = ready.send(Ok(()));
            writer
        }
        Err(err) => {
            let reason = format!("failed to open SAM output {destination}: {err}");
            let _ = ready.send(Err(reason.clone()));
            return Err(anyhow!(reason));
        }
    };

    let tids: HashMap<&str, usize> = contigs
        .iter()
        .enumerate()
        .map(|(tid, contig)| (contig.name.as_ref(), tid))
        .collect();
    let mut written = 0u64;
    for read in records {
        let record = encode_record(&read, tids.get(read.contig.as_ref()).copied())?;
        writer
            .write(&record)
            .with_context(|| format!("failed to write read {}", read.name))?;
        written += 1;
    }
    Ok(written)
}
