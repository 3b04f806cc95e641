//! Stream adapters: turn a coordinate-sorted record stream into traversal units.
//!
//! Two granularities exist. Read granularity yields one unit per read together
//! with the reference bases it spans. Locus granularity maintains the set of
//! reads overlapping a moving cursor and yields one pileup column per locus.
//! Both adapters are lazy and check ordering as records are pulled.

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::framework::{MalformedInputError, PileupConsistencyError};
use crate::genomics::{
    ActiveReadSet, AlignmentRecord, AnnotationSource, Annotations, Locus, Pileup, PileupBuilder,
    ReferenceSource, TraversalSpan,
};

/// Unit of traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Granularity {
    /// One unit per aligned read.
    Read,
    /// One unit per reference position.
    Locus,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Read => f.write_str("read"),
            Granularity::Locus => f.write_str("locus"),
        }
    }
}

/// Counters for records the adapter dropped before they became units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ReadCounts {
    /// Records pulled from the source.
    pub seen: u64,
    /// Unplaced records.
    pub unmapped: u64,
    /// Secondary alignments (locus granularity only).
    pub secondary: u64,
    /// Records without an alignment start.
    pub no_alignment_start: u64,
    /// Records whose CIGAR disagrees with their bases (locus granularity only).
    pub inconsistent: u64,
    /// Records starting outside the traversal intervals (read granularity only).
    pub outside_intervals: u64,
}

impl ReadCounts {
    /// Records dropped for any reason.
    pub fn skipped(&self) -> u64 {
        self.unmapped
            + self.secondary
            + self.no_alignment_start
            + self.inconsistent
            + self.outside_intervals
    }

    /// Add another set of counters into this one.
    pub fn absorb(&mut self, other: &ReadCounts) {
        self.seen += other.seen;
        self.unmapped += other.unmapped;
        self.secondary += other.secondary;
        self.no_alignment_start += other.no_alignment_start;
        self.inconsistent += other.inconsistent;
        self.outside_intervals += other.outside_intervals;
    }
}

/// Everything an adapter needs besides the records themselves.
pub struct StreamContext<'a> {
    /// Reference dictionary and bases.
    pub reference: &'a dyn ReferenceSource,
    /// Annotation tracks, when any are bound.
    pub annotations: Option<&'a dyn AnnotationSource>,
    /// Track names looked up at every locus.
    pub tracks: &'a [Arc<str>],
    /// Positions the traversal covers.
    pub span: TraversalSpan,
    /// Emit loci with zero coverage (locus granularity).
    pub visit_uncovered: bool,
}

impl fmt::Debug for StreamContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamContext")
            .field("tracks", &self.tracks)
            .field("span", &self.span)
            .field("visit_uncovered", &self.visit_uncovered)
            .finish_non_exhaustive()
    }
}

/// Lazy sequence of units plus the adapter's bookkeeping.
pub trait UnitStream<U>: Iterator<Item = Result<U, MalformedInputError>> {
    /// Counters accumulated so far.
    fn read_counts(&self) -> ReadCounts;

    /// Consistency warnings raised since the last call.
    fn take_warnings(&mut self) -> Vec<PileupConsistencyError>;
}

/// A unit the engine can traverse.
///
/// The unit type fixes the granularity, so a walker's mapper decides whether
/// it sees reads or pileup columns.
pub trait TraversalUnit: Sized {
    /// Granularity produced by [`TraversalUnit::open`].
    const GRANULARITY: Granularity;

    /// Wrap a record stream in the matching adapter.
    fn open<'a>(
        records: Box<dyn Iterator<Item = AlignmentRecord> + 'a>,
        context: StreamContext<'a>,
    ) -> Box<dyn UnitStream<Self> + 'a>;

    /// Contig the unit sits on.
    fn contig(&self) -> &Arc<str>;

    /// 1-based position of the unit (read start or locus).
    fn position(&self) -> u32;
}

/// A read plus the reference bases under its aligned span.
#[derive(Debug, Clone)]
pub struct ReadUnit {
    /// The read.
    pub read: Arc<AlignmentRecord>,
    /// Reference bases over `[read.start, read.end()]`.
    pub reference: Vec<u8>,
}

/// One pileup column and the annotations bound to its locus.
#[derive(Debug, Clone)]
pub struct LocusUnit {
    /// Observations at the locus.
    pub pileup: Pileup,
    /// One slot per requested annotation track.
    pub annotations: Annotations,
}

impl LocusUnit {
    /// Locus of the column.
    pub fn locus(&self) -> &Locus {
        &self.pileup.locus
    }
}

impl TraversalUnit for ReadUnit {
    const GRANULARITY: Granularity = Granularity::Read;

    fn open<'a>(
        records: Box<dyn Iterator<Item = AlignmentRecord> + 'a>,
        context: StreamContext<'a>,
    ) -> Box<dyn UnitStream<Self> + 'a> {
        Box::new(ReadStream::new(records, context))
    }

    fn contig(&self) -> &Arc<str> {
        &self.read.contig
    }

    fn position(&self) -> u32 {
        self.read.start
    }
}

impl TraversalUnit for LocusUnit {
    const GRANULARITY: Granularity = Granularity::Locus;

    fn open<'a>(
        records: Box<dyn Iterator<Item = AlignmentRecord> + 'a>,
        context: StreamContext<'a>,
    ) -> Box<dyn UnitStream<Self> + 'a> {
        Box::new(LocusStream::new(records, context))
    }

    fn contig(&self) -> &Arc<str> {
        &self.pileup.locus.contig
    }

    fn position(&self) -> u32 {
        self.pileup.locus.position
    }
}

/// Record filter plus coordinate validation shared by both adapters.
struct CheckedRecords<'a> {
    inner: Box<dyn Iterator<Item = AlignmentRecord> + 'a>,
    reference: &'a dyn ReferenceSource,
    skip_secondary: bool,
    previous: Option<(usize, Arc<str>, u32)>,
    counts: ReadCounts,
}

impl<'a> CheckedRecords<'a> {
    fn new(
        inner: Box<dyn Iterator<Item = AlignmentRecord> + 'a>,
        reference: &'a dyn ReferenceSource,
        skip_secondary: bool,
    ) -> Self {
        Self {
            inner,
            reference,
            skip_secondary,
            previous: None,
            counts: ReadCounts::default(),
        }
    }

    fn validate(
        &mut self,
        record: AlignmentRecord,
    ) -> Result<(usize, AlignmentRecord), MalformedInputError> {
        let contig_index = self.reference.contig_index(&record.contig).ok_or_else(|| {
            MalformedInputError::UnknownContig {
                contig: Arc::clone(&record.contig),
            }
        })?;

        if let Some((previous_index, previous_contig, previous_start)) = &self.previous {
            if (contig_index, record.start) < (*previous_index, *previous_start) {
                return Err(MalformedInputError::Unsorted {
                    contig: Arc::clone(&record.contig),
                    start: record.start,
                    previous_contig: Arc::clone(previous_contig),
                    previous_start: *previous_start,
                });
            }
        }

        let length = self.reference.contigs()[contig_index].len;
        let end = record.end().max(record.start);
        if end > length {
            return Err(MalformedInputError::OutOfRange {
                contig: Arc::clone(&record.contig),
                start: record.start,
                end,
                length,
            });
        }

        self.previous = Some((contig_index, Arc::clone(&record.contig), record.start));
        Ok((contig_index, record))
    }
}

impl Iterator for CheckedRecords<'_> {
    type Item = Result<(usize, AlignmentRecord), MalformedInputError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = self.inner.next()?;
            self.counts.seen += 1;
            if record.unmapped {
                self.counts.unmapped += 1;
                continue;
            }
            if record.start == 0 {
                self.counts.no_alignment_start += 1;
                continue;
            }
            if self.skip_secondary && record.secondary {
                self.counts.secondary += 1;
                continue;
            }
            return Some(self.validate(record));
        }
    }
}

/// Check order and range of every record an adapter would pull for `span`.
///
/// Both adapters stop at the first record starting past the final interval
/// and the locus adapter never validates secondary alignments, so the check
/// does the same. Sharded traversals run this before dispatching any shard,
/// so unsorted input fails exactly where it would sequentially.
pub fn verify_coordinates<'a>(
    records: Box<dyn Iterator<Item = AlignmentRecord> + 'a>,
    reference: &'a dyn ReferenceSource,
    span: &TraversalSpan,
    granularity: Granularity,
) -> Result<ReadCounts, MalformedInputError> {
    let mut checked = CheckedRecords::new(records, reference, granularity == Granularity::Locus);
    while let Some(record) = checked.next() {
        let (contig_index, record) = record?;
        if span.snap(contig_index, record.start).is_none() {
            break;
        }
    }
    Ok(checked.counts)
}

/// Read-granularity adapter.
///
/// A read belongs to the traversal when its start lies inside the span; the
/// stream ends at the first read starting past the final interval.
pub struct ReadStream<'a> {
    records: CheckedRecords<'a>,
    reference: &'a dyn ReferenceSource,
    span: TraversalSpan,
    done: bool,
}

impl<'a> ReadStream<'a> {
    /// Build the adapter.
    pub fn new(
        records: Box<dyn Iterator<Item = AlignmentRecord> + 'a>,
        context: StreamContext<'a>,
    ) -> Self {
        Self {
            records: CheckedRecords::new(records, context.reference, false),
            reference: context.reference,
            span: context.span,
            done: false,
        }
    }

    fn reference_bases(&self, read: &AlignmentRecord) -> Vec<u8> {
        if read.reference_len() == 0 {
            return Vec::new();
        }
        self.reference
            .fetch(&read.contig, read.start, read.end())
            .unwrap_or_default()
    }
}

impl Iterator for ReadStream<'_> {
    type Item = Result<ReadUnit, MalformedInputError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let (contig_index, record) = match self.records.next() {
                None => break,
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(err));
                }
                Some(Ok(checked)) => checked,
            };

            match self.span.snap(contig_index, record.start) {
                None => break,
                Some(at) if at != (contig_index, record.start) => {
                    self.records.counts.outside_intervals += 1;
                    continue;
                }
                Some(_) => {}
            }

            let reference = self.reference_bases(&record);
            return Some(Ok(ReadUnit {
                read: Arc::new(record),
                reference,
            }));
        }
        self.done = true;
        None
    }
}

impl UnitStream<ReadUnit> for ReadStream<'_> {
    fn read_counts(&self) -> ReadCounts {
        self.records.counts
    }

    fn take_warnings(&mut self) -> Vec<PileupConsistencyError> {
        Vec::new()
    }
}

impl fmt::Debug for ReadStream<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadStream")
            .field("counts", &self.records.counts)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

/// Locus-granularity adapter.
///
/// The cursor advances through the span. Reads are admitted once the cursor
/// reaches their start and expire once it passes their end. Without
/// `visit_uncovered` the cursor jumps over loci no read covers.
pub struct LocusStream<'a> {
    records: CheckedRecords<'a>,
    peeked: Option<(usize, AlignmentRecord)>,
    exhausted: bool,
    reference: &'a dyn ReferenceSource,
    contig_names: Vec<Arc<str>>,
    annotations: Option<&'a dyn AnnotationSource>,
    tracks: &'a [Arc<str>],
    span: TraversalSpan,
    visit_uncovered: bool,
    active: ActiveReadSet,
    builder: PileupBuilder,
    contig: Option<usize>,
    cursor: Option<(usize, u32)>,
    warnings: Vec<PileupConsistencyError>,
    done: bool,
}

impl<'a> LocusStream<'a> {
    /// Build the adapter.
    pub fn new(
        records: Box<dyn Iterator<Item = AlignmentRecord> + 'a>,
        context: StreamContext<'a>,
    ) -> Self {
        Self {
            records: CheckedRecords::new(records, context.reference, true),
            peeked: None,
            exhausted: false,
            reference: context.reference,
            contig_names: context
                .reference
                .contigs()
                .iter()
                .map(|info| Arc::clone(&info.name))
                .collect(),
            annotations: context.annotations,
            tracks: context.tracks,
            span: context.span,
            visit_uncovered: context.visit_uncovered,
            active: ActiveReadSet::new(),
            builder: PileupBuilder::new(),
            contig: None,
            cursor: None,
            warnings: Vec::new(),
            done: false,
        }
    }

    /// Reads currently overlapping the cursor.
    pub fn active_reads(&self) -> usize {
        self.active.len()
    }

    fn fill_peek(&mut self) -> Result<(), MalformedInputError> {
        if self.peeked.is_none() && !self.exhausted {
            match self.records.next() {
                Some(checked) => self.peeked = Some(checked?),
                None => self.exhausted = true,
            }
        }
        Ok(())
    }

    fn candidate(&self) -> Option<(usize, u32)> {
        if self.visit_uncovered {
            return self.cursor.or_else(|| {
                self.span
                    .intervals()
                    .first()
                    .map(|s| (s.contig_index, s.interval.start))
            });
        }
        if !self.active.is_empty() {
            return self.cursor;
        }
        let (contig_index, record) = self.peeked.as_ref()?;
        Some(match self.cursor {
            Some((cursor_contig, cursor_pos)) if cursor_contig == *contig_index => {
                (*contig_index, cursor_pos.max(record.start))
            }
            _ => (*contig_index, record.start),
        })
    }

    fn admit_through(&mut self, contig_index: usize, position: u32) -> Result<(), MalformedInputError> {
        while let Some(next) = self.peeked.as_ref().map(|(ci, r)| (*ci, r.start)) {
            if next > (contig_index, position) {
                break;
            }
            if let Some((record_contig, record)) = self.peeked.take() {
                if record_contig == contig_index {
                    if let Err(warning) = self.active.admit(Arc::new(record)) {
                        warn!("{warning}");
                        self.records.counts.inconsistent += 1;
                        self.warnings.push(warning);
                    }
                }
            }
            self.fill_peek()?;
        }
        Ok(())
    }

    fn unit_at(&self, contig_index: usize, position: u32) -> LocusUnit {
        let contig = Arc::clone(&self.contig_names[contig_index]);
        let ref_base = self.reference.base(&contig, position).unwrap_or(b'N');
        let locus = Locus::new(contig, position, ref_base);
        let annotations = match self.annotations {
            Some(source) if !self.tracks.is_empty() => {
                Annotations::collect(source, self.tracks, &locus)
            }
            _ => Annotations::empty(),
        };
        LocusUnit {
            pileup: self.builder.build(locus, &self.active),
            annotations,
        }
    }

    fn advance(&mut self) -> Result<Option<LocusUnit>, MalformedInputError> {
        loop {
            self.fill_peek()?;
            let Some((contig_index, position)) = self.candidate() else {
                return Ok(None);
            };
            // Past the final interval: nothing left to visit.
            let Some((contig_index, position)) = self.span.snap(contig_index, position) else {
                return Ok(None);
            };

            if self.contig != Some(contig_index) {
                self.active.clear();
                self.contig = Some(contig_index);
            }
            self.admit_through(contig_index, position)?;
            self.active.expire_before(position);
            self.cursor = Some((contig_index, position.saturating_add(1)));

            if self.active.is_empty() && !self.visit_uncovered {
                continue;
            }
            return Ok(Some(self.unit_at(contig_index, position)));
        }
    }
}

impl Iterator for LocusStream<'_> {
    type Item = Result<LocusUnit, MalformedInputError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.advance() {
            Ok(Some(unit)) => Some(Ok(unit)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl UnitStream<LocusUnit> for LocusStream<'_> {
    fn read_counts(&self) -> ReadCounts {
        self.records.counts
    }

    fn take_warnings(&mut self) -> Vec<PileupConsistencyError> {
        std::mem::take(&mut self.warnings)
    }
}

impl fmt::Debug for LocusStream<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocusStream")
            .field("cursor", &self.cursor)
            .field("active", &self.active.len())
            .field("counts", &self.records.counts)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genomics::{CigarOp, InMemoryAnnotations, InMemoryReference, Strand};

    fn reference() -> InMemoryReference {
        InMemoryReference::new()
            .with_contig("chr1", "ACGTACGTACGTACGTACGT")
            .with_contig("chr2", "TTTTTGGGGG")
    }

    fn read(contig: &str, start: u32, seq: &[u8]) -> AlignmentRecord {
        AlignmentRecord::gapless(contig, start, seq.to_vec(), vec![30u8; seq.len()], Strand::Forward)
    }

    fn context<'a>(
        reference: &'a InMemoryReference,
        intervals: Option<&[crate::genomics::GenomicInterval]>,
        visit_uncovered: bool,
    ) -> StreamContext<'a> {
        StreamContext {
            reference,
            annotations: None,
            tracks: &[],
            span: TraversalSpan::resolve(reference, intervals).unwrap(),
            visit_uncovered,
        }
    }

    fn loci(stream: impl Iterator<Item = Result<LocusUnit, MalformedInputError>>) -> Vec<(String, u32, usize)> {
        stream
            .map(|unit| {
                let unit = unit.unwrap();
                (unit.locus().contig.to_string(), unit.locus().position, unit.pileup.depth())
            })
            .collect()
    }

    #[test]
    fn read_units_carry_reference_bases() {
        let reference = reference();
        let records = vec![read("chr1", 3, b"GTA"), read("chr2", 5, b"TGG")];
        let units: Vec<ReadUnit> = ReadStream::new(Box::new(records.into_iter()), context(&reference, None, false))
            .map(Result::unwrap)
            .collect();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].reference, b"GTA".to_vec());
        assert_eq!(units[1].reference, b"TGG".to_vec());
    }

    #[test]
    fn unsorted_records_are_rejected() {
        let reference = reference();
        let records = vec![read("chr1", 10, b"AC"), read("chr1", 4, b"TA")];
        let mut stream = ReadStream::new(Box::new(records.into_iter()), context(&reference, None, false));
        assert!(stream.next().unwrap().is_ok());
        assert!(matches!(
            stream.next(),
            Some(Err(MalformedInputError::Unsorted { start: 4, previous_start: 10, .. }))
        ));
        assert!(stream.next().is_none());
    }

    #[test]
    fn contig_order_follows_the_dictionary() {
        let reference = reference();
        let records = vec![read("chr2", 1, b"TT"), read("chr1", 1, b"AC")];
        let span = TraversalSpan::resolve(&reference, None).unwrap();
        let result = verify_coordinates(Box::new(records.into_iter()), &reference, &span, Granularity::Read);
        assert!(matches!(result, Err(MalformedInputError::Unsorted { .. })));
    }

    #[test]
    fn reads_past_contig_end_are_out_of_range() {
        let reference = reference();
        let records = vec![read("chr2", 9, b"GGG")];
        let span = TraversalSpan::resolve(&reference, None).unwrap();
        let result = verify_coordinates(Box::new(records.into_iter()), &reference, &span, Granularity::Locus);
        assert!(matches!(result, Err(MalformedInputError::OutOfRange { end: 11, length: 10, .. })));
    }

    #[test]
    fn coordinate_check_stops_where_the_adapters_stop() {
        let reference = reference();
        let intervals = [crate::genomics::GenomicInterval::new("chr1", 1, 6)];
        let span = TraversalSpan::resolve(&reference, Some(&intervals)).unwrap();
        let records = || {
            vec![
                read("chr1", 2, b"CG"),
                read("chr1", 12, b"GT"),
                read("chr1", 9, b"AC"),
            ]
        };

        let counts = verify_coordinates(Box::new(records().into_iter()), &reference, &span, Granularity::Read).unwrap();
        assert_eq!(counts.seen, 2);
        let stream = ReadStream::new(Box::new(records().into_iter()), context(&reference, Some(&intervals), false));
        assert!(stream.into_iter().all(|unit| unit.is_ok()));
        let stream = LocusStream::new(Box::new(records().into_iter()), context(&reference, Some(&intervals), false));
        assert!(stream.into_iter().all(|unit| unit.is_ok()));

        let whole = TraversalSpan::resolve(&reference, None).unwrap();
        let result = verify_coordinates(Box::new(records().into_iter()), &reference, &whole, Granularity::Read);
        assert!(matches!(result, Err(MalformedInputError::Unsorted { start: 9, previous_start: 12, .. })));
    }

    #[test]
    fn secondary_reads_are_not_checked_at_locus_granularity() {
        let reference = reference();
        let span = TraversalSpan::resolve(&reference, None).unwrap();
        let records = || vec![read("chr1", 8, b"TA"), read("chr1", 3, b"GT").with_secondary(true)];

        let locus = verify_coordinates(Box::new(records().into_iter()), &reference, &span, Granularity::Locus);
        assert_eq!(locus.unwrap().secondary, 1);
        let by_read = verify_coordinates(Box::new(records().into_iter()), &reference, &span, Granularity::Read);
        assert!(matches!(by_read, Err(MalformedInputError::Unsorted { .. })));
    }

    #[test]
    fn filtered_records_are_counted() {
        let reference = reference();
        let records = vec![
            read("chr1", 1, b"AC").with_unmapped(true),
            read("chr1", 2, b"CG").with_secondary(true),
            read("chr1", 0, b"AC"),
            read("chr1", 3, b"GT"),
        ];
        let mut stream = LocusStream::new(Box::new(records.into_iter()), context(&reference, None, false));
        let visited = loci(stream.by_ref());
        assert_eq!(visited, vec![("chr1".to_string(), 3, 1), ("chr1".to_string(), 4, 1)]);
        let counts = stream.read_counts();
        assert_eq!(counts.seen, 4);
        assert_eq!(counts.unmapped, 1);
        assert_eq!(counts.secondary, 1);
        assert_eq!(counts.no_alignment_start, 1);
        assert_eq!(counts.skipped(), 3);
    }

    #[test]
    fn covered_loci_skip_gaps_and_track_depth() {
        let reference = reference();
        let records = vec![
            read("chr1", 2, b"CGT"),
            read("chr1", 3, b"GT"),
            read("chr1", 10, b"CG"),
            read("chr2", 1, b"T"),
        ];
        let stream = LocusStream::new(Box::new(records.into_iter()), context(&reference, None, false));
        assert_eq!(
            loci(stream),
            vec![
                ("chr1".to_string(), 2, 1),
                ("chr1".to_string(), 3, 2),
                ("chr1".to_string(), 4, 2),
                ("chr1".to_string(), 10, 1),
                ("chr1".to_string(), 11, 1),
                ("chr2".to_string(), 1, 1),
            ]
        );
    }

    #[test]
    fn uncovered_loci_are_visited_on_request() {
        let reference = reference();
        let intervals = vec![crate::genomics::GenomicInterval::new("chr1", 4, 7)];
        let records = vec![read("chr1", 3, b"GTA")];
        let stream = LocusStream::new(
            Box::new(records.into_iter()),
            context(&reference, Some(&intervals[..]), true),
        );
        assert_eq!(
            loci(stream),
            vec![
                ("chr1".to_string(), 4, 1),
                ("chr1".to_string(), 5, 1),
                ("chr1".to_string(), 6, 0),
                ("chr1".to_string(), 7, 0),
            ]
        );
    }

    #[test]
    fn intervals_restrict_loci_and_reads() {
        let reference = reference();
        let intervals = vec![crate::genomics::GenomicInterval::new("chr1", 5, 6)];
        let records = vec![read("chr1", 1, b"ACGTAC"), read("chr1", 6, b"CG"), read("chr2", 1, b"TT")];

        let columns = LocusStream::new(
            Box::new(records.clone().into_iter()),
            context(&reference, Some(&intervals[..]), false),
        );
        assert_eq!(loci(columns), vec![("chr1".to_string(), 5, 1), ("chr1".to_string(), 6, 2)]);

        let mut reads = ReadStream::new(Box::new(records.into_iter()), context(&reference, Some(&intervals[..]), false));
        let starts: Vec<u32> = reads.by_ref().map(|u| u.unwrap().read.start).collect();
        assert_eq!(starts, vec![6]);
        assert_eq!(reads.read_counts().outside_intervals, 1);
    }

    #[test]
    fn inconsistent_reads_warn_and_stay_out() {
        let reference = reference();
        let broken = AlignmentRecord::new(
            "chr1",
            2,
            CigarOp::parse_cigar("5M").unwrap(),
            b"CGT".to_vec(),
            vec![30u8; 3],
            Strand::Forward,
        );
        let records = vec![broken, read("chr1", 2, b"CG")];
        let mut stream = LocusStream::new(Box::new(records.into_iter()), context(&reference, None, false));
        let visited = loci(stream.by_ref());
        assert_eq!(visited, vec![("chr1".to_string(), 2, 1), ("chr1".to_string(), 3, 1)]);
        assert_eq!(stream.take_warnings().len(), 1);
        assert_eq!(stream.read_counts().inconsistent, 1);
    }

    #[test]
    fn annotations_bind_to_each_locus() {
        let reference = reference();
        let store = InMemoryAnnotations::new().with_record("dbsnp", "chr1", 3, "rs7", "G/A");
        let tracks: Vec<Arc<str>> = vec![Arc::from("dbsnp")];
        let records = vec![read("chr1", 2, b"CG")];
        let ctx = StreamContext {
            reference: &reference,
            annotations: Some(&store),
            tracks: &tracks,
            span: TraversalSpan::resolve(&reference, None).unwrap(),
            visit_uncovered: false,
        };
        let units: Vec<LocusUnit> = LocusStream::new(Box::new(records.into_iter()), ctx)
            .map(Result::unwrap)
            .collect();
        assert_eq!(units.len(), 2);
        assert!(units[0].annotations.get("dbsnp").is_none());
        assert_eq!(units[1].annotations.get("dbsnp").map(|r| r.id.as_str()), Some("rs7"));
        assert_eq!(units[1].locus().ref_base, b'G');
    }
}
