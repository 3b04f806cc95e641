//! Genomic data model and the stream adapters that feed the traversal engine.
//!
//! Records, loci and intervals live here together with the reference and
//! annotation accessors, the pileup builder, and the adapters that expose a
//! sorted alignment stream as read or locus units.

mod annotation;
pub mod io;
mod locus;
mod pileup;
mod reference;
mod source;
mod span;
mod stream;
mod types;

pub use annotation::{AnnotationSource, Annotations, InMemoryAnnotations, Rod};
pub use locus::{merge_intervals, GenomicInterval, IntervalParseError, Locus};
pub use pileup::{ActiveRead, ActiveReadSet, Observation, Pileup, PileupBuilder, PileupElement};
pub use reference::{base_index, is_regular_base, ContigInfo, InMemoryReference, ReferenceSource};
pub use source::{AlignmentSource, InMemoryAlignments};
pub use span::{SpanInterval, TraversalSpan};
pub use stream::{
    verify_coordinates, Granularity, LocusStream, LocusUnit, ReadCounts, ReadStream, ReadUnit,
    StreamContext, TraversalUnit, UnitStream,
};
pub use types::{
    phred_from_ascii, AlignedBlock, AlignmentRecord, CigarOp, CigarOpKind, CigarParseError,
    IndelAnchor, IndelKind, Strand, PHRED_ASCII_OFFSET,
};
