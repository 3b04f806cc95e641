use std::collections::BTreeMap;
use std::sync::Arc;

use crate::framework::PileupConsistencyError;
use crate::genomics::{
    base_index, is_regular_base, AlignedBlock, AlignmentRecord, IndelAnchor, IndelKind, Locus,
    Strand,
};

const NUM_BASES: usize = 4; // A, C, G, T

/// What one read shows at one locus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Aligned base and its quality.
    Base {
        /// Observed base (reference-forward orientation).
        base: u8,
        /// Phred quality of the base.
        quality: u8,
    },
    /// The read's alignment has a gap anchored at this locus.
    Indel {
        /// Insertion or deletion.
        kind: IndelKind,
        /// Number of inserted or deleted bases.
        len: u32,
    },
}

/// One read's contribution to a pileup column.
#[derive(Debug, Clone)]
pub struct PileupElement {
    /// Read the observation comes from.
    pub read: Arc<AlignmentRecord>,
    /// Offset within the read in sequencing (5'→3') order.
    pub offset: usize,
    /// Index into the stored (reference-forward) read bases.
    pub aligned_index: usize,
    /// Base or indel observed.
    pub observation: Observation,
}

impl PileupElement {
    /// Observed base, if this is a base observation.
    pub fn base(&self) -> Option<u8> {
        match self.observation {
            Observation::Base { base, .. } => Some(base),
            Observation::Indel { .. } => None,
        }
    }

    /// Base quality, if this is a base observation.
    pub fn quality(&self) -> Option<u8> {
        match self.observation {
            Observation::Base { quality, .. } => Some(quality),
            Observation::Indel { .. } => None,
        }
    }

    /// Whether this is an indel observation.
    pub fn is_indel(&self) -> bool {
        matches!(self.observation, Observation::Indel { .. })
    }
}

/// Column of per-read observations aligned to one locus.
#[derive(Debug, Clone)]
pub struct Pileup {
    /// Locus the column belongs to.
    pub locus: Locus,
    elements: Vec<PileupElement>,
}

impl Pileup {
    /// Construct a pileup from elements already in read order.
    pub fn new(locus: Locus, elements: Vec<PileupElement>) -> Self {
        Self { locus, elements }
    }

    /// All observations.
    pub fn elements(&self) -> &[PileupElement] {
        &self.elements
    }

    /// Number of reads contributing an observation.
    pub fn depth(&self) -> usize {
        self.elements.len()
    }

    /// Whether no read contributes.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Base observations only.
    pub fn base_observations(&self) -> impl Iterator<Item = &PileupElement> {
        self.elements.iter().filter(|e| !e.is_indel())
    }

    /// Observed bases in read order.
    pub fn bases(&self) -> Vec<u8> {
        self.elements.iter().filter_map(PileupElement::base).collect()
    }

    /// Base qualities in read order.
    pub fn qualities(&self) -> Vec<u8> {
        self.elements
            .iter()
            .filter_map(PileupElement::quality)
            .collect()
    }

    /// Number of indel observations.
    pub fn indel_count(&self) -> usize {
        self.elements.iter().filter(|e| e.is_indel()).count()
    }

    /// Per-base observation counts `[A, C, G, T]`.
    pub fn base_counts(&self) -> [u32; NUM_BASES] {
        let mut counts = [0u32; NUM_BASES];
        for base in self.elements.iter().filter_map(PileupElement::base) {
            if let Some(idx) = base_index(base) {
                counts[idx] += 1;
            }
        }
        counts
    }

    /// Regular bases differing from a regular reference base.
    ///
    /// Irregular reference or read bases never count.
    pub fn mismatch_count(&self) -> usize {
        let reference = self.locus.ref_base.to_ascii_uppercase();
        if !is_regular_base(reference) {
            return 0;
        }
        self.elements
            .iter()
            .filter_map(PileupElement::base)
            .filter(|b| is_regular_base(*b) && b.to_ascii_uppercase() != reference)
            .count()
    }
}

/// Read admitted to the active set with its block structure precomputed.
#[derive(Debug, Clone)]
pub struct ActiveRead {
    end: u32,
    /// The read.
    pub read: Arc<AlignmentRecord>,
    blocks: Vec<AlignedBlock>,
    indels: Vec<IndelAnchor>,
}

impl ActiveRead {
    fn observe(&self, position: u32) -> Option<(usize, Observation)> {
        let block = self.blocks.iter().find(|b| b.contains(position))?;
        let aligned_index = block.read_start + (position - block.reference_start) as usize;

        if let Some(indel) = self.indels.iter().find(|i| i.anchor == position) {
            return Some((
                aligned_index,
                Observation::Indel {
                    kind: indel.kind,
                    len: indel.len,
                },
            ));
        }

        let base = self.read.base_at(aligned_index)?;
        let quality = self.read.quality_at(aligned_index).unwrap_or(0);
        Some((aligned_index, Observation::Base { base, quality }))
    }
}

/// Reads overlapping the locus cursor, kept in admission order.
///
/// A count of reads per alignment end tells `expire_before` whether any read
/// ends before the cursor, so the list is only rescanned when one does.
#[derive(Debug, Default)]
pub struct ActiveReadSet {
    reads: Vec<ActiveRead>,
    ends: BTreeMap<u32, usize>,
}

impl ActiveReadSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active reads.
    pub fn len(&self) -> usize {
        self.reads.len()
    }

    /// Whether no read is active.
    pub fn is_empty(&self) -> bool {
        self.reads.is_empty()
    }

    /// Add a read whose span begins at or before the cursor.
    ///
    /// Reads whose blocks disagree with their bases are rejected and never
    /// contribute to any pileup.
    pub fn admit(&mut self, read: Arc<AlignmentRecord>) -> Result<(), PileupConsistencyError> {
        read.check_consistency()?;

        let end = read.end();
        *self.ends.entry(end).or_default() += 1;
        self.reads.push(ActiveRead {
            end,
            blocks: read.aligned_blocks(),
            indels: read.indels(),
            read,
        });
        Ok(())
    }

    /// Drop every read whose span ends before `position`. Returns how many were dropped.
    pub fn expire_before(&mut self, position: u32) -> usize {
        let live = self.ends.split_off(&position);
        let expired: usize = std::mem::replace(&mut self.ends, live).into_values().sum();
        if expired > 0 {
            self.reads.retain(|r| r.end >= position);
        }
        expired
    }

    /// Drop everything (contig change).
    pub fn clear(&mut self) {
        self.reads.clear();
        self.ends.clear();
    }

    /// Active reads in admission order.
    pub fn reads(&self) -> &[ActiveRead] {
        &self.reads
    }
}

/// Builds pileup columns from the active read set.
#[derive(Debug, Clone, Default)]
pub struct PileupBuilder;

impl PileupBuilder {
    /// Create a new pileup builder.
    pub fn new() -> Self {
        Self
    }

    /// Column at `locus` from every active read covering it.
    pub fn build(&self, locus: Locus, active: &ActiveReadSet) -> Pileup {
        let elements = active
            .reads()
            .iter()
            .filter(|r| r.read.contig == locus.contig && r.read.spans(locus.position))
            .filter_map(|r| {
                let (aligned_index, observation) = r.observe(locus.position)?;
                let offset = match r.read.strand {
                    Strand::Forward => aligned_index,
                    Strand::Reverse => r.read.len() - 1 - aligned_index,
                };
                Some(PileupElement {
                    read: Arc::clone(&r.read),
                    offset,
                    aligned_index,
                    observation,
                })
            })
            .collect();
        Pileup::new(locus, elements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genomics::CigarOp;

    fn read(start: u32, cigar: &str, seq: &[u8], strand: Strand) -> Arc<AlignmentRecord> {
        Arc::new(AlignmentRecord::new(
            "chr1",
            start,
            CigarOp::parse_cigar(cigar).unwrap(),
            seq.to_vec(),
            (0..seq.len() as u8).map(|q| 20 + q).collect::<Vec<u8>>(),
            strand,
        ))
    }

    fn column(active: &ActiveReadSet, pos: u32) -> Pileup {
        PileupBuilder::new().build(Locus::new("chr1", pos, b'A'), active)
    }

    #[test]
    fn gapless_forward_read_offsets() {
        let mut active = ActiveReadSet::new();
        active.admit(read(10, "4M", b"ACGT", Strand::Forward)).unwrap();

        for i in 0..4u32 {
            let pileup = column(&active, 10 + i);
            assert_eq!(pileup.depth(), 1);
            let element = &pileup.elements()[0];
            assert_eq!(element.offset, i as usize);
            assert_eq!(element.base(), Some(b"ACGT"[i as usize]));
            assert_eq!(element.quality(), Some(20 + i as u8));
        }
        assert!(column(&active, 9).is_empty());
        assert!(column(&active, 14).is_empty());
    }

    #[test]
    fn reverse_read_offsets_run_five_prime_to_three_prime() {
        let mut active = ActiveReadSet::new();
        active.admit(read(10, "4M", b"ACGT", Strand::Reverse)).unwrap();

        let first = column(&active, 10);
        assert_eq!(first.elements()[0].offset, 3);
        assert_eq!(first.elements()[0].aligned_index, 0);
        assert_eq!(first.elements()[0].base(), Some(b'A'));
        assert_eq!(column(&active, 13).elements()[0].offset, 0);
    }

    #[test]
    fn indel_anchor_replaces_base_observation() {
        let mut active = ActiveReadSet::new();
        // Deletion of two bases after position 12; bases resume at 15.
        active.admit(read(10, "3M2D3M", b"ACGTTT", Strand::Forward)).unwrap();

        assert_eq!(column(&active, 11).indel_count(), 0);
        let anchor = column(&active, 12);
        assert_eq!(anchor.indel_count(), 1);
        assert!(matches!(
            anchor.elements()[0].observation,
            Observation::Indel { kind: IndelKind::Deletion, len: 2 }
        ));
        assert!(column(&active, 13).is_empty());
        assert!(column(&active, 14).is_empty());
        assert_eq!(column(&active, 15).bases(), vec![b'T']);
    }

    #[test]
    fn indel_count_scenario() {
        let mut active = ActiveReadSet::new();
        active.admit(read(1, "8M", b"ACGTACGT", Strand::Forward)).unwrap();
        active.admit(read(2, "8M", b"CGTACGTA", Strand::Reverse)).unwrap();
        active.admit(read(3, "2M1I4M", b"GTTACGT", Strand::Forward)).unwrap();
        active.admit(read(4, "6M", b"TACGTA", Strand::Forward)).unwrap();

        let pileup = column(&active, 4);
        assert_eq!(pileup.depth(), 4);
        assert_eq!(pileup.indel_count(), 1);
    }

    #[test]
    fn inconsistent_read_is_rejected() {
        let mut active = ActiveReadSet::new();
        let err = active.admit(read(1, "5M", b"ACGT", Strand::Forward)).unwrap_err();
        assert!(err.reason.contains("cigar covers 5"));
        assert!(active.is_empty());
    }

    #[test]
    fn expiry_drops_reads_ending_before_cursor() {
        let mut active = ActiveReadSet::new();
        active.admit(read(1, "3M", b"ACG", Strand::Forward)).unwrap();
        active.admit(read(2, "5M", b"CGTAC", Strand::Forward)).unwrap();
        assert_eq!(active.len(), 2);

        assert_eq!(active.expire_before(3), 0);
        assert_eq!(active.expire_before(4), 1);
        assert_eq!(active.len(), 1);

        active.admit(read(4, "2M", b"TA", Strand::Forward)).unwrap();
        let starts: Vec<u32> = active.reads().iter().map(|r| r.read.start).collect();
        assert_eq!(starts, vec![2, 4]);

        active.clear();
        assert!(active.is_empty());
    }

    #[test]
    fn expiry_in_the_middle_keeps_admission_order() {
        let mut active = ActiveReadSet::new();
        active.admit(read(1, "6M", b"ACGTAC", Strand::Forward)).unwrap();
        active.admit(read(2, "1M", b"C", Strand::Forward)).unwrap();
        active.admit(read(3, "4M", b"GTAC", Strand::Reverse)).unwrap();

        assert_eq!(active.expire_before(3), 1);
        active.admit(read(3, "2M", b"GT", Strand::Forward)).unwrap();

        let order: Vec<(u32, Strand)> = active
            .reads()
            .iter()
            .map(|r| (r.read.start, r.read.strand))
            .collect();
        assert_eq!(
            order,
            vec![(1, Strand::Forward), (3, Strand::Reverse), (3, Strand::Forward)]
        );
        let pileup = column(&active, 3);
        assert_eq!(pileup.depth(), 3);
        assert_eq!(pileup.elements()[1].read.strand, Strand::Reverse);
    }

    #[test]
    fn mismatches_ignore_irregular_bases() {
        let mut active = ActiveReadSet::new();
        active.admit(read(1, "1M", b"C", Strand::Forward)).unwrap();
        active.admit(read(1, "1M", b"N", Strand::Forward)).unwrap();
        active.admit(read(1, "1M", b"A", Strand::Forward)).unwrap();

        let pileup = PileupBuilder::new().build(Locus::new("chr1", 1, b'A'), &active);
        assert_eq!(pileup.mismatch_count(), 1);
        assert_eq!(pileup.base_counts(), [1, 1, 0, 0]);

        let irregular = PileupBuilder::new().build(Locus::new("chr1", 1, b'N'), &active);
        assert_eq!(irregular.mismatch_count(), 0);
    }
}
