use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::framework::PileupConsistencyError;

/// Offset applied to ASCII-encoded Phred scores (Sanger/Illumina 1.8+).
pub const PHRED_ASCII_OFFSET: u8 = 33;

/// Convert an ASCII quality string (Phred+33) into integer scores.
pub fn phred_from_ascii(encoded: &[u8]) -> Vec<u8> {
    encoded
        .iter()
        .map(|q| q.saturating_sub(PHRED_ASCII_OFFSET))
        .collect()
}

/// Simple CIGAR operation kinds describing how a read aligns to the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CigarOpKind {
    /// Consuming match/mismatch (`M`).
    Match,
    /// Insertion relative to the reference (`I`).
    Insertion,
    /// Deletion relative to the reference (`D`).
    Deletion,
    /// Skipped reference region, e.g. an intron (`N`).
    Skip,
    /// Soft clipping (sequence present in read only, `S`).
    SoftClip,
    /// Hard clipping (trimmed sequence not present in read, `H`).
    HardClip,
    /// Sequence match (`=`).
    SequenceMatch,
    /// Sequence mismatch (`X`).
    SequenceMismatch,
}

impl CigarOpKind {
    /// Whether the operation advances along the reference.
    pub fn consumes_reference(self) -> bool {
        matches!(
            self,
            CigarOpKind::Match
                | CigarOpKind::Deletion
                | CigarOpKind::Skip
                | CigarOpKind::SequenceMatch
                | CigarOpKind::SequenceMismatch
        )
    }

    /// Whether the operation advances along the stored read bases.
    pub fn consumes_read(self) -> bool {
        matches!(
            self,
            CigarOpKind::Match
                | CigarOpKind::Insertion
                | CigarOpKind::SoftClip
                | CigarOpKind::SequenceMatch
                | CigarOpKind::SequenceMismatch
        )
    }

    /// Whether the operation places read bases against reference bases.
    pub fn is_aligned(self) -> bool {
        self.consumes_read() && self.consumes_reference()
    }

    fn code(self) -> char {
        match self {
            CigarOpKind::Match => 'M',
            CigarOpKind::Insertion => 'I',
            CigarOpKind::Deletion => 'D',
            CigarOpKind::Skip => 'N',
            CigarOpKind::SoftClip => 'S',
            CigarOpKind::HardClip => 'H',
            CigarOpKind::SequenceMatch => '=',
            CigarOpKind::SequenceMismatch => 'X',
        }
    }

    fn from_code(code: char) -> Option<Self> {
        Some(match code {
            'M' => CigarOpKind::Match,
            'I' => CigarOpKind::Insertion,
            'D' => CigarOpKind::Deletion,
            'N' => CigarOpKind::Skip,
            'S' => CigarOpKind::SoftClip,
            'H' => CigarOpKind::HardClip,
            '=' => CigarOpKind::SequenceMatch,
            'X' => CigarOpKind::SequenceMismatch,
            _ => return None,
        })
    }
}

/// CIGAR operation with length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CigarOp {
    /// Operation kind.
    pub kind: CigarOpKind,
    /// Number of bases affected by the operation.
    pub len: u32,
}

/// Error raised when a textual CIGAR cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid CIGAR '{cigar}': {reason}")]
pub struct CigarParseError {
    /// The offending CIGAR text.
    pub cigar: String,
    /// What went wrong.
    pub reason: String,
}

impl CigarOp {
    /// Construct a new CIGAR operation.
    pub fn new(kind: CigarOpKind, len: u32) -> Self {
        Self { kind, len }
    }

    /// Parse SAM-style CIGAR text such as `10M2I5M`. `*` yields no operations.
    pub fn parse_cigar(text: &str) -> Result<Vec<CigarOp>, CigarParseError> {
        let fail = |reason: &str| CigarParseError {
            cigar: text.to_string(),
            reason: reason.to_string(),
        };
        if text == "*" {
            return Ok(Vec::new());
        }

        let mut ops = Vec::new();
        let mut len: Option<u32> = None;
        for ch in text.chars() {
            if let Some(digit) = ch.to_digit(10) {
                let current = len.unwrap_or(0);
                len = Some(
                    current
                        .checked_mul(10)
                        .and_then(|v| v.checked_add(digit))
                        .ok_or_else(|| fail("operation length overflows"))?,
                );
                continue;
            }
            let kind = CigarOpKind::from_code(ch)
                .ok_or_else(|| fail(&format!("unknown operation '{ch}'")))?;
            let op_len = len.take().ok_or_else(|| fail("operation without length"))?;
            ops.push(CigarOp::new(kind, op_len));
        }
        if len.is_some() {
            return Err(fail("trailing length without operation"));
        }
        Ok(ops)
    }
}

impl fmt::Display for CigarOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.len, self.kind.code())
    }
}

/// Strand orientation of an alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Strand {
    /// Read maps to the forward strand.
    #[default]
    Forward,
    /// Read maps to the reverse complement strand.
    Reverse,
}

/// Contiguous gapless stretch of an alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignedBlock {
    /// Index of the first block base within the stored read bases.
    pub read_start: usize,
    /// Reference position (1-based) of the first block base.
    pub reference_start: u32,
    /// Number of aligned bases.
    pub len: u32,
}

impl AlignedBlock {
    /// Last reference position (inclusive) covered by the block.
    pub fn reference_end(&self) -> u32 {
        self.reference_start + self.len - 1
    }

    /// Whether the block covers the reference position.
    pub fn contains(&self, position: u32) -> bool {
        position >= self.reference_start && position <= self.reference_end()
    }
}

/// Kind of gap between two aligned blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IndelKind {
    /// Read carries bases absent from the reference.
    Insertion,
    /// Reference carries bases absent from the read.
    Deletion,
}

/// Indel anchored on the last aligned reference base preceding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndelAnchor {
    /// Reference position (1-based) the indel is anchored on.
    pub anchor: u32,
    /// Insertion or deletion.
    pub kind: IndelKind,
    /// Number of inserted or deleted bases.
    pub len: u32,
}

/// Aligned read with sequence and quality information.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentRecord {
    /// Read name.
    pub name: Arc<str>,
    /// Reference contig/chromosome name.
    pub contig: Arc<str>,
    /// 1-based leftmost aligned reference coordinate.
    pub start: u32,
    /// Mapping quality (Phred-scaled, 255 when unavailable).
    pub mapq: u8,
    /// CIGAR describing the alignment.
    pub cigar: Vec<CigarOp>,
    /// Read sequence stored as uppercase ASCII in reference-forward orientation.
    pub sequence: Arc<[u8]>,
    /// Per-base quality scores in Phred space.
    pub qualities: Arc<[u8]>,
    /// Strand orientation.
    pub strand: Strand,
    /// Number of differences to the reference (`NM`), when recorded.
    pub edit_distance: Option<u32>,
    /// Read group identifier (`RG`) resolving to a sample label.
    pub read_group: Option<Arc<str>>,
    /// Whether the read is unplaced.
    pub unmapped: bool,
    /// Whether this is a secondary (non-primary) alignment.
    pub secondary: bool,
}

impl AlignmentRecord {
    /// Construct a new aligned read.
    pub fn new(
        contig: impl Into<Arc<str>>,
        start: u32,
        cigar: Vec<CigarOp>,
        sequence: impl Into<Arc<[u8]>>,
        qualities: impl Into<Arc<[u8]>>,
        strand: Strand,
    ) -> Self {
        Self {
            name: Arc::from("*"),
            contig: contig.into(),
            start,
            mapq: 255,
            cigar,
            sequence: sequence.into(),
            qualities: qualities.into(),
            strand,
            edit_distance: None,
            read_group: None,
            unmapped: false,
            secondary: false,
        }
    }

    /// Gapless alignment spanning the whole read.
    pub fn gapless(
        contig: impl Into<Arc<str>>,
        start: u32,
        sequence: impl Into<Arc<[u8]>>,
        qualities: impl Into<Arc<[u8]>>,
        strand: Strand,
    ) -> Self {
        let sequence: Arc<[u8]> = sequence.into();
        let cigar = vec![CigarOp::new(CigarOpKind::Match, sequence.len() as u32)];
        Self::new(contig, start, cigar, sequence, qualities, strand)
    }

    /// Set the read name.
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the mapping quality.
    pub fn with_mapq(mut self, mapq: u8) -> Self {
        self.mapq = mapq;
        self
    }

    /// Set the edit distance.
    pub fn with_edit_distance(mut self, edit_distance: u32) -> Self {
        self.edit_distance = Some(edit_distance);
        self
    }

    /// Set the read group.
    pub fn with_read_group(mut self, read_group: impl Into<Arc<str>>) -> Self {
        self.read_group = Some(read_group.into());
        self
    }

    /// Mark the alignment as secondary.
    pub fn with_secondary(mut self, secondary: bool) -> Self {
        self.secondary = secondary;
        self
    }

    /// Mark the read as unmapped.
    pub fn with_unmapped(mut self, unmapped: bool) -> Self {
        self.unmapped = unmapped;
        self
    }

    /// Read length inferred from the sequence.
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// Whether the read has no bases.
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Whether the read maps to the reverse strand.
    pub fn is_reverse(&self) -> bool {
        self.strand == Strand::Reverse
    }

    /// Number of reference bases spanned by the CIGAR.
    pub fn reference_len(&self) -> u32 {
        self.cigar
            .iter()
            .filter(|op| op.kind.consumes_reference())
            .map(|op| op.len)
            .sum()
    }

    /// Number of read bases the CIGAR accounts for.
    pub fn query_len(&self) -> usize {
        self.cigar
            .iter()
            .filter(|op| op.kind.consumes_read())
            .map(|op| op.len as usize)
            .sum()
    }

    /// Last aligned reference position (1-based, inclusive).
    ///
    /// Equals `start - 1` for alignments that consume no reference.
    pub fn end(&self) -> u32 {
        (self.start + self.reference_len()).saturating_sub(1)
    }

    /// Whether the reference position lies within `[start, end]`.
    pub fn spans(&self, position: u32) -> bool {
        position >= self.start && position <= self.end()
    }

    /// Base at the provided read offset.
    pub fn base_at(&self, offset: usize) -> Option<u8> {
        self.sequence.get(offset).copied()
    }

    /// Quality score at the provided read offset.
    pub fn quality_at(&self, offset: usize) -> Option<u8> {
        self.qualities.get(offset).copied()
    }

    /// Contiguous aligned blocks in reference order.
    ///
    /// Adjacent `M`/`=`/`X` operations merge into one block.
    pub fn aligned_blocks(&self) -> Vec<AlignedBlock> {
        let mut blocks: Vec<AlignedBlock> = Vec::new();
        let mut read_pos = 0usize;
        let mut ref_pos = self.start;

        for op in &self.cigar {
            if op.kind.is_aligned() && op.len > 0 {
                match blocks.last_mut() {
                    Some(last)
                        if last.read_start + last.len as usize == read_pos
                            && last.reference_start + last.len == ref_pos =>
                    {
                        last.len += op.len;
                    }
                    _ => blocks.push(AlignedBlock {
                        read_start: read_pos,
                        reference_start: ref_pos,
                        len: op.len,
                    }),
                }
            }
            if op.kind.consumes_read() {
                read_pos += op.len as usize;
            }
            if op.kind.consumes_reference() {
                ref_pos += op.len;
            }
        }

        blocks
    }

    /// Whether the alignment is a single gapless block.
    pub fn is_gapless(&self) -> bool {
        self.aligned_blocks().len() == 1 && self.indels().is_empty()
    }

    /// Insertions and deletions lying between aligned blocks.
    ///
    /// Indels before the first or after the last aligned base have no anchor
    /// and are not reported.
    pub fn indels(&self) -> Vec<IndelAnchor> {
        let mut anchors = Vec::new();
        let mut ref_pos = self.start;
        let mut seen_aligned = false;

        for (idx, op) in self.cigar.iter().enumerate() {
            let kind = match op.kind {
                CigarOpKind::Insertion => Some(IndelKind::Insertion),
                CigarOpKind::Deletion => Some(IndelKind::Deletion),
                _ => None,
            };
            if let Some(kind) = kind {
                let aligned_after = self.cigar[idx + 1..]
                    .iter()
                    .any(|later| later.kind.is_aligned() && later.len > 0);
                if seen_aligned && aligned_after && op.len > 0 {
                    anchors.push(IndelAnchor {
                        anchor: ref_pos - 1,
                        kind,
                        len: op.len,
                    });
                }
            }
            if op.kind.is_aligned() && op.len > 0 {
                seen_aligned = true;
            }
            if op.kind.consumes_reference() {
                ref_pos += op.len;
            }
        }

        anchors
    }

    /// Verify that bases, qualities and CIGAR agree with each other.
    pub fn check_consistency(&self) -> Result<(), PileupConsistencyError> {
        let fail = |reason: String| PileupConsistencyError {
            read: Arc::clone(&self.name),
            contig: Arc::clone(&self.contig),
            start: self.start,
            reason,
        };

        let query_len = self.query_len();
        if query_len != self.len() {
            return Err(fail(format!(
                "cigar covers {} bases but read has {}",
                query_len,
                self.len()
            )));
        }
        if !self.qualities.is_empty() && self.qualities.len() != self.len() {
            return Err(fail(format!(
                "read has {} bases but {} quality scores",
                self.len(),
                self.qualities.len()
            )));
        }
        if self.reference_len() == 0 {
            return Err(fail("alignment spans no reference bases".to_string()));
        }
        Ok(())
    }

    /// CIGAR rendered as SAM text.
    pub fn cigar_string(&self) -> String {
        if self.cigar.is_empty() {
            return "*".to_string();
        }
        self.cigar.iter().map(ToString::to_string).collect()
    }
}
