use std::sync::Arc;

use crate::framework::{MapError, ReduceError};
use crate::genomics::{is_regular_base, ReadUnit};
use crate::walker::{Mapper, Reducer};
use crate::walkers::Histogram;

/// Mismatches found on one read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadMismatches {
    /// Read name.
    pub read: Arc<str>,
    /// Bases compared against a regular reference base.
    pub compared: u32,
    /// Read offsets (0-based, stored orientation) that disagree with the reference.
    pub offsets: Vec<usize>,
}

impl ReadMismatches {
    /// Number of mismatching bases.
    pub fn count(&self) -> usize {
        self.offsets.len()
    }
}

/// Totals over every read mapped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MismatchTally {
    /// Reads scored.
    pub reads: u64,
    /// Bases compared.
    pub compared: u64,
    /// Mismatching bases.
    pub mismatches: u64,
    /// Reads keyed by their mismatch count.
    pub per_read: Histogram<u32>,
}

impl MismatchTally {
    /// Mismatches per compared base (0 when nothing was compared).
    pub fn rate(&self) -> f64 {
        match self.compared {
            0 => 0.0,
            compared => self.mismatches as f64 / compared as f64,
        }
    }
}

/// Compares read bases against the reference over the aligned blocks.
///
/// Positions where either the read or the reference carries an irregular base
/// are not scored. Soft clips and insertions never are.
#[derive(Debug, Clone, Copy, Default)]
pub struct MismatchCounter;

impl Mapper for MismatchCounter {
    type Unit = ReadUnit;
    type Value = ReadMismatches;

    fn map(&self, unit: &ReadUnit) -> Result<ReadMismatches, MapError> {
        let read = &unit.read;
        let span = read.reference_len() as usize;
        if unit.reference.len() < span {
            return Err(MapError::new(format!(
                "read {} spans {} reference bases but only {} were available",
                read.name,
                span,
                unit.reference.len()
            )));
        }

        let mut compared = 0u32;
        let mut offsets = Vec::new();
        for block in read.aligned_blocks() {
            let window = (block.reference_start - read.start) as usize;
            for i in 0..block.len as usize {
                let offset = block.read_start + i;
                let Some(base) = read.base_at(offset) else {
                    return Err(MapError::new(format!(
                        "read {} has no base at offset {offset}",
                        read.name
                    )));
                };
                let reference = unit.reference[window + i];
                if !is_regular_base(base) || !is_regular_base(reference) {
                    continue;
                }
                compared += 1;
                if !base.eq_ignore_ascii_case(&reference) {
                    offsets.push(offset);
                }
            }
        }

        Ok(ReadMismatches {
            read: Arc::clone(&read.name),
            compared,
            offsets,
        })
    }
}

impl Reducer<ReadMismatches> for MismatchCounter {
    type Accumulator = MismatchTally;

    fn reduce_init(&self) -> MismatchTally {
        MismatchTally::default()
    }

    fn reduce(&self, value: ReadMismatches, mut tally: MismatchTally) -> Result<MismatchTally, ReduceError> {
        tally.reads += 1;
        tally.compared += u64::from(value.compared);
        tally.mismatches += value.count() as u64;
        tally.per_read.increment(value.count() as u32);
        Ok(tally)
    }

    fn supports_combine(&self) -> bool {
        true
    }

    fn combine(&self, left: MismatchTally, right: MismatchTally) -> Result<MismatchTally, ReduceError> {
        Ok(MismatchTally {
            reads: left.reads + right.reads,
            compared: left.compared + right.compared,
            mismatches: left.mismatches + right.mismatches,
            per_read: left.per_read.merge(right.per_read),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genomics::{AlignmentRecord, CigarOp, Strand};

    fn unit(read: AlignmentRecord, reference: &[u8]) -> ReadUnit {
        ReadUnit {
            read: Arc::new(read),
            reference: reference.to_vec(),
        }
    }

    #[test]
    fn counts_single_substitution() {
        let read = AlignmentRecord::gapless("chr1", 1, b"ACGGA".to_vec(), vec![30u8; 5], Strand::Forward);
        let found = MismatchCounter.map(&unit(read, b"ACGTA")).unwrap();
        assert_eq!(found.count(), 1);
        assert_eq!(found.offsets, vec![3]);
        assert_eq!(found.compared, 5);
    }

    #[test]
    fn irregular_bases_are_not_scored() {
        let read = AlignmentRecord::gapless("chr1", 1, b"ANGGA".to_vec(), vec![30u8; 5], Strand::Forward);
        let found = MismatchCounter.map(&unit(read, b"ACGNA")).unwrap();
        assert_eq!(found.compared, 3);
        assert_eq!(found.count(), 0);
    }

    #[test]
    fn skips_insertions_and_clips() {
        let cigar = CigarOp::parse_cigar("1S2M1I2M").unwrap();
        let read = AlignmentRecord::new("chr1", 10, cigar, b"TACGTA".to_vec(), vec![30u8; 6], Strand::Forward);
        let found = MismatchCounter.map(&unit(read, b"ACGA")).unwrap();
        assert_eq!(found.compared, 4);
        assert_eq!(found.offsets, vec![4]);
    }

    #[test]
    fn short_reference_window_is_a_map_error() {
        let read = AlignmentRecord::gapless("chr1", 1, b"ACGTA".to_vec(), vec![30u8; 5], Strand::Forward);
        assert!(MismatchCounter.map(&unit(read, b"ACG")).is_err());
    }
}
