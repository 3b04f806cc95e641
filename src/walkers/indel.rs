use std::ops::Add;

use crate::framework::{MapError, ReduceError};
use crate::genomics::LocusUnit;
use crate::walker::{Mapper, Reducer};

/// Indel observations per locus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct IndelTally {
    /// Loci visited.
    pub loci: u64,
    /// Loci where at least one read has a gap anchored.
    pub loci_with_indels: u64,
    /// Indel observations summed over loci.
    pub observations: u64,
    /// Base observations summed over loci.
    pub bases: u64,
}

impl Add for IndelTally {
    type Output = IndelTally;

    fn add(self, other: IndelTally) -> IndelTally {
        IndelTally {
            loci: self.loci + other.loci,
            loci_with_indels: self.loci_with_indels + other.loci_with_indels,
            observations: self.observations + other.observations,
            bases: self.bases + other.bases,
        }
    }
}

/// Counts the indel markers in each pileup column.
///
/// Loci whose reference base is irregular are not scored.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndelCounter;

impl Mapper for IndelCounter {
    type Unit = LocusUnit;
    type Value = IndelTally;

    fn map(&self, unit: &LocusUnit) -> Result<IndelTally, MapError> {
        if !unit.locus().has_regular_base() {
            return Ok(IndelTally::default());
        }
        let observations = unit.pileup.indel_count() as u64;
        Ok(IndelTally {
            loci: 1,
            loci_with_indels: u64::from(observations > 0),
            observations,
            bases: unit.pileup.depth() as u64 - observations,
        })
    }
}

impl Reducer<IndelTally> for IndelCounter {
    type Accumulator = IndelTally;

    fn reduce_init(&self) -> IndelTally {
        IndelTally::default()
    }

    fn reduce(&self, value: IndelTally, total: IndelTally) -> Result<IndelTally, ReduceError> {
        Ok(total + value)
    }

    fn supports_combine(&self) -> bool {
        true
    }

    fn combine(&self, left: IndelTally, right: IndelTally) -> Result<IndelTally, ReduceError> {
        Ok(left + right)
    }
}
