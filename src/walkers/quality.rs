use crate::framework::{MapError, ReduceError};
use crate::genomics::LocusUnit;
use crate::walker::{Mapper, Reducer};
use crate::walkers::Histogram;

/// Histogram of base qualities over every pileup column visited.
///
/// Each base is counted once per locus it covers. Indel observations carry
/// no quality and are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityHistogram;

impl Mapper for QualityHistogram {
    type Unit = LocusUnit;
    type Value = Vec<u8>;

    fn map(&self, unit: &LocusUnit) -> Result<Vec<u8>, MapError> {
        Ok(unit.pileup.qualities())
    }
}

impl Reducer<Vec<u8>> for QualityHistogram {
    type Accumulator = Histogram<u8>;

    fn reduce_init(&self) -> Histogram<u8> {
        Histogram::new()
    }

    fn reduce(&self, qualities: Vec<u8>, mut histogram: Histogram<u8>) -> Result<Histogram<u8>, ReduceError> {
        for quality in qualities {
            histogram.increment(quality);
        }
        Ok(histogram)
    }

    fn supports_combine(&self) -> bool {
        true
    }

    fn combine(&self, left: Histogram<u8>, right: Histogram<u8>) -> Result<Histogram<u8>, ReduceError> {
        Ok(left.merge(right))
    }
}
