use std::sync::Arc;

use locuswalk::genomics::{
    ActiveReadSet, AlignmentRecord, CigarOp, Locus, Observation, PileupBuilder, Strand,
};
use proptest::prelude::*;

fn bases() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(prop_oneof![Just(b'A'), Just(b'C'), Just(b'G'), Just(b'T')], 1..24)
}

proptest! {
    #[test]
    fn gapless_offsets_follow_strand(
        seq in bases(),
        start in 1u32..50,
        reverse in any::<bool>(),
    ) {
        let strand = if reverse { Strand::Reverse } else { Strand::Forward };
        let quals: Vec<u8> = (0..seq.len()).map(|i| (i % 40) as u8).collect();
        let read = Arc::new(AlignmentRecord::gapless("chr1", start, seq.clone(), quals.clone(), strand));
        let mut active = ActiveReadSet::new();
        active.admit(Arc::clone(&read)).expect("consistent read");

        let builder = PileupBuilder::new();
        for i in 0..seq.len() {
            let position = start + i as u32;
            let pileup = builder.build(Locus::new("chr1", position, b'A'), &active);
            prop_assert_eq!(pileup.depth(), 1);
            let element = &pileup.elements()[0];
            let expected = if reverse { seq.len() - 1 - i } else { i };
            prop_assert_eq!(element.offset, expected);
            prop_assert_eq!(element.aligned_index, i);
            prop_assert_eq!(element.base(), Some(seq[i]));
            prop_assert_eq!(element.quality(), Some(quals[i]));
        }

        let outside = builder.build(Locus::new("chr1", start + seq.len() as u32, b'A'), &active);
        prop_assert!(outside.is_empty());
    }

    #[test]
    fn one_observation_per_read_per_locus(
        left in 1u32..6,
        gap in 1u32..4,
        right in 1u32..6,
        deletion in any::<bool>(),
    ) {
        let op = if deletion { 'D' } else { 'I' };
        let cigar = CigarOp::parse_cigar(&format!("{left}M{gap}{op}{right}M")).expect("valid cigar");
        let read_len = (left + right + if deletion { 0 } else { gap }) as usize;
        let read = Arc::new(AlignmentRecord::new(
            "chr1",
            10,
            cigar,
            vec![b'C'; read_len],
            vec![25u8; read_len],
            Strand::Forward,
        ));
        let mut active = ActiveReadSet::new();
        active.admit(Arc::clone(&read)).expect("consistent read");

        let builder = PileupBuilder::new();
        let mut indels = 0;
        for position in read.start..=read.end() {
            let pileup = builder.build(Locus::new("chr1", position, b'C'), &active);
            prop_assert!(pileup.depth() <= 1);
            for element in pileup.elements() {
                if let Observation::Indel { len, .. } = element.observation {
                    prop_assert_eq!(position, 10 + left - 1);
                    prop_assert_eq!(len, gap);
                    indels += 1;
                }
            }
        }
        prop_assert_eq!(indels, 1);
    }
}
