#![allow(dead_code)]

use std::sync::Arc;

use locuswalk::framework::ResourceError;
use locuswalk::genomics::{AlignmentRecord, CigarOp, InMemoryReference, ReferenceSource, Strand};
use locuswalk::walker::CompletionHook;

pub const CHR1: &str = "ACGTACGTACGTACGTACGTTTGACCAGTAGGCATCGATCGGATCCATGCAAGTCGATGC";
pub const CHR2: &str = "GGGCCCAAATTTGGGCCCAAATTTACGTACGTACGTACGT";

/// Two-contig reference shared by the integration tests.
pub fn reference() -> InMemoryReference {
    InMemoryReference::new()
        .with_contig("chr1", CHR1)
        .with_contig("chr2", CHR2)
}

/// Gapless forward read with explicit qualities.
pub fn gapless(contig: &str, start: u32, seq: &[u8], quals: &[u8]) -> AlignmentRecord {
    AlignmentRecord::gapless(contig, start, seq.to_vec(), quals.to_vec(), Strand::Forward)
}

/// Read with an explicit CIGAR and uniform qualities.
pub fn with_cigar(contig: &str, start: u32, cigar: &str, seq: &[u8]) -> AlignmentRecord {
    AlignmentRecord::new(
        contig,
        start,
        CigarOp::parse_cigar(cigar).expect("valid cigar"),
        seq.to_vec(),
        vec![30u8; seq.len()],
        Strand::Forward,
    )
}

/// Deterministic xorshift generator for fixtures.
pub struct Xorshift(u64);

impl Xorshift {
    pub fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    pub fn below(&mut self, bound: u64) -> u64 {
        self.next_u64() % bound
    }
}

/// Coordinate-sorted reads drawn from the reference with sporadic
/// substitutions, insertions and deletions.
pub fn simulated_reads(reference: &InMemoryReference, count: usize, seed: u64) -> Vec<AlignmentRecord> {
    let mut rng = Xorshift::new(seed);
    let contigs = reference.contigs().to_vec();
    let mut reads = Vec::with_capacity(count);

    for idx in 0..count {
        let contig_index = rng.below(contigs.len() as u64) as usize;
        let contig = &contigs[contig_index];
        let bases = reference.sequence(&contig.name).expect("contig exists");
        let span = 6 + rng.below(8) as u32;
        let start = 1 + rng.below(u64::from(contig.len - span)) as u32;
        let window = &bases[(start - 1) as usize..(start - 1 + span) as usize];

        let (cigar, mut seq) = match rng.below(5) {
            0 => {
                let mut seq = window[..3].to_vec();
                seq.push(b'T');
                seq.extend_from_slice(&window[3..]);
                (format!("3M1I{}M", span - 3), seq)
            }
            1 => {
                let mut seq = window[..2].to_vec();
                seq.extend_from_slice(&window[3..]);
                (format!("2M1D{}M", span - 3), seq)
            }
            _ => (format!("{span}M"), window.to_vec()),
        };
        if rng.below(3) == 0 {
            let at = rng.below(seq.len() as u64) as usize;
            seq[at] = match seq[at] {
                b'A' => b'C',
                b'C' => b'G',
                b'G' => b'T',
                _ => b'A',
            };
        }
        let quals: Vec<u8> = (0..seq.len()).map(|_| 2 + rng.below(39) as u8).collect();
        let strand = if rng.below(2) == 0 {
            Strand::Forward
        } else {
            Strand::Reverse
        };

        let record = AlignmentRecord::new(
            Arc::clone(&contig.name),
            start,
            CigarOp::parse_cigar(&cigar).expect("valid cigar"),
            seq,
            quals,
            strand,
        )
        .with_name(format!("read{idx}"))
        .with_mapq(rng.below(61) as u8);
        reads.push((contig_index, record));
    }

    reads.sort_by_key(|(contig_index, record)| (*contig_index, record.start));
    reads.into_iter().map(|(_, record)| record).collect()
}

/// Hook that counts its lifecycle calls and returns the accumulator.
#[derive(Debug, Default)]
pub struct CountingHook {
    pub initialized: u32,
    pub completed: u32,
    pub released: u32,
    pub fail_initialize: bool,
}

impl CountingHook {
    pub fn failing() -> Self {
        Self {
            fail_initialize: true,
            ..Self::default()
        }
    }
}

impl<A> CompletionHook<A> for CountingHook {
    type Output = A;

    fn initialize(&mut self) -> Result<(), ResourceError> {
        self.initialized += 1;
        if self.fail_initialize {
            return Err(ResourceError::other("output directory is read-only"));
        }
        Ok(())
    }

    fn on_traversal_done(&mut self, accumulator: A) -> Result<A, ResourceError> {
        self.completed += 1;
        Ok(accumulator)
    }

    fn release(&mut self) {
        self.released += 1;
    }
}
