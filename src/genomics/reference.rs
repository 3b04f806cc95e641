use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use rust_htslib::faidx;

/// Whether a base belongs to the regular A/C/G/T alphabet.
///
/// Anything else (N, IUPAC ambiguity codes) is irregular and excluded from
/// mismatch and indel scoring.
pub fn is_regular_base(base: u8) -> bool {
    base_index(base).is_some()
}

/// Index of a regular base in `[A, C, G, T]` order.
pub fn base_index(base: u8) -> Option<usize> {
    match base {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' => Some(3),
        _ => None,
    }
}

/// Name and length of one reference contig.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContigInfo {
    /// Contig name.
    pub name: Arc<str>,
    /// Number of bases.
    pub len: u32,
}

/// Read-only access to reference bases, shared across shards without locking.
pub trait ReferenceSource: Send + Sync {
    /// Contigs in dictionary (sort) order.
    fn contigs(&self) -> &[ContigInfo];

    /// Bases of `contig` over the closed 1-based range `[start, end]`.
    ///
    /// Returns `None` if the contig is unknown or the range leaves it.
    fn fetch(&self, contig: &str, start: u32, end: u32) -> Option<Vec<u8>>;

    /// Dictionary index of a contig.
    fn contig_index(&self, contig: &str) -> Option<usize> {
        self.contigs()
            .iter()
            .position(|info| info.name.as_ref() == contig)
    }

    /// Length of a contig.
    fn contig_len(&self, contig: &str) -> Option<u32> {
        self.contig_index(contig).map(|idx| self.contigs()[idx].len)
    }

    /// Single base at a 1-based position.
    fn base(&self, contig: &str, position: u32) -> Option<u8> {
        self.fetch(contig, position, position)
            .and_then(|bases| bases.first().copied())
    }
}

/// Reference held fully in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReference {
    contigs: Vec<ContigInfo>,
    sequences: Vec<Arc<[u8]>>,
    index: HashMap<Arc<str>, usize>,
}

impl InMemoryReference {
    /// Create an empty reference.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a contig; bases are uppercased. A repeated name replaces the earlier sequence.
    pub fn with_contig(mut self, name: impl Into<Arc<str>>, bases: impl AsRef<[u8]>) -> Self {
        self.push_contig(name.into(), bases.as_ref().to_ascii_uppercase());
        self
    }

    fn push_contig(&mut self, name: Arc<str>, bases: Vec<u8>) {
        let info = ContigInfo {
            name: Arc::clone(&name),
            len: bases.len() as u32,
        };
        match self.index.get(&name) {
            Some(&idx) => {
                self.contigs[idx] = info;
                self.sequences[idx] = Arc::from(bases.into_boxed_slice());
            }
            None => {
                self.index.insert(name, self.contigs.len());
                self.contigs.push(info);
                self.sequences.push(Arc::from(bases.into_boxed_slice()));
            }
        }
    }

    /// Load a FASTA file through htslib's faidx.
    ///
    /// Contigs keep the order of the index. A missing `.fai` is built next to
    /// the FASTA, so its directory must be writable in that case.
    pub fn from_fasta_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = faidx::Reader::from_path(path)
            .with_context(|| format!("failed to index FASTA {}", path.display()))?;

        let mut reference = Self::new();
        for idx in 0..reader.n_seqs() {
            let name = reader
                .seq_name(i32::try_from(idx)?)
                .with_context(|| format!("failed to read name of sequence {idx}"))?;
            let len = reader.fetch_seq_len(&name);
            let bases = if len == 0 {
                Vec::new()
            } else {
                reader
                    .fetch_seq_string(&name, 0, (len - 1) as usize)
                    .with_context(|| format!("failed to fetch contig '{name}'"))?
                    .into_bytes()
            };
            reference.push_contig(Arc::from(name), bases.to_ascii_uppercase());
        }
        if reference.contigs.is_empty() {
            bail!("FASTA {} holds no sequences", path.display());
        }
        Ok(reference)
    }

    /// Full sequence of a contig.
    pub fn sequence(&self, contig: &str) -> Option<&[u8]> {
        self.index
            .get(contig)
            .map(|&idx| self.sequences[idx].as_ref())
    }
}

impl ReferenceSource for InMemoryReference {
    fn contigs(&self) -> &[ContigInfo] {
        &self.contigs
    }

    fn fetch(&self, contig: &str, start: u32, end: u32) -> Option<Vec<u8>> {
        let sequence = self.sequence(contig)?;
        if start == 0 || start > end || end as usize > sequence.len() {
            return None;
        }
        Some(sequence[(start - 1) as usize..end as usize].to_vec())
    }

    fn contig_index(&self, contig: &str) -> Option<usize> {
        self.index.get(contig).copied()
    }

    fn base(&self, contig: &str, position: u32) -> Option<u8> {
        let sequence = self.sequence(contig)?;
        position
            .checked_sub(1)
            .and_then(|offset| sequence.get(offset as usize).copied())
    }
}
