use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::genomics::Locus;

/// Reference-ordered datum: an external annotation keyed by coordinate.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Rod {
    /// Track the record came from (e.g. `dbsnp`).
    pub track: Arc<str>,
    /// Contig name.
    pub contig: Arc<str>,
    /// 1-based position.
    pub position: u32,
    /// Record identifier (e.g. `rs123`).
    pub id: String,
    /// Free-form payload, such as the alleles of a known variant.
    pub value: String,
}

/// Annotation lookup by track name and locus.
pub trait AnnotationSource: Send + Sync {
    /// Names of all tracks this source can answer for.
    fn tracks(&self) -> Vec<Arc<str>>;

    /// Record on `track` at the locus, or `None` when absent.
    fn lookup(&self, track: &str, locus: &Locus) -> Option<Rod>;
}

/// Annotations bound to one locus: one slot per requested track.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotations {
    entries: Vec<(Arc<str>, Option<Rod>)>,
}

impl Annotations {
    /// No tracks requested.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Resolve every track against the source.
    pub fn collect(source: &dyn AnnotationSource, tracks: &[Arc<str>], locus: &Locus) -> Self {
        Self {
            entries: tracks
                .iter()
                .map(|track| (Arc::clone(track), source.lookup(track, locus)))
                .collect(),
        }
    }

    /// Record for a track, when the track was requested and has data here.
    pub fn get(&self, track: &str) -> Option<&Rod> {
        self.entries
            .iter()
            .find(|(name, _)| name.as_ref() == track)
            .and_then(|(_, rod)| rod.as_ref())
    }

    /// Whether any track has a record at this locus.
    pub fn any_present(&self) -> bool {
        self.entries.iter().any(|(_, rod)| rod.is_some())
    }

    /// Present records in track order.
    pub fn present(&self) -> impl Iterator<Item = &Rod> {
        self.entries.iter().filter_map(|(_, rod)| rod.as_ref())
    }
}

/// Tracks held in memory, indexed by contig then position.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAnnotations {
    tracks: BTreeMap<Arc<str>, HashMap<Arc<str>, BTreeMap<u32, Rod>>>,
}

impl InMemoryAnnotations {
    /// Create an empty annotation store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record; a later record at the same position replaces the earlier one.
    pub fn insert(&mut self, rod: Rod) {
        self.tracks
            .entry(Arc::clone(&rod.track))
            .or_default()
            .entry(Arc::clone(&rod.contig))
            .or_default()
            .insert(rod.position, rod);
    }

    /// Builder-style insert.
    pub fn with_record(
        mut self,
        track: &str,
        contig: &str,
        position: u32,
        id: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.insert(Rod {
            track: Arc::from(track),
            contig: Arc::from(contig),
            position,
            id: id.into(),
            value: value.into(),
        });
        self
    }
}

impl AnnotationSource for InMemoryAnnotations {
    fn tracks(&self) -> Vec<Arc<str>> {
        self.tracks.keys().cloned().collect()
    }

    fn lookup(&self, track: &str, locus: &Locus) -> Option<Rod> {
        self.tracks
            .get(track)?
            .get(locus.contig.as_ref())?
            .get(&locus.position)
            .cloned()
    }
}
