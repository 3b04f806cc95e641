use std::cmp::Ordering;
use std::sync::Arc;

use crate::framework::MalformedInputError;
use crate::genomics::{merge_intervals, GenomicInterval, ReferenceSource};

/// Interval resolved against the reference dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanInterval {
    /// Dictionary index of the contig.
    pub contig_index: usize,
    /// Closed 1-based interval, clamped to the contig.
    pub interval: GenomicInterval,
}

/// Ordered, disjoint set of reference positions a traversal covers.
///
/// Intervals are sorted by (dictionary index, start) and never overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalSpan {
    intervals: Vec<SpanInterval>,
}

impl TraversalSpan {
    /// Resolve optional user intervals against the reference.
    ///
    /// `None` covers every base of every contig.
    pub fn resolve(
        reference: &dyn ReferenceSource,
        intervals: Option<&[GenomicInterval]>,
    ) -> Result<Self, MalformedInputError> {
        let Some(intervals) = intervals else {
            return Ok(Self {
                intervals: reference
                    .contigs()
                    .iter()
                    .enumerate()
                    .filter(|(_, info)| info.len > 0)
                    .map(|(idx, info)| SpanInterval {
                        contig_index: idx,
                        interval: GenomicInterval::new(Arc::clone(&info.name), 1, info.len),
                    })
                    .collect(),
            });
        };

        let mut clamped = Vec::with_capacity(intervals.len());
        for interval in intervals {
            let contig_len = reference.contig_len(&interval.contig).ok_or_else(|| {
                MalformedInputError::UnknownContig {
                    contig: Arc::clone(&interval.contig),
                }
            })?;
            let resolved = interval
                .clamped(contig_len)
                .ok_or_else(|| MalformedInputError::IntervalOutOfRange(interval.to_string()))?;
            clamped.push(resolved);
        }

        let merged = merge_intervals(clamped, |a, b| {
            let ai = reference.contig_index(&a.contig);
            let bi = reference.contig_index(&b.contig);
            ai.cmp(&bi).then(a.start.cmp(&b.start))
        });

        Ok(Self {
            intervals: merged
                .into_iter()
                .filter_map(|interval| {
                    reference
                        .contig_index(&interval.contig)
                        .map(|contig_index| SpanInterval {
                            contig_index,
                            interval,
                        })
                })
                .collect(),
        })
    }

    fn from_pieces(intervals: Vec<SpanInterval>) -> Self {
        Self { intervals }
    }

    /// Resolved intervals in traversal order.
    pub fn intervals(&self) -> &[SpanInterval] {
        &self.intervals
    }

    /// Plain intervals, e.g. for querying an alignment source.
    pub fn to_intervals(&self) -> Vec<GenomicInterval> {
        self.intervals.iter().map(|s| s.interval.clone()).collect()
    }

    /// Total number of positions covered.
    pub fn total_len(&self) -> u64 {
        self.intervals.iter().map(|s| s.interval.len()).sum()
    }

    /// Whether the span covers no position.
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// First covered position at or after `(contig_index, position)`.
    ///
    /// `None` means the coordinate lies past the final interval.
    pub fn snap(&self, contig_index: usize, position: u32) -> Option<(usize, u32)> {
        let idx = self.intervals.partition_point(|s| {
            match s.contig_index.cmp(&contig_index) {
                Ordering::Less => true,
                Ordering::Equal => s.interval.end < position,
                Ordering::Greater => false,
            }
        });
        let next = self.intervals.get(idx)?;
        if next.contig_index == contig_index && next.interval.start <= position {
            Some((contig_index, position))
        } else {
            Some((next.contig_index, next.interval.start))
        }
    }

    /// Whether the coordinate is covered.
    pub fn contains(&self, contig_index: usize, position: u32) -> bool {
        self.snap(contig_index, position) == Some((contig_index, position))
    }

    /// Split into at most `shards` contiguous, disjoint spans of roughly equal length.
    ///
    /// Shards come back in ascending coordinate order; an interval may be cut
    /// so that its left part ends one base before the right part starts.
    pub fn partition(&self, shards: usize) -> Vec<TraversalSpan> {
        let shards = shards.max(1);
        let total = self.total_len();
        if total == 0 {
            return Vec::new();
        }
        let target = total.div_ceil(shards as u64).max(1);

        let mut result = Vec::with_capacity(shards);
        let mut current: Vec<SpanInterval> = Vec::new();
        let mut filled = 0u64;

        for piece in &self.intervals {
            let mut start = piece.interval.start;
            let end = piece.interval.end;
            loop {
                let remaining_in_piece = u64::from(end - start) + 1;
                let room = target - filled;
                if remaining_in_piece <= room {
                    current.push(SpanInterval {
                        contig_index: piece.contig_index,
                        interval: GenomicInterval::new(Arc::clone(&piece.interval.contig), start, end),
                    });
                    filled += remaining_in_piece;
                    if filled == target {
                        result.push(Self::from_pieces(std::mem::take(&mut current)));
                        filled = 0;
                    }
                    break;
                }
                let cut = start + (room as u32) - 1;
                current.push(SpanInterval {
                    contig_index: piece.contig_index,
                    interval: GenomicInterval::new(Arc::clone(&piece.interval.contig), start, cut),
                });
                result.push(Self::from_pieces(std::mem::take(&mut current)));
                filled = 0;
                start = cut + 1;
            }
        }
        if !current.is_empty() {
            result.push(Self::from_pieces(current));
        }
        result
    }
}
