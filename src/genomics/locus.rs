use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

/// A single reference coordinate plus the reference base there.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Locus {
    /// Contig name.
    pub contig: Arc<str>,
    /// 1-based position on the contig.
    pub position: u32,
    /// Reference base at the position (uppercase ASCII).
    pub ref_base: u8,
}

impl Locus {
    /// Construct a locus.
    pub fn new(contig: impl Into<Arc<str>>, position: u32, ref_base: u8) -> Self {
        Self {
            contig: contig.into(),
            position,
            ref_base,
        }
    }

    /// Whether the reference base is one of A, C, G, T.
    pub fn has_regular_base(&self) -> bool {
        crate::genomics::is_regular_base(self.ref_base)
    }
}

impl fmt::Display for Locus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.contig, self.position)
    }
}

/// Error returned when an interval string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid interval '{input}': expected 'chr', 'chr:pos', 'chr:start-end' or 'chr:start+' ({reason})")]
pub struct IntervalParseError {
    /// Text that failed to parse.
    pub input: String,
    /// What went wrong.
    pub reason: String,
}

/// Closed, 1-based interval on one contig.
///
/// An open-ended interval (`chr:start+`, or a bare contig) stores
/// `u32::MAX` as its end and is clamped against the reference later.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct GenomicInterval {
    /// Contig name.
    pub contig: Arc<str>,
    /// First position (1-based, inclusive).
    pub start: u32,
    /// Last position (1-based, inclusive).
    pub end: u32,
}

impl GenomicInterval {
    /// Construct an interval; `start` must not exceed `end`.
    pub fn new(contig: impl Into<Arc<str>>, start: u32, end: u32) -> Self {
        debug_assert!(start <= end, "interval start past end");
        Self {
            contig: contig.into(),
            start,
            end,
        }
    }

    /// Whole contig.
    pub fn contig(contig: impl Into<Arc<str>>) -> Self {
        Self::new(contig, 1, u32::MAX)
    }

    /// Number of positions covered.
    pub fn len(&self) -> u64 {
        u64::from(self.end - self.start) + 1
    }

    /// Always false; intervals cover at least one position.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether the position lies inside the interval.
    pub fn contains(&self, contig: &str, position: u32) -> bool {
        self.contig.as_ref() == contig && position >= self.start && position <= self.end
    }

    /// Whether two intervals share at least one position.
    pub fn overlaps(&self, other: &GenomicInterval) -> bool {
        self.contig == other.contig && self.start <= other.end && other.start <= self.end
    }

    /// Clamp the end to a contig length.
    pub fn clamped(&self, contig_len: u32) -> Option<GenomicInterval> {
        if self.start > contig_len {
            return None;
        }
        Some(GenomicInterval::new(
            Arc::clone(&self.contig),
            self.start,
            self.end.min(contig_len),
        ))
    }

    /// Parse a `;`-separated interval list, then sort and merge it.
    ///
    /// Sorting is by contig name then start; callers that need reference
    /// dictionary order re-sort against the reference.
    pub fn parse_list(text: &str) -> Result<Vec<GenomicInterval>, IntervalParseError> {
        let parsed = text
            .split(';')
            .map(str::trim)
            .filter(|piece| !piece.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<GenomicInterval>, _>>()?;
        Ok(merge_intervals(parsed, |a, b| {
            a.contig.cmp(&b.contig).then(a.start.cmp(&b.start))
        }))
    }
}

/// Sort intervals with `order` and merge overlapping or abutting neighbours.
pub fn merge_intervals<F>(mut intervals: Vec<GenomicInterval>, order: F) -> Vec<GenomicInterval>
where
    F: FnMut(&GenomicInterval, &GenomicInterval) -> std::cmp::Ordering,
{
    intervals.sort_by(order);
    let mut merged: Vec<GenomicInterval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        match merged.last_mut() {
            Some(last)
                if last.contig == interval.contig
                    && u64::from(interval.start) <= u64::from(last.end) + 1 =>
            {
                last.end = last.end.max(interval.end);
            }
            _ => merged.push(interval),
        }
    }
    merged
}

fn parse_position(text: &str, input: &str) -> Result<u32, IntervalParseError> {
    let digits: String = text.chars().filter(|c| *c != ',').collect();
    let value: u32 = digits.parse().map_err(|_| IntervalParseError {
        input: input.to_string(),
        reason: format!("'{text}' is not a position"),
    })?;
    if value == 0 {
        return Err(IntervalParseError {
            input: input.to_string(),
            reason: "positions are 1-based".to_string(),
        });
    }
    Ok(value)
}

impl FromStr for GenomicInterval {
    type Err = IntervalParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let fail = |reason: &str| IntervalParseError {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let (contig, range) = match input.split_once(':') {
            Some((contig, range)) => (contig, Some(range)),
            None => (input, None),
        };
        if contig.is_empty() || contig.chars().any(char::is_whitespace) {
            return Err(fail("missing contig name"));
        }

        let Some(range) = range else {
            return Ok(GenomicInterval::contig(contig));
        };

        if let Some(start) = range.strip_suffix('+') {
            let start = parse_position(start, input)?;
            return Ok(GenomicInterval::new(contig, start, u32::MAX));
        }

        match range.split_once('-') {
            Some((start, end)) => {
                let start = parse_position(start, input)?;
                let end = parse_position(end, input)?;
                if start > end {
                    return Err(fail("start is past end"));
                }
                Ok(GenomicInterval::new(contig, start, end))
            }
            None => {
                let pos = parse_position(range, input)?;
                Ok(GenomicInterval::new(contig, pos, pos))
            }
        }
    }
}

impl fmt::Display for GenomicInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.end == u32::MAX {
            if self.start == 1 {
                write!(f, "{}", self.contig)
            } else {
                write!(f, "{}:{}+", self.contig, self.start)
            }
        } else {
            write!(f, "{}:{}-{}", self.contig, self.start, self.end)
        }
    }
}
