//! Frame set and range types.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while parsing or validating frame ranges.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameRangeError {
    /// A token is neither an integer nor a `start-end` pair.
    #[error("Invalid frame range token '{token}'")]
    InvalidToken { token: String },

    /// A `start-end` pair with `start > end`.
    #[error("Frame range {start}-{end} is reversed")]
    Reversed { start: u32, end: u32 },

    /// The machine-readable form could not be parsed.
    #[error("Invalid canonical frame list: {0}")]
    Canonical(String),

    /// The expanded frame list exceeds the dispatcher's argument limit.
    #[error("Frame range too large ({chars} characters after expansion, maximum {max})")]
    TooLarge { chars: usize, max: usize },
}

impl FrameRangeError {
    pub fn invalid_token(token: impl Into<String>) -> Self {
        Self::InvalidToken {
            token: token.into(),
        }
    }

    pub fn reversed(start: u32, end: u32) -> Self {
        Self::Reversed { start, end }
    }
}

/// Result type for frame range operations.
pub type FrameRangeResult<T> = Result<T, FrameRangeError>;

/// One element of a range list: a single frame or an inclusive span.
///
/// Serializes to the machine form used on the wire: `7` or `[1,3]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RangeItem {
    Single(u32),
    Span(u32, u32),
}

impl RangeItem {
    /// Build a span, rejecting `start > end`.
    pub fn span(start: u32, end: u32) -> FrameRangeResult<Self> {
        if start > end {
            return Err(FrameRangeError::reversed(start, end));
        }
        Ok(Self::Span(start, end))
    }
}

/// Ordered set of unique frame numbers targeted by a job.
///
/// Immutable once built; equality is set equality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameSet(BTreeSet<u32>);

impl FrameSet {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// A set holding one frame.
    pub fn single(frame: u32) -> Self {
        Self(BTreeSet::from([frame]))
    }

    /// Inclusive `start..=end`; errors when `start > end`.
    pub fn span(start: u32, end: u32) -> FrameRangeResult<Self> {
        if start > end {
            return Err(FrameRangeError::reversed(start, end));
        }
        Ok(Self((start..=end).collect()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, frame: u32) -> bool {
        self.0.contains(&frame)
    }

    /// Frames in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }

    pub fn first(&self) -> Option<u32> {
        self.0.first().copied()
    }

    pub fn last(&self) -> Option<u32> {
        self.0.last().copied()
    }

    /// Frames in `self` that are not in `other`.
    pub fn difference(&self, other: &FrameSet) -> FrameSet {
        Self(self.0.difference(&other.0).copied().collect())
    }

    /// Contiguous runs as `(start, end)` pairs, ascending.
    pub fn runs(&self) -> Vec<(u32, u32)> {
        let mut runs: Vec<(u32, u32)> = Vec::new();
        for frame in self.iter() {
            match runs.last_mut() {
                Some((_, end)) if end.checked_add(1) == Some(frame) => *end = frame,
                _ => runs.push((frame, frame)),
            }
        }
        runs
    }
}

impl FromIterator<u32> for FrameSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<u32>> for FrameSet {
    fn from(frames: Vec<u32>) -> Self {
        frames.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_rejects_reversed_bounds() {
        assert_eq!(FrameSet::span(3, 1), Err(FrameRangeError::reversed(3, 1)));
        assert_eq!(FrameSet::span(2, 2).unwrap(), FrameSet::single(2));
    }

    #[test]
    fn runs_group_consecutive_frames() {
        let set = FrameSet::from(vec![8, 1, 2, 3, 5, 7]);
        assert_eq!(set.runs(), vec![(1, 3), (5, 5), (7, 8)]);
        assert!(FrameSet::new().runs().is_empty());
    }

    #[test]
    fn difference_removes_present_frames() {
        let expected = FrameSet::span(1, 4).unwrap();
        let present = FrameSet::from(vec![1, 3]);
        assert_eq!(expected.difference(&present), FrameSet::from(vec![2, 4]));
    }

    #[test]
    fn range_items_use_wire_form() {
        let items = vec![RangeItem::Span(1, 3), RangeItem::Single(7)];
        assert_eq!(serde_json::to_string(&items).unwrap(), "[[1,3],7]");
    }
}
