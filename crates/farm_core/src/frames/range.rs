//! Textual frame range grammar.
//!
//! User input is a comma separated list of tokens, each either a bare
//! non-negative integer or `start-end` with `start <= end`. Whitespace is
//! ignored. The machine form sent to the dispatcher is a JSON-style list
//! such as `[[1,3],7]`.

use super::types::{FrameRangeError, FrameRangeResult, FrameSet, RangeItem};

/// Longest expanded frame list (`[1,2,...]`) accepted for one job.
pub const MAX_EXPANDED_CHARS: usize = 75_000;

/// Parse user text into its range items, preserving input order.
pub fn parse_items(text: &str) -> FrameRangeResult<Vec<RangeItem>> {
    let stripped: String = text.chars().filter(|c| !c.is_whitespace()).collect();

    stripped.split(',').map(parse_token).collect()
}

fn parse_token(token: &str) -> FrameRangeResult<RangeItem> {
    if let Some(frame) = parse_frame(token) {
        return Ok(RangeItem::Single(frame));
    }

    let parts: Vec<&str> = token.split('-').collect();
    if parts.len() != 2 {
        return Err(FrameRangeError::invalid_token(token));
    }

    let start = parse_frame(parts[0]).ok_or_else(|| FrameRangeError::invalid_token(token))?;
    let end = parse_frame(parts[1]).ok_or_else(|| FrameRangeError::invalid_token(token))?;
    RangeItem::span(start, end)
}

/// Digits only; `u32::from_str` would also accept a leading `+`.
fn parse_frame(token: &str) -> Option<u32> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

/// Parse user text into a frame set.
///
/// Ranges whose expanded list would exceed [`MAX_EXPANDED_CHARS`] are
/// rejected before any frame is materialized.
pub fn parse(text: &str) -> FrameRangeResult<FrameSet> {
    let items = parse_items(text)?;
    check_items_size(&items)?;
    Ok(expand(&items))
}

/// Flatten range items into the set of frames they cover.
///
/// Unbounded: callers holding untrusted items run [`check_items_size`]
/// first.
pub fn expand(items: &[RangeItem]) -> FrameSet {
    items
        .iter()
        .flat_map(|item| match *item {
            RangeItem::Single(frame) => frame..=frame,
            RangeItem::Span(start, end) => start..=end,
        })
        .collect()
}

/// Render a frame set as compact user text.
///
/// Runs of three or more consecutive frames become `a-b`; shorter runs are
/// listed frame by frame, so `{1,2,3,5,7,8}` renders as `1-3,5,7,8`.
pub fn render(frames: &FrameSet) -> String {
    let mut parts = Vec::new();
    for (start, end) in frames.runs() {
        if end - start >= 2 {
            parts.push(format!("{}-{}", start, end));
        } else {
            parts.extend((start..=end).map(|f| f.to_string()));
        }
    }
    parts.join(",")
}

/// Compact range items for a frame set, using the same run rule as
/// [`render`].
pub fn to_items(frames: &FrameSet) -> Vec<RangeItem> {
    let mut items = Vec::new();
    for (start, end) in frames.runs() {
        if end - start >= 2 {
            items.push(RangeItem::Span(start, end));
        } else {
            items.extend((start..=end).map(RangeItem::Single));
        }
    }
    items
}

/// Character count of the fully expanded list `[a,b,c,...]`.
pub fn expanded_len(frames: &FrameSet) -> usize {
    list_len(frames.runs().into_iter().map(|(a, b)| (a as u64, b as u64)))
}

/// Character count of the expanded list for `items`, computed from span
/// bounds without expanding them. Overlapping items count once.
pub fn items_expanded_len(items: &[RangeItem]) -> usize {
    let mut bounds: Vec<(u64, u64)> = items
        .iter()
        .map(|item| match *item {
            RangeItem::Single(frame) => (frame as u64, frame as u64),
            RangeItem::Span(start, end) => (start as u64, end as u64),
        })
        .collect();
    bounds.sort_unstable();

    let mut merged: Vec<(u64, u64)> = Vec::with_capacity(bounds.len());
    for (start, end) in bounds {
        match merged.last_mut() {
            Some((_, last)) if start <= *last + 1 => *last = (*last).max(end),
            _ => merged.push((start, end)),
        }
    }
    list_len(merged.into_iter())
}

/// Length of `[...]` over disjoint inclusive runs.
fn list_len(runs: impl Iterator<Item = (u64, u64)>) -> usize {
    let (mut frames, mut digits) = (0u64, 0u64);
    for (start, end) in runs {
        frames += end - start + 1;
        digits += digits_between(start, end);
    }
    let chars = digits + frames.saturating_sub(1) + 2;
    usize::try_from(chars).unwrap_or(usize::MAX)
}

/// Total decimal digits of every integer in `start..=end`.
fn digits_between(start: u64, end: u64) -> u64 {
    let mut total = 0;
    let mut low = 0u64;
    let mut high = 9u64;
    for width in 1..=20u64 {
        let from = start.max(low);
        let to = end.min(high);
        if from <= to {
            total += (to - from + 1) * width;
        }
        if high >= end {
            break;
        }
        low = high + 1;
        high = high.saturating_mul(10).saturating_add(9);
    }
    total
}

/// Reject frame sets whose expanded list is too long to dispatch.
pub fn check_size(frames: &FrameSet) -> FrameRangeResult<()> {
    too_large(expanded_len(frames))
}

/// Reject range items whose expanded list would be too long to dispatch.
pub fn check_items_size(items: &[RangeItem]) -> FrameRangeResult<()> {
    too_large(items_expanded_len(items))
}

fn too_large(chars: usize) -> FrameRangeResult<()> {
    if chars > MAX_EXPANDED_CHARS {
        return Err(FrameRangeError::TooLarge {
            chars,
            max: MAX_EXPANDED_CHARS,
        });
    }
    Ok(())
}

impl FrameSet {
    /// Machine form, e.g. `[[1,3],5,7,8]`.
    pub fn to_canonical(&self) -> String {
        let items = to_items(self);
        serde_json::to_string(&items).unwrap_or_else(|_| "[]".to_string())
    }

    /// Parse the machine form back into a set.
    pub fn from_canonical(text: &str) -> FrameRangeResult<Self> {
        let items: Vec<RangeItem> = serde_json::from_str(text)
            .map_err(|e| FrameRangeError::Canonical(e.to_string()))?;
        for item in &items {
            if let RangeItem::Span(start, end) = *item {
                if start > end {
                    return Err(FrameRangeError::reversed(start, end));
                }
            }
        }
        check_items_size(&items)?;
        Ok(expand(&items))
    }
}
