use serde::Serialize;

use crate::data::{WordEntry, WordList};

/// Number of entries a freshly opened range picker spans.
pub const DEFAULT_SPAN: u32 = 20;

/// Entries with `start <= sid <= end`, in list order.
///
/// A range that misses the list entirely (or has `start > end`) simply
/// matches nothing.
pub fn filter(list: &WordList, start: u32, end: u32) -> Vec<&WordEntry> {
    list.entries()
        .iter()
        .filter(|entry| start <= entry.sid && entry.sid <= end)
        .collect()
}

/// A start/end pair that has been clamped into a list's SID bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RangeSelection {
    pub start: u32,
    pub end: u32,
}

impl RangeSelection {
    /// Resolves the range pickers' raw values. Start defaults to the first SID,
    /// end to a twenty-entry window; both are clamped rather than rejected.
    pub fn resolve(bounds: (u32, u32), start: Option<u32>, end: Option<u32>) -> Self {
        let (min, max) = bounds;
        let start = start.unwrap_or(min).clamp(min, max);
        let end = end
            .unwrap_or_else(|| start.saturating_add(DEFAULT_SPAN - 1).min(max))
            .clamp(start, max);
        Self { start, end }
    }

    /// Same as [`RangeSelection::resolve`], using the bounds of `list`.
    pub fn for_list(list: &WordList, start: Option<u32>, end: Option<u32>) -> Option<Self> {
        list.bounds()
            .map(|bounds| Self::resolve(bounds, start, end))
    }

    pub fn apply<'a>(&self, list: &'a WordList) -> Vec<&'a WordEntry> {
        filter(list, self.start, self.end)
    }
}
