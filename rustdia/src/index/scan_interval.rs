use std::borrow::Cow;

use rustc_hash::FxHashMap;

use crate::index::window::{Window, WindowBounds, WindowTable};

/// Per-group window indices sorted by `scan_min`, without a borrow of the window table.
///
/// The MS1 window is not indexed. Intervals of one group are expected to be disjoint;
/// if they overlap, the window registered first (lowest window index) wins.
#[derive(Debug, Clone, Default)]
pub struct ScanIntervals {
    groups: FxHashMap<u32, Vec<usize>>,
}

impl ScanIntervals {
    pub fn build(table: &WindowTable) -> Self {
        let mut groups: FxHashMap<u32, Vec<usize>> = FxHashMap::default();
        for window in table.windows().iter().skip(1) {
            groups.entry(window.group_id).or_default().push(window.window_index);
        }
        for indices in groups.values_mut() {
            indices.sort_by_key(|&i| table.windows()[i].scan_min);
        }
        ScanIntervals { groups }
    }

    /// `table` must be the table these intervals were built from.
    pub fn lookup_window<'t>(&self, table: &'t WindowTable, group_id: u32, scan: u32) -> Option<&'t Window> {
        let windows = table.windows();
        let indices = self.groups.get(&group_id)?;

        // only intervals starting at or before the scan can contain it
        let upper = indices.partition_point(|&i| windows[i].scan_min <= scan);
        indices[..upper]
            .iter()
            .map(|&i| &windows[i])
            .filter(|w| w.contains_scan(scan))
            .min_by_key(|w| w.window_index)
    }

    /// Number of indexed intervals.
    pub fn len(&self) -> usize {
        self.groups.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Maps `(window_group, scan)` to the window whose closed scan interval contains the scan.
pub struct ScanIntervalIndex<'a> {
    table: &'a WindowTable,
    intervals: Cow<'a, ScanIntervals>,
}

impl<'a> ScanIntervalIndex<'a> {
    pub fn build(table: &'a WindowTable) -> Self {
        ScanIntervalIndex {
            table,
            intervals: Cow::Owned(ScanIntervals::build(table)),
        }
    }

    /// Reuses intervals built earlier from `table`.
    pub fn with_intervals(table: &'a WindowTable, intervals: &'a ScanIntervals) -> Self {
        ScanIntervalIndex {
            table,
            intervals: Cow::Borrowed(intervals),
        }
    }

    pub fn lookup(&self, group_id: u32, scan: u32) -> Option<WindowBounds> {
        self.lookup_window(group_id, scan).map(Window::bounds)
    }

    pub fn lookup_window(&self, group_id: u32, scan: u32) -> Option<&'a Window> {
        self.intervals.lookup_window(self.table, group_id, scan)
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}
