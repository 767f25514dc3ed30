use itertools::Itertools;

use crate::error::Result;

/// Column names of every table produced by raw extraction, in order.
pub const RAW_COLUMNS: [&str; 4] = ["frame", "scan", "mz_index", "intensity"];

/// Columnar raw measurements: one row per detected peak, all columns of equal length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFrameTable {
    pub frame: Vec<u32>,
    pub scan: Vec<u32>,
    pub mz_index: Vec<u32>,
    pub intensity: Vec<u32>,
}

impl RawFrameTable {
    pub fn new() -> Self {
        RawFrameTable::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        RawFrameTable {
            frame: Vec::with_capacity(capacity),
            scan: Vec::with_capacity(capacity),
            mz_index: Vec::with_capacity(capacity),
            intensity: Vec::with_capacity(capacity),
        }
    }

    pub fn columns(&self) -> &'static [&'static str; 4] {
        &RAW_COLUMNS
    }

    pub fn num_columns(&self) -> usize {
        RAW_COLUMNS.len()
    }

    pub fn len(&self) -> usize {
        self.frame.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.is_empty()
    }

    pub fn push(&mut self, frame: u32, scan: u32, mz_index: u32, intensity: u32) {
        self.frame.push(frame);
        self.scan.push(scan);
        self.mz_index.push(mz_index);
        self.intensity.push(intensity);
    }

    pub fn append(&mut self, mut other: RawFrameTable) {
        self.frame.append(&mut other.frame);
        self.scan.append(&mut other.scan);
        self.mz_index.append(&mut other.mz_index);
        self.intensity.append(&mut other.intensity);
    }

    /// Concatenates tables in the given order.
    pub fn concat(tables: Vec<RawFrameTable>) -> Self {
        let total = tables.iter().map(|t| t.len()).sum();
        let mut result = RawFrameTable::with_capacity(total);
        for table in tables {
            result.append(table);
        }
        result
    }

    pub fn rows(&self) -> impl Iterator<Item = (u32, u32, u32, u32)> + '_ {
        (0..self.len()).map(move |i| (self.frame[i], self.scan[i], self.mz_index[i], self.intensity[i]))
    }

    /// Distinct frame ids in order of first appearance.
    pub fn distinct_frames(&self) -> Vec<u32> {
        self.frame.iter().copied().unique().collect()
    }

    pub fn intensity_sum(&self) -> u64 {
        self.intensity.iter().map(|&x| x as u64).sum()
    }
}

/// Per-frame raw data primitive: all peaks of `frame_id` with
/// `scan_begin <= scan <= scan_end`, taking every `scan_step`-th scan from `scan_begin`.
pub trait RawExtractor: Send + Sync {
    fn extract_raw(
        &self,
        frame_id: u32,
        scan_begin: u32,
        scan_end: u32,
        scan_step: u32,
    ) -> Result<RawFrameTable>;
}

impl<T: RawExtractor + ?Sized> RawExtractor for Box<T> {
    fn extract_raw(&self, frame_id: u32, scan_begin: u32, scan_end: u32, scan_step: u32) -> Result<RawFrameTable> {
        (**self).extract_raw(frame_id, scan_begin, scan_end, scan_step)
    }
}

/// True if `scan` falls into the inclusive range and on the step grid anchored at `scan_begin`.
pub fn scan_selected(scan: u32, scan_begin: u32, scan_end: u32, scan_step: u32) -> bool {
    scan >= scan_begin && scan <= scan_end && (scan - scan_begin) % scan_step.max(1) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_keeps_order() {
        let mut a = RawFrameTable::new();
        a.push(3, 1, 10, 5);
        a.push(3, 2, 20, 6);
        let mut b = RawFrameTable::with_capacity(1);
        b.push(1, 7, 70, 9);
        let table = RawFrameTable::concat(vec![a, RawFrameTable::new(), b]);

        assert_eq!(table.len(), 3);
        assert_eq!(table.frame, vec![3, 3, 1]);
        assert_eq!(table.distinct_frames(), vec![3, 1]);
        assert_eq!(table.intensity_sum(), 20);
        assert_eq!(table.rows().last(), Some((1, 7, 70, 9)));
    }

    #[test]
    fn test_empty_table_has_four_columns() {
        let table = RawFrameTable::new();
        assert!(table.is_empty());
        assert_eq!(table.num_columns(), 4);
        assert_eq!(table.columns(), &["frame", "scan", "mz_index", "intensity"]);
    }

    #[test]
    fn test_scan_selected_respects_step() {
        assert!(scan_selected(10, 10, 20, 3));
        assert!(scan_selected(13, 10, 20, 3));
        assert!(!scan_selected(14, 10, 20, 3));
        assert!(!scan_selected(21, 10, 20, 1));
        assert!(!scan_selected(9, 10, 20, 1));
        assert!(scan_selected(20, 10, 20, 0));
    }
}
