use std::fmt;

use log::debug;
use ordered_float::OrderedFloat;

use crate::data::handle::IndexConverter;
use crate::data::meta::DiaMsMsWindow;
use crate::error::Result;

/// Window group of the synthetic whole-spectrum window.
pub const MS1_WINDOW_GROUP: u32 = 0;

/// A boundary on the m/z axis; `Unbounded` sorts above every finite value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MzBound {
    Finite(OrderedFloat<f64>),
    Unbounded,
}

impl MzBound {
    pub fn finite(value: f64) -> Self {
        MzBound::Finite(OrderedFloat(value))
    }

    /// Numeric value, `f64::INFINITY` when unbounded.
    pub fn value(&self) -> f64 {
        match self {
            MzBound::Finite(v) => v.0,
            MzBound::Unbounded => f64::INFINITY,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, MzBound::Unbounded)
    }
}

impl From<f64> for MzBound {
    fn from(value: f64) -> Self {
        if value == f64::INFINITY {
            MzBound::Unbounded
        } else {
            MzBound::finite(value)
        }
    }
}

impl fmt::Display for MzBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MzBound::Finite(v) => write!(f, "{}", v.0),
            MzBound::Unbounded => write!(f, "inf"),
        }
    }
}

/// Grid positions of a window and of the window preceding it in the acquisition cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowBounds {
    pub left: usize,
    pub right: usize,
    pub prev_left: usize,
    pub prev_right: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub window_index: usize,
    pub group_id: u32,
    pub scan_min: u32,
    pub scan_max: u32,
    pub mz_left: MzBound,
    pub mz_right: MzBound,
    pub left: usize,
    pub right: usize,
    pub prev_left: usize,
    pub prev_right: usize,
    pub im_min: f64,
    pub im_max: f64,
}

impl Window {
    pub fn is_ms1(&self) -> bool {
        self.window_index == 0
    }

    pub fn contains_scan(&self, scan: u32) -> bool {
        scan >= self.scan_min && scan <= self.scan_max
    }

    pub fn bounds(&self) -> WindowBounds {
        WindowBounds {
            left: self.left,
            right: self.right,
            prev_left: self.prev_left,
            prev_right: self.prev_right,
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Window(idx: {}, group: {}, mz: [{}, {}], scans: [{}, {}], im: [{:.4}, {:.4}], grid: [{}, {}), prev: [{}, {}))",
            self.window_index,
            self.group_id,
            self.mz_left,
            self.mz_right,
            self.scan_min,
            self.scan_max,
            self.im_min,
            self.im_max,
            self.left,
            self.right,
            self.prev_left,
            self.prev_right,
        )
    }
}

/// The index of the window whose grid positions count as "previous" for window `i` of `n`.
///
/// Windows 0 and 1 both refer to the last window, every later window to its predecessor.
pub fn prev_index(i: usize, n: usize) -> usize {
    if i < 2 {
        n - 1
    } else {
        i - 1
    }
}

/// Immutable window sequence (MS1 first) and the merged m/z grid of their boundaries.
#[derive(Debug, Clone)]
pub struct WindowTable {
    windows: Vec<Window>,
    grid: Vec<MzBound>,
}

impl WindowTable {
    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    pub fn grid(&self) -> &[MzBound] {
        &self.grid
    }

    pub fn window(&self, window_index: usize) -> Option<&Window> {
        self.windows.get(window_index)
    }

    pub fn ms1(&self) -> &Window {
        &self.windows[0]
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    // never empty, the MS1 window is always present
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn windows_in_group(&self, group_id: u32) -> impl Iterator<Item = &Window> + '_ {
        self.windows.iter().filter(move |w| w.group_id == group_id)
    }
}

pub struct WindowTableBuilder<'a, C: IndexConverter + ?Sized> {
    converter: &'a C,
    reference_frame: u32,
}

impl<'a, C: IndexConverter + ?Sized> WindowTableBuilder<'a, C> {
    pub fn new(converter: &'a C) -> Self {
        WindowTableBuilder {
            converter,
            reference_frame: 1,
        }
    }

    /// Frame whose calibration converts scan bounds to ion mobility.
    pub fn with_reference_frame(mut self, reference_frame: u32) -> Self {
        self.reference_frame = reference_frame;
        self
    }

    pub fn build(
        &self,
        window_group_defs: &[DiaMsMsWindow],
        global_scan_min: u32,
        global_scan_max: u32,
    ) -> Result<WindowTable> {
        // (group, scan_min, scan_max, mz_left, mz_right), MS1 first
        let mut raw: Vec<(u32, u32, u32, MzBound, MzBound)> = Vec::with_capacity(window_group_defs.len() + 1);
        raw.push((
            MS1_WINDOW_GROUP,
            global_scan_min,
            global_scan_max,
            MzBound::finite(0.0),
            MzBound::Unbounded,
        ));
        raw.extend(window_group_defs.iter().map(|def| {
            (
                def.window_group,
                def.scan_num_begin,
                def.scan_num_end,
                MzBound::from(def.mz_left()),
                MzBound::from(def.mz_right()),
            )
        }));

        let mut grid: Vec<MzBound> = raw.iter().flat_map(|r| [r.3, r.4]).collect();
        grid.sort_unstable();
        grid.dedup();

        let lower_bound = |value: &MzBound| grid.partition_point(|g| g < value);
        let positions: Vec<(usize, usize)> = raw
            .iter()
            .map(|r| (lower_bound(&r.3), lower_bound(&r.4) + 1))
            .collect();

        let scans: Vec<u32> = raw.iter().flat_map(|r| [r.1, r.2]).collect();
        let mobilities = self
            .converter
            .scan_to_inverse_mobility(self.reference_frame, &scans)?;

        let n = raw.len();
        let windows: Vec<Window> = raw
            .iter()
            .enumerate()
            .map(|(i, &(group_id, scan_min, scan_max, mz_left, mz_right))| {
                let (left, right) = positions[i];
                let (prev_left, prev_right) = positions[prev_index(i, n)];
                Window {
                    window_index: i,
                    group_id,
                    scan_min,
                    scan_max,
                    mz_left,
                    mz_right,
                    left,
                    right,
                    prev_left,
                    prev_right,
                    im_min: mobilities[2 * i],
                    im_max: mobilities[2 * i + 1],
                }
            })
            .collect();

        debug!(
            "built window table with {} windows on a grid of {} m/z boundaries",
            windows.len(),
            grid.len()
        );

        Ok(WindowTable { windows, grid })
    }
}
