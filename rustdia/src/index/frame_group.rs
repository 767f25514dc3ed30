use rustc_hash::FxHashMap;

use crate::data::meta::{DiaMsMsInfo, FrameMeta};
use crate::index::window::MS1_WINDOW_GROUP;

/// One `(frame_id, window_group)` row per frame, MS1 frames carry group 0.
pub struct FrameWindowGroupTable {
    rows: Vec<(u32, u32)>,
    group_by_frame: FxHashMap<u32, u32>,
    frames_by_group: FxHashMap<u32, Vec<u32>>,
}

impl FrameWindowGroupTable {
    /// Left join of `frames` with the DIA frame assignments. The first assignment of a
    /// frame wins, assignments for unknown frames are ignored.
    pub fn build(frames: &[FrameMeta], assignments: &[DiaMsMsInfo]) -> Self {
        let mut assigned: FxHashMap<u32, u32> = FxHashMap::default();
        for info in assignments {
            assigned.entry(info.frame_id).or_insert(info.window_group);
        }

        let mut rows = Vec::with_capacity(frames.len());
        let mut group_by_frame = FxHashMap::default();
        let mut frames_by_group: FxHashMap<u32, Vec<u32>> = FxHashMap::default();

        for frame in frames {
            let group = assigned.get(&frame.id).copied().unwrap_or(MS1_WINDOW_GROUP);
            rows.push((frame.id, group));
            group_by_frame.insert(frame.id, group);
            frames_by_group.entry(group).or_default().push(frame.id);
        }

        FrameWindowGroupTable {
            rows,
            group_by_frame,
            frames_by_group,
        }
    }

    /// Rows in frame order.
    pub fn rows(&self) -> &[(u32, u32)] {
        &self.rows
    }

    pub fn group_of(&self, frame_id: u32) -> u32 {
        self.group_by_frame
            .get(&frame_id)
            .copied()
            .unwrap_or(MS1_WINDOW_GROUP)
    }

    pub fn frames_in_group(&self, group_id: u32) -> &[u32] {
        self.frames_by_group
            .get(&group_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains(&self, frame_id: u32, group_id: u32) -> bool {
        self.group_by_frame.get(&frame_id) == Some(&group_id)
    }

    /// Distinct window groups, sorted.
    pub fn groups(&self) -> Vec<u32> {
        let mut groups: Vec<u32> = self.frames_by_group.keys().copied().collect();
        groups.sort_unstable();
        groups
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
