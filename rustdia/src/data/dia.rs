use log::{info, warn};

use crate::config::DiaIndexConfig;
use crate::data::acquisition::AcquisitionMode;
use crate::data::handle::{IndexConverter, SimpleIndexConverter, TdfRawExtractor, TimsRawDataLayout};
use crate::data::meta::{read_global_meta_sql, FrameMeta, MetaTableCache, MetaTableSource, TdfMetaSource};
use crate::data::raw::{RawExtractor, RawFrameTable};
use crate::error::{Result, TimsIndexError};
use crate::index::frame_group::FrameWindowGroupTable;
use crate::index::query::{CancellationToken, FramePredicate, Selector, WindowedArrayQuery};
use crate::index::scan_interval::{ScanIntervalIndex, ScanIntervals};
use crate::index::window::{Window, WindowTable, WindowTableBuilder};

/// Scan and frame extent of a dataset. Scans are 0-based and inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetBounds {
    pub min_scan: u32,
    pub max_scan: u32,
    pub min_frame: u32,
    pub max_frame: u32,
    pub num_scans_per_frame: u32,
}

impl DatasetBounds {
    /// Fails if there are no frames or if the number of scans differs between frames.
    pub fn from_frames(frames: &[FrameMeta]) -> Result<Self> {
        let first = frames
            .first()
            .ok_or_else(|| TimsIndexError::MissingMetadata("Frames table is empty".to_string()))?;
        let expected = first.num_scans;

        if let Some(frame) = frames.iter().find(|f| f.num_scans != expected) {
            return Err(TimsIndexError::InconsistentScanCount {
                frame_id: frame.id,
                expected,
                found: frame.num_scans,
            });
        }

        let min_frame = frames.iter().map(|f| f.id).min().unwrap_or(first.id);
        let max_frame = frames.iter().map(|f| f.id).max().unwrap_or(first.id);

        Ok(DatasetBounds {
            min_scan: 0,
            max_scan: expected.saturating_sub(1),
            min_frame,
            max_frame,
            num_scans_per_frame: expected,
        })
    }
}

/// A DIA dataset: metadata tables, the window index built from them and a raw extractor.
pub struct TimsDatasetDIA<E: RawExtractor = TdfRawExtractor, S: MetaTableSource = TdfMetaSource> {
    pub data_path: String,
    pub config: DiaIndexConfig,
    pub acquisition_mode: AcquisitionMode,
    pub bounds: DatasetBounds,
    pub meta: MetaTableCache<S>,
    pub windows: WindowTable,
    pub scan_intervals: ScanIntervals,
    pub frame_groups: FrameWindowGroupTable,
    pub extractor: E,
}

impl TimsDatasetDIA {
    /// Opens a Bruker `.d` folder.
    pub fn open(data_path: &str, config: DiaIndexConfig) -> Result<Self> {
        let global_meta_data = read_global_meta_sql(data_path)?;
        let meta = MetaTableCache::new(TdfMetaSource::new(data_path));

        let frames = meta.frames()?;
        let bounds = DatasetBounds::from_frames(frames)?;
        let converter = SimpleIndexConverter::from_boundaries(
            global_meta_data.one_over_k0_range_lower,
            global_meta_data.one_over_k0_range_upper,
            bounds.num_scans_per_frame,
        );

        let layout = TimsRawDataLayout::new(data_path, &global_meta_data, frames);
        let extractor = TdfRawExtractor::new(layout, config.in_memory)?;

        TimsDatasetDIA::from_parts(data_path, config, meta, extractor, &converter)
    }
}

impl<E: RawExtractor, S: MetaTableSource> TimsDatasetDIA<E, S> {
    pub fn from_parts<C: IndexConverter + ?Sized>(
        data_path: &str,
        config: DiaIndexConfig,
        meta: MetaTableCache<S>,
        extractor: E,
        converter: &C,
    ) -> Result<Self> {
        let frames = meta.frames()?;
        let bounds = DatasetBounds::from_frames(frames)?;

        let acquisition_mode = AcquisitionMode::from_scan_mode(frames[0].scan_mode);
        if acquisition_mode != AcquisitionMode::DIA {
            warn!("{} looks like a {} acquisition, not DIA", data_path, acquisition_mode);
        }

        let windows = WindowTableBuilder::new(converter)
            .with_reference_frame(config.reference_frame)
            .build(meta.dia_ms_ms_windows()?, bounds.min_scan, bounds.max_scan)?;
        let scan_intervals = ScanIntervals::build(&windows);
        let frame_groups = FrameWindowGroupTable::build(frames, meta.dia_ms_ms_info()?);

        info!(
            "opened {}: frames {}..={}, {} scans per frame, {} windows",
            data_path,
            bounds.min_frame,
            bounds.max_frame,
            bounds.num_scans_per_frame,
            windows.len()
        );

        Ok(TimsDatasetDIA {
            data_path: data_path.to_string(),
            config,
            acquisition_mode,
            bounds,
            meta,
            windows,
            scan_intervals,
            frame_groups,
            extractor,
        })
    }

    pub fn frames(&self) -> Result<&[FrameMeta]> {
        self.meta.frames()
    }

    pub fn get_frame_count(&self) -> usize {
        self.frame_groups.len()
    }

    /// All window groups with at least one frame, 0 being MS1.
    pub fn window_groups(&self) -> Vec<u32> {
        self.frame_groups.groups()
    }

    pub fn scan_interval_index(&self) -> ScanIntervalIndex<'_> {
        ScanIntervalIndex::with_intervals(&self.windows, &self.scan_intervals)
    }

    pub fn window_for_scan(&self, window_group: u32, scan: u32) -> Option<&Window> {
        self.scan_intervals.lookup_window(&self.windows, window_group, scan)
    }

    pub fn windowed_query(&self) -> Result<WindowedArrayQuery<'_, E>> {
        Ok(WindowedArrayQuery::new(
            &self.windows,
            &self.frame_groups,
            self.frames()?,
            self.bounds,
            &self.extractor,
        )
        .with_config(&self.config))
    }

    pub fn query(
        &self,
        window_groups: &Selector<u32>,
        frames: &Selector<u32>,
        windows: &Selector<usize>,
        predicate: Option<&FramePredicate>,
    ) -> Result<RawFrameTable> {
        self.windowed_query()?.query(window_groups, frames, windows, predicate)
    }

    pub fn query_with_cancellation(
        &self,
        window_groups: &Selector<u32>,
        frames: &Selector<u32>,
        windows: &Selector<usize>,
        predicate: Option<&FramePredicate>,
        cancel: &CancellationToken,
    ) -> Result<RawFrameTable> {
        self.windowed_query()?
            .query_with_cancellation(window_groups, frames, windows, predicate, Some(cancel))
    }
}
