use std::collections::BTreeSet;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, trace};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use rustc_hash::FxHashMap;

use crate::config::DiaIndexConfig;
use crate::data::dia::DatasetBounds;
use crate::data::meta::FrameMeta;
use crate::data::raw::{RawExtractor, RawFrameTable};
use crate::error::{Result, TimsIndexError};
use crate::index::frame_group::FrameWindowGroupTable;
use crate::index::window::WindowTable;

/// Selects window groups, frames or windows: everything, an explicit set, or an inclusive range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector<T> {
    All,
    Set(BTreeSet<T>),
    Range(RangeInclusive<T>),
}

impl<T: Ord> Selector<T> {
    pub fn all() -> Self {
        Selector::All
    }

    pub fn set<I: IntoIterator<Item = T>>(items: I) -> Self {
        Selector::Set(items.into_iter().collect())
    }

    pub fn range(range: RangeInclusive<T>) -> Self {
        Selector::Range(range)
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Selector::All)
    }

    pub fn contains(&self, value: &T) -> bool {
        match self {
            Selector::All => true,
            Selector::Set(items) => items.contains(value),
            Selector::Range(range) => range.contains(value),
        }
    }
}

impl<T> Default for Selector<T> {
    fn default() -> Self {
        Selector::All
    }
}

/// Parses `all`, `a-b` (inclusive range) or `a,b,c`.
impl<T: Ord + FromStr> FromStr for Selector<T> {
    type Err = TimsIndexError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let parse = |item: &str| {
            item.trim()
                .parse::<T>()
                .map_err(|_| TimsIndexError::InvalidSelector(s.to_string()))
        };

        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            return Ok(Selector::All);
        }

        if let Some((start, end)) = s.split_once('-') {
            let (start, end) = (parse(start)?, parse(end)?);
            if start > end {
                return Err(TimsIndexError::InvalidSelector(s.to_string()));
            }
            return Ok(Selector::Range(start..=end));
        }

        s.split(',').map(parse).collect::<Result<BTreeSet<T>>>().map(Selector::Set)
    }
}

/// Filter over frame attributes applied to candidate frames.
#[derive(Clone)]
pub enum FramePredicate {
    /// Inclusive retention time range in seconds.
    RetentionTime { min: f64, max: f64 },
    MsMsType(i64),
    Custom(Arc<dyn Fn(&FrameMeta) -> bool + Send + Sync>),
}

impl FramePredicate {
    pub fn retention_time(min: f64, max: f64) -> Self {
        FramePredicate::RetentionTime { min, max }
    }

    pub fn custom<F: Fn(&FrameMeta) -> bool + Send + Sync + 'static>(f: F) -> Self {
        FramePredicate::Custom(Arc::new(f))
    }

    pub fn matches(&self, frame: &FrameMeta) -> bool {
        match self {
            FramePredicate::RetentionTime { min, max } => frame.time >= *min && frame.time <= *max,
            FramePredicate::MsMsType(ms_ms_type) => frame.ms_ms_type == *ms_ms_type,
            FramePredicate::Custom(f) => f(frame),
        }
    }
}

impl fmt::Debug for FramePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramePredicate::RetentionTime { min, max } => write!(f, "RetentionTime({}..={})", min, max),
            FramePredicate::MsMsType(t) => write!(f, "MsMsType({})", t),
            FramePredicate::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Cooperative cancellation flag shared between a caller and a running query.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// One call of the raw extractor: a frame and the inclusive scan range to read from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionJob {
    pub frame_id: u32,
    pub scan_begin: u32,
    pub scan_end: u32,
}

/// Resolves window group, frame and window selections into raw extraction calls.
pub struct WindowedArrayQuery<'a, E: RawExtractor + ?Sized> {
    windows: &'a WindowTable,
    frame_groups: &'a FrameWindowGroupTable,
    frames: &'a [FrameMeta],
    frame_by_id: FxHashMap<u32, &'a FrameMeta>,
    bounds: DatasetBounds,
    extractor: &'a E,
    num_threads: usize,
    scan_step: u32,
}

impl<'a, E: RawExtractor + ?Sized> WindowedArrayQuery<'a, E> {
    /// Unrefined queries visit `frames` in slice order.
    pub fn new(
        windows: &'a WindowTable,
        frame_groups: &'a FrameWindowGroupTable,
        frames: &'a [FrameMeta],
        bounds: DatasetBounds,
        extractor: &'a E,
    ) -> Self {
        let defaults = DiaIndexConfig::default();
        let frame_by_id = frames.iter().map(|f| (f.id, f)).collect();
        WindowedArrayQuery {
            windows,
            frame_groups,
            frames,
            frame_by_id,
            bounds,
            extractor,
            num_threads: defaults.num_threads,
            scan_step: defaults.scan_step,
        }
    }

    pub fn with_config(mut self, config: &DiaIndexConfig) -> Self {
        self.num_threads = config.num_threads.max(1);
        self.scan_step = config.scan_step.max(1);
        self
    }

    fn frame_meta(&self, frame_id: u32) -> Option<&'a FrameMeta> {
        self.frame_by_id.get(&frame_id).copied()
    }

    fn passes(&self, frame_id: u32, predicate: Option<&FramePredicate>) -> bool {
        match predicate {
            None => true,
            Some(p) => self.frame_meta(frame_id).map_or(false, |f| p.matches(f)),
        }
    }

    fn global_job(&self, frame_id: u32) -> ExtractionJob {
        ExtractionJob {
            frame_id,
            scan_begin: self.bounds.min_scan,
            scan_end: self.bounds.max_scan,
        }
    }

    /// The extraction calls `query` would issue, in result order.
    pub fn plan(
        &self,
        window_groups: &Selector<u32>,
        frames: &Selector<u32>,
        windows: &Selector<usize>,
        predicate: Option<&FramePredicate>,
    ) -> Vec<ExtractionJob> {
        if window_groups.is_all() && windows.is_all() {
            let jobs: Vec<ExtractionJob> = self
                .frames
                .iter()
                .filter(|f| frames.contains(&f.id))
                .filter(|f| predicate.map_or(true, |p| p.matches(f)))
                .map(|f| self.global_job(f.id))
                .collect();
            debug!("unrefined query over {} frames", jobs.len());
            return jobs;
        }

        let candidates: Vec<(u32, u32)> = self
            .frame_groups
            .rows()
            .iter()
            .filter(|(frame_id, group_id)| frames.contains(frame_id) && window_groups.contains(group_id))
            .filter(|(frame_id, _)| self.passes(*frame_id, predicate))
            .copied()
            .collect();

        let jobs: Vec<ExtractionJob> = if windows.is_all() {
            candidates.iter().map(|&(frame_id, _)| self.global_job(frame_id)).collect()
        } else {
            let table: &'a WindowTable = self.windows;
            candidates
                .iter()
                .flat_map(move |&(frame_id, group_id)| {
                    table
                        .windows_in_group(group_id)
                        .filter(move |w| windows.contains(&w.window_index))
                        .map(move |w| ExtractionJob {
                            frame_id,
                            scan_begin: w.scan_min,
                            scan_end: w.scan_max,
                        })
                })
                .collect()
        };

        debug!(
            "refined query: {} candidate frames, {} extraction jobs",
            candidates.len(),
            jobs.len()
        );
        jobs
    }

    pub fn query(
        &self,
        window_groups: &Selector<u32>,
        frames: &Selector<u32>,
        windows: &Selector<usize>,
        predicate: Option<&FramePredicate>,
    ) -> Result<RawFrameTable> {
        self.query_with_cancellation(window_groups, frames, windows, predicate, None)
    }

    pub fn query_with_cancellation(
        &self,
        window_groups: &Selector<u32>,
        frames: &Selector<u32>,
        windows: &Selector<usize>,
        predicate: Option<&FramePredicate>,
        cancel: Option<&CancellationToken>,
    ) -> Result<RawFrameTable> {
        let jobs = self.plan(window_groups, frames, windows, predicate);
        self.execute(&jobs, cancel)
    }

    /// Runs the jobs, concurrently when configured, and concatenates results in job order.
    pub fn execute(&self, jobs: &[ExtractionJob], cancel: Option<&CancellationToken>) -> Result<RawFrameTable> {
        let run = |job: &ExtractionJob| -> Result<RawFrameTable> {
            if cancel.map_or(false, |t| t.is_cancelled()) {
                return Err(TimsIndexError::Cancelled);
            }
            trace!("extracting frame {} scans {}..={}", job.frame_id, job.scan_begin, job.scan_end);
            self.extractor
                .extract_raw(job.frame_id, job.scan_begin, job.scan_end, self.scan_step)
        };

        let tables: Vec<RawFrameTable> = if self.num_threads <= 1 || jobs.len() <= 1 {
            jobs.iter().map(&run).collect::<Result<Vec<_>>>()?
        } else {
            let pool = ThreadPoolBuilder::new().num_threads(self.num_threads).build()?;
            pool.install(|| jobs.par_iter().map(&run).collect::<Result<Vec<_>>>())?
        };

        Ok(RawFrameTable::concat(tables))
    }
}
