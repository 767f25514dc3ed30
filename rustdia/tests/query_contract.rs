use rustdia::config::DiaIndexConfig;
use rustdia::data::dia::TimsDatasetDIA;
use rustdia::data::handle::SimpleIndexConverter;
use rustdia::data::meta::{DiaMsMsInfo, DiaMsMsWindow, FrameMeta, InMemoryMetaSource, MetaTableCache};
use rustdia::data::raw::{scan_selected, RawExtractor, RawFrameTable};
use rustdia::error::Result;
use rustdia::index::query::{FramePredicate, Selector};
use rustdia::index::scan_interval::ScanIntervalIndex;
use rustdia::index::window::MzBound;

const NUM_SCANS: u32 = 200;
const CYCLE: u32 = 5;

/// Deterministic synthetic frames: a peak on every seventh scan.
struct SyntheticExtractor;

impl RawExtractor for SyntheticExtractor {
    fn extract_raw(&self, frame_id: u32, scan_begin: u32, scan_end: u32, scan_step: u32) -> Result<RawFrameTable> {
        let mut table = RawFrameTable::new();
        for scan in (0..NUM_SCANS).filter(|s| s % 7 == 0) {
            if scan_selected(scan, scan_begin, scan_end, scan_step) {
                table.push(frame_id, scan, 10_000 + scan * 3, frame_id + scan);
            }
        }
        Ok(table)
    }
}

fn frame(id: u32) -> FrameMeta {
    FrameMeta {
        id,
        time: id as f64 * 0.5,
        polarity: "+".to_string(),
        scan_mode: 9,
        ms_ms_type: if id % CYCLE == 1 { 0 } else { 9 },
        tims_id: 0,
        max_intensity: 0.0,
        sum_intensity: 0.0,
        num_scans: NUM_SCANS,
        num_peaks: 0,
        mz_calibration: 1,
        t_1: 0.0,
        t_2: 0.0,
        tims_calibration: 1,
        property_group: 1,
        accumulation_time: 100.0,
        ramp_time: 100.0,
    }
}

fn window(group: u32, scan_min: u32, scan_max: u32, center: f64, width: f64) -> DiaMsMsWindow {
    DiaMsMsWindow {
        window_group: group,
        scan_num_begin: scan_min,
        scan_num_end: scan_max,
        isolation_mz: center,
        isolation_width: width,
        collision_energy: 30.0,
    }
}

/// 40 frames in cycles of one MS1 frame followed by window groups 1 to 4,
/// each group holding two adjacent windows on the scan axis.
fn dataset() -> TimsDatasetDIA<SyntheticExtractor, InMemoryMetaSource> {
    let frames: Vec<FrameMeta> = (1..=40).map(frame).collect();
    let dia_ms_ms_info: Vec<DiaMsMsInfo> = frames
        .iter()
        .filter(|f| f.ms_ms_type == 9)
        .map(|f| DiaMsMsInfo {
            frame_id: f.id,
            window_group: (f.id - 1) % CYCLE,
        })
        .collect();
    let mut dia_ms_ms_windows = Vec::new();
    for group in 1..=4u32 {
        let base = 400.0 + group as f64 * 100.0;
        dia_ms_ms_windows.push(window(group, 0, 99, base, 25.0));
        dia_ms_ms_windows.push(window(group, 100, 199, base + 25.0, 25.0));
    }

    let source = InMemoryMetaSource {
        frames,
        dia_ms_ms_info,
        dia_ms_ms_windows,
    };
    let converter = SimpleIndexConverter::from_boundaries(0.6, 1.6, NUM_SCANS);
    TimsDatasetDIA::from_parts(
        "synthetic.d",
        DiaIndexConfig::default(),
        MetaTableCache::new(source),
        SyntheticExtractor,
        &converter,
    )
    .unwrap()
}

#[test]
fn window_table_properties_hold() {
    let dataset = dataset();
    let table = &dataset.windows;
    let grid = table.grid();

    assert_eq!(table.len(), 9);
    assert!(grid.windows(2).all(|p| p[0] < p[1]));
    assert!(grid.len() <= 2 * table.len());
    for w in table.windows() {
        assert_eq!(grid[w.left], w.mz_left);
        assert_eq!(grid[w.right - 1], w.mz_right);
        assert!(w.im_min >= w.im_max);
    }

    let ms1 = table.ms1();
    assert_eq!(ms1.mz_left, MzBound::finite(0.0));
    assert_eq!(ms1.mz_right, MzBound::Unbounded);
    assert_eq!((ms1.scan_min, ms1.scan_max), (0, NUM_SCANS - 1));
}

#[test]
fn scan_lookup_agrees_with_windows() {
    let dataset = dataset();
    let index = ScanIntervalIndex::build(&dataset.windows);
    assert_eq!(index.len(), 8);

    for w in dataset.windows.windows().iter().skip(1) {
        for scan in [w.scan_min, (w.scan_min + w.scan_max) / 2, w.scan_max] {
            assert_eq!(index.lookup(w.group_id, scan), Some(w.bounds()));
        }
    }
    assert_eq!(index.lookup(5, 0), None);
}

#[test]
fn unrefined_query_equals_full_sweep() {
    let dataset = dataset();
    let result = dataset
        .query(&Selector::All, &Selector::All, &Selector::All, None)
        .unwrap();

    let sweep: usize = (1..=40)
        .map(|f| SyntheticExtractor.extract_raw(f, 0, NUM_SCANS - 1, 1).unwrap().len())
        .sum();
    assert_eq!(result.len(), sweep);
    assert_eq!(result.num_columns(), 4);
    assert_eq!(result.distinct_frames(), (1..=40).collect::<Vec<_>>());
}

#[test]
fn refined_query_selects_windows_of_groups() {
    let dataset = dataset();

    // window 3 is the first window of group 2 (scans 0..=99)
    let result = dataset
        .query(&Selector::set([2]), &Selector::All, &Selector::set([3]), None)
        .unwrap();
    assert_eq!(result.distinct_frames(), vec![3, 8, 13, 18, 23, 28, 33, 38]);
    assert!(result.scan.iter().all(|&s| s <= 99));

    // both windows of group 2 cover the whole scan range, one call per window
    let plan = dataset
        .windowed_query()
        .unwrap()
        .plan(&Selector::set([2]), &Selector::range(1..=10), &Selector::set([3, 4]), None);
    assert_eq!(plan.len(), 4);
    assert_eq!(plan.iter().map(|j| j.frame_id).collect::<Vec<_>>(), vec![3, 3, 8, 8]);
}

#[test]
fn retention_time_predicate_and_empty_selection() {
    let dataset = dataset();

    let rt = FramePredicate::retention_time(5.0, 9.9);
    let result = dataset
        .query(&Selector::set([1]), &Selector::All, &Selector::All, Some(&rt))
        .unwrap();
    // frames 12 and 17 have retention times 6.0 and 8.5
    assert_eq!(result.distinct_frames(), vec![12, 17]);

    let empty = dataset
        .query(&Selector::set([1]), &Selector::set([1, 6, 11]), &Selector::All, None)
        .unwrap();
    assert!(empty.is_empty());
    assert_eq!(empty.columns(), &["frame", "scan", "mz_index", "intensity"]);
}
