extern crate rusqlite;

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

use log::debug;
use rusqlite::Connection;

use crate::error::{Result, TimsIndexError};

#[derive(Debug, Clone, PartialEq)]
pub struct DiaMsMsInfo {
    pub frame_id: u32,
    pub window_group: u32,
}

/// One row of `DiaFrameMsMsWindows`: the isolation settings of a window group.
#[derive(Debug, Clone, PartialEq)]
pub struct DiaMsMsWindow {
    pub window_group: u32,
    pub scan_num_begin: u32,
    pub scan_num_end: u32,
    pub isolation_mz: f64,
    pub isolation_width: f64,
    pub collision_energy: f64,
}

impl DiaMsMsWindow {
    pub fn mz_left(&self) -> f64 {
        self.isolation_mz - self.isolation_width / 2.0
    }

    pub fn mz_right(&self) -> f64 {
        self.isolation_mz + self.isolation_width / 2.0
    }
}

#[derive(Debug, Clone)]
pub struct GlobalMetaData {
    pub schema_type: String,
    pub schema_version_major: i64,
    pub schema_version_minor: i64,
    pub acquisition_software_vendor: String,
    pub instrument_vendor: String,
    pub closed_property: i64,
    pub tims_compression_type: i64,
    pub max_num_peaks_per_scan: i64,
    pub mz_acquisition_range_lower: f64,
    pub mz_acquisition_range_upper: f64,
    pub one_over_k0_range_lower: f64,
    pub one_over_k0_range_upper: f64,
    pub tof_max_index: u32,
}

impl Default for GlobalMetaData {
    fn default() -> Self {
        GlobalMetaData {
            schema_type: String::new(),
            schema_version_major: -1,
            schema_version_minor: -1,
            acquisition_software_vendor: String::new(),
            instrument_vendor: String::new(),
            closed_property: -1,
            tims_compression_type: -1,
            max_num_peaks_per_scan: -1,
            mz_acquisition_range_lower: -1.0,
            mz_acquisition_range_upper: -1.0,
            one_over_k0_range_lower: -1.0,
            one_over_k0_range_upper: -1.0,
            tof_max_index: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameMeta {
    pub id: u32,
    pub time: f64,
    pub polarity: String,
    pub scan_mode: i64,
    pub ms_ms_type: i64,
    pub tims_id: i64,
    pub max_intensity: f64,
    pub sum_intensity: f64,
    pub num_scans: u32,
    pub num_peaks: i64,
    pub mz_calibration: i64,
    pub t_1: f64,
    pub t_2: f64,
    pub tims_calibration: i64,
    pub property_group: i64,
    pub accumulation_time: f64,
    pub ramp_time: f64,
}

pub fn tdf_database_path(bruker_d_folder_name: &str) -> PathBuf {
    Path::new(bruker_d_folder_name).join("analysis.tdf")
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| TimsIndexError::MalformedMetadata {
            key: key.to_string(),
            value: value.to_string(),
        })
}

// Read the global meta data from an open analysis.tdf connection
pub fn read_global_meta(conn: &Connection) -> Result<GlobalMetaData> {
    let rows: Vec<(String, String)> = conn
        .prepare("SELECT Key, Value FROM GlobalMetadata")?
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<_>>()?;

    let mut global_meta = GlobalMetaData::default();

    // go over the keys and parse values for the global meta data
    for (key, value) in rows {
        match key.as_str() {
            "SchemaType" => global_meta.schema_type = value,
            "SchemaVersionMajor" => global_meta.schema_version_major = parse_value(&key, &value)?,
            "SchemaVersionMinor" => global_meta.schema_version_minor = parse_value(&key, &value)?,
            "AcquisitionSoftwareVendor" => global_meta.acquisition_software_vendor = value,
            "InstrumentVendor" => global_meta.instrument_vendor = value,
            "ClosedProperly" => global_meta.closed_property = parse_value(&key, &value)?,
            "TimsCompressionType" => global_meta.tims_compression_type = parse_value(&key, &value)?,
            "MaxNumPeaksPerScan" => global_meta.max_num_peaks_per_scan = parse_value(&key, &value)?,
            "MzAcqRangeLower" => global_meta.mz_acquisition_range_lower = parse_value(&key, &value)?,
            "MzAcqRangeUpper" => global_meta.mz_acquisition_range_upper = parse_value(&key, &value)?,
            "OneOverK0AcqRangeLower" => global_meta.one_over_k0_range_lower = parse_value(&key, &value)?,
            "OneOverK0AcqRangeUpper" => global_meta.one_over_k0_range_upper = parse_value(&key, &value)?,
            "DigitizerNumSamples" => {
                global_meta.tof_max_index = parse_value::<u32>(&key, &value)? + 1
            }
            _ => (),
        }
    }

    Ok(global_meta)
}

// Read the frame meta data from an open analysis.tdf connection
pub fn read_frame_meta(conn: &Connection) -> Result<Vec<FrameMeta>> {
    let rows: Vec<&str> = vec!["Id", "Time", "Polarity", "ScanMode", "MsMsType", "TimsId", "MaxIntensity", "SummedIntensities",
    "NumScans", "NumPeaks", "MzCalibration", "T1", "T2", "TimsCalibration", "PropertyGroup", "AccumulationTime", "RampTime"];
    let query = format!("SELECT {} FROM Frames ORDER BY Id", rows.join(", "));

    let frames = conn.prepare(&query)?.query_map([], |row| {
        Ok(FrameMeta {
            id: row.get(0)?,
            time: row.get(1)?,
            polarity: row.get(2)?,
            scan_mode: row.get(3)?,
            ms_ms_type: row.get(4)?,
            tims_id: row.get(5)?,
            max_intensity: row.get(6)?,
            sum_intensity: row.get(7)?,
            num_scans: row.get(8)?,
            num_peaks: row.get(9)?,
            mz_calibration: row.get(10)?,
            t_1: row.get(11)?,
            t_2: row.get(12)?,
            tims_calibration: row.get(13)?,
            property_group: row.get(14)?,
            accumulation_time: row.get(15)?,
            ramp_time: row.get(16)?,
        })
    })?.collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(frames)
}

pub fn read_dia_ms_ms_info(conn: &Connection) -> Result<Vec<DiaMsMsInfo>> {
    let query = "SELECT Frame, WindowGroup FROM DiaFrameMsMsInfo";

    let rows = conn.prepare(query)?.query_map([], |row| {
        Ok(DiaMsMsInfo {
            frame_id: row.get(0)?,
            window_group: row.get(1)?,
        })
    })?.collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

pub fn read_dia_ms_ms_windows(conn: &Connection) -> Result<Vec<DiaMsMsWindow>> {
    let rows: Vec<&str> = vec!["WindowGroup", "ScanNumBegin", "ScanNumEnd", "IsolationMz", "IsolationWidth", "CollisionEnergy"];
    let query = format!("SELECT {} FROM DiaFrameMsMsWindows", rows.join(", "));

    let windows = conn.prepare(&query)?.query_map([], |row| {
        Ok(DiaMsMsWindow {
            window_group: row.get(0)?,
            scan_num_begin: row.get(1)?,
            scan_num_end: row.get(2)?,
            isolation_mz: row.get(3)?,
            isolation_width: row.get(4)?,
            collision_energy: row.get(5)?,
        })
    })?.collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(windows)
}

pub fn read_global_meta_sql(bruker_d_folder_name: &str) -> Result<GlobalMetaData> {
    let conn = Connection::open(tdf_database_path(bruker_d_folder_name))?;
    read_global_meta(&conn)
}

/// The metadata tables the DIA index is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaTable {
    Frames,
    DiaFrameMsMsInfo,
    DiaFrameMsMsWindows,
}

impl MetaTable {
    pub fn name(&self) -> &'static str {
        match self {
            MetaTable::Frames => "Frames",
            MetaTable::DiaFrameMsMsInfo => "DiaFrameMsMsInfo",
            MetaTable::DiaFrameMsMsWindows => "DiaFrameMsMsWindows",
        }
    }

    fn slot(&self) -> usize {
        match self {
            MetaTable::Frames => 0,
            MetaTable::DiaFrameMsMsInfo => 1,
            MetaTable::DiaFrameMsMsWindows => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub enum MetaTableData {
    Frames(Vec<FrameMeta>),
    DiaFrameMsMsInfo(Vec<DiaMsMsInfo>),
    DiaFrameMsMsWindows(Vec<DiaMsMsWindow>),
}

impl MetaTableData {
    pub fn len(&self) -> usize {
        match self {
            MetaTableData::Frames(rows) => rows.len(),
            MetaTableData::DiaFrameMsMsInfo(rows) => rows.len(),
            MetaTableData::DiaFrameMsMsWindows(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Anything that can produce one of the metadata tables on demand.
pub trait MetaTableSource: Send + Sync {
    fn load_table(&self, table: MetaTable) -> Result<MetaTableData>;
}

/// Reads metadata tables from the `analysis.tdf` SQLite file of a `.d` folder.
pub struct TdfMetaSource {
    db_path: PathBuf,
}

impl TdfMetaSource {
    pub fn new(bruker_d_folder_name: &str) -> Self {
        TdfMetaSource {
            db_path: tdf_database_path(bruker_d_folder_name),
        }
    }
}

impl MetaTableSource for TdfMetaSource {
    fn load_table(&self, table: MetaTable) -> Result<MetaTableData> {
        let conn = Connection::open(&self.db_path)?;
        match table {
            MetaTable::Frames => Ok(MetaTableData::Frames(read_frame_meta(&conn)?)),
            MetaTable::DiaFrameMsMsInfo => {
                Ok(MetaTableData::DiaFrameMsMsInfo(read_dia_ms_ms_info(&conn)?))
            }
            MetaTable::DiaFrameMsMsWindows => {
                Ok(MetaTableData::DiaFrameMsMsWindows(read_dia_ms_ms_windows(&conn)?))
            }
        }
    }
}

/// Tables that are already in memory, e.g. read elsewhere or synthesized.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetaSource {
    pub frames: Vec<FrameMeta>,
    pub dia_ms_ms_info: Vec<DiaMsMsInfo>,
    pub dia_ms_ms_windows: Vec<DiaMsMsWindow>,
}

impl MetaTableSource for InMemoryMetaSource {
    fn load_table(&self, table: MetaTable) -> Result<MetaTableData> {
        Ok(match table {
            MetaTable::Frames => MetaTableData::Frames(self.frames.clone()),
            MetaTable::DiaFrameMsMsInfo => MetaTableData::DiaFrameMsMsInfo(self.dia_ms_ms_info.clone()),
            MetaTable::DiaFrameMsMsWindows => {
                MetaTableData::DiaFrameMsMsWindows(self.dia_ms_ms_windows.clone())
            }
        })
    }
}

/// Loads every metadata table at most once; lives as long as the dataset handle owning it.
pub struct MetaTableCache<S: MetaTableSource = TdfMetaSource> {
    source: S,
    slots: [OnceLock<MetaTableData>; 3],
}

impl<S: MetaTableSource> MetaTableCache<S> {
    pub fn new(source: S) -> Self {
        MetaTableCache {
            source,
            slots: [OnceLock::new(), OnceLock::new(), OnceLock::new()],
        }
    }

    pub fn get_or_load(&self, table: MetaTable) -> Result<&MetaTableData> {
        let slot = &self.slots[table.slot()];
        if let Some(data) = slot.get() {
            return Ok(data);
        }
        let mut data = self.source.load_table(table)?;
        // frame lookups and the raw data layout rely on id order
        if let MetaTableData::Frames(rows) = &mut data {
            rows.sort_by_key(|f| f.id);
        }
        debug!("loaded metadata table {} with {} rows", table.name(), data.len());
        Ok(slot.get_or_init(|| data))
    }

    pub fn is_loaded(&self, table: MetaTable) -> bool {
        self.slots[table.slot()].get().is_some()
    }

    pub fn frames(&self) -> Result<&[FrameMeta]> {
        match self.get_or_load(MetaTable::Frames)? {
            MetaTableData::Frames(rows) => Ok(rows),
            _ => Err(mismatched_table(MetaTable::Frames)),
        }
    }

    pub fn dia_ms_ms_info(&self) -> Result<&[DiaMsMsInfo]> {
        match self.get_or_load(MetaTable::DiaFrameMsMsInfo)? {
            MetaTableData::DiaFrameMsMsInfo(rows) => Ok(rows),
            _ => Err(mismatched_table(MetaTable::DiaFrameMsMsInfo)),
        }
    }

    pub fn dia_ms_ms_windows(&self) -> Result<&[DiaMsMsWindow]> {
        match self.get_or_load(MetaTable::DiaFrameMsMsWindows)? {
            MetaTableData::DiaFrameMsMsWindows(rows) => Ok(rows),
            _ => Err(mismatched_table(MetaTable::DiaFrameMsMsWindows)),
        }
    }
}

fn mismatched_table(table: MetaTable) -> TimsIndexError {
    TimsIndexError::MissingMetadata(format!("source returned wrong rows for table {}", table.name()))
}
