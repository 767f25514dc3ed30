use std::borrow::Cow;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, trace};

use crate::data::meta::{FrameMeta, GlobalMetaData};
use crate::data::raw::{scan_selected, RawExtractor, RawFrameTable};
use crate::data::utility::{
    flatten_scan_values, parse_bruker_binary_type1, parse_decompressed_bruker_binary_data,
    zstd_decompress,
};
use crate::error::{Result, TimsIndexError};

/// Where in `analysis.tdf_bin` each frame lives, plus what is needed to decode it.
#[derive(Debug, Clone)]
pub struct TimsRawDataLayout {
    pub raw_data_path: String,
    pub tims_compression_type: i64,
    pub first_frame_id: u32,
    pub tims_offset_values: Vec<i64>,
    pub num_peaks: Vec<i64>,
    pub num_scans: Vec<u32>,
}

impl TimsRawDataLayout {
    /// `frame_meta_data` sorted by frame id with dense ids, as `MetaTableCache::frames` returns it.
    pub fn new(data_path: &str, global_meta_data: &GlobalMetaData, frame_meta_data: &[FrameMeta]) -> Self {
        TimsRawDataLayout {
            raw_data_path: data_path.to_string(),
            tims_compression_type: global_meta_data.tims_compression_type,
            first_frame_id: frame_meta_data.first().map(|f| f.id).unwrap_or(1),
            tims_offset_values: frame_meta_data.iter().map(|x| x.tims_id).collect(),
            num_peaks: frame_meta_data.iter().map(|x| x.num_peaks).collect(),
            num_scans: frame_meta_data.iter().map(|x| x.num_scans).collect(),
        }
    }

    pub fn frame_index(&self, frame_id: u32) -> Result<usize> {
        frame_id
            .checked_sub(self.first_frame_id)
            .map(|i| i as usize)
            .filter(|&i| i < self.tims_offset_values.len())
            .ok_or(TimsIndexError::FrameOutOfRange { frame_id })
    }
}

pub enum TimsFrameStorage {
    /// Seek into `analysis.tdf_bin` for every frame.
    Lazy(PathBuf),
    /// Whole `analysis.tdf_bin` held in memory.
    InMemory(Vec<u8>),
}

/// Decodes frames straight from `analysis.tdf_bin` into raw (scan, tof, intensity) tables.
pub struct TdfRawExtractor {
    pub raw_data_layout: TimsRawDataLayout,
    storage: TimsFrameStorage,
}

impl TdfRawExtractor {
    pub fn new(raw_data_layout: TimsRawDataLayout, in_memory: bool) -> Result<Self> {
        let mut file_path = PathBuf::from(&raw_data_layout.raw_data_path);
        file_path.push("analysis.tdf_bin");

        let storage = if in_memory {
            let mut infile = File::open(&file_path)?;
            let mut data = Vec::new();
            infile.read_to_end(&mut data)?;
            debug!("loaded {} bytes of frame data into memory", data.len());
            TimsFrameStorage::InMemory(data)
        } else {
            TimsFrameStorage::Lazy(file_path)
        };

        Ok(TdfRawExtractor {
            raw_data_layout,
            storage,
        })
    }

    pub fn from_storage(raw_data_layout: TimsRawDataLayout, storage: TimsFrameStorage) -> Self {
        TdfRawExtractor {
            raw_data_layout,
            storage,
        }
    }

    /// Returns the complete blob of a frame, header included.
    fn read_frame_blob(&self, offset: u64) -> Result<Cow<'_, [u8]>> {
        match &self.storage {
            TimsFrameStorage::Lazy(file_path) => {
                let mut infile = File::open(file_path)?;
                infile.seek(SeekFrom::Start(offset))?;

                let mut bin_buffer = [0u8; 4];
                infile.read_exact(&mut bin_buffer)?;
                let bin_size = blob_size(LittleEndian::read_i32(&bin_buffer))?;

                let mut blob = vec![0u8; bin_size];
                blob[..4].copy_from_slice(&bin_buffer);
                infile.read_exact(&mut blob[4..])?;
                Ok(Cow::Owned(blob))
            }
            TimsFrameStorage::InMemory(data) => {
                let start = offset as usize;
                let header = data.get(start..start + 4).ok_or_else(truncated)?;
                let bin_size = blob_size(LittleEndian::read_i32(header))?;
                let blob = data.get(start..start + bin_size).ok_or_else(truncated)?;
                Ok(Cow::Borrowed(blob))
            }
        }
    }

    /// Decodes one frame into per-peak scan, tof and intensity vectors.
    pub fn decode_frame(&self, frame_id: u32) -> Result<(Vec<u32>, Vec<u32>, Vec<u32>)> {
        let layout = &self.raw_data_layout;
        let frame_index = layout.frame_index(frame_id)?;

        // turns out, there can be empty frames in the data
        let num_peaks = layout.num_peaks[frame_index];
        if num_peaks <= 0 {
            trace!("frame {} has no peaks", frame_id);
            return Ok((Vec::new(), Vec::new(), Vec::new()));
        }

        let offset = layout.tims_offset_values[frame_index] as u64;
        let blob = self.read_frame_blob(offset)?;

        let (scan_counts, tof, intensity) = match layout.tims_compression_type {
            2 => {
                let decompressed_bytes = zstd_decompress(&blob[8..])?;
                parse_decompressed_bruker_binary_data(&decompressed_bytes)?
            }
            1 => parse_bruker_binary_type1(
                &blob,
                layout.num_scans[frame_index] as usize,
                num_peaks as usize,
            )?,
            other => return Err(TimsIndexError::UnsupportedCompression(other)),
        };

        Ok((flatten_scan_values(&scan_counts), tof, intensity))
    }
}

fn blob_size(raw: i32) -> Result<usize> {
    if raw < 8 {
        return Err(TimsIndexError::Decompression(format!("invalid frame blob size {}", raw)));
    }
    Ok(raw as usize)
}

fn truncated() -> TimsIndexError {
    TimsIndexError::Decompression("frame blob exceeds frame data".to_string())
}

impl RawExtractor for TdfRawExtractor {
    fn extract_raw(&self, frame_id: u32, scan_begin: u32, scan_end: u32, scan_step: u32) -> Result<RawFrameTable> {
        let (scan, tof, intensity) = self.decode_frame(frame_id)?;

        let mut table = RawFrameTable::new();
        for ((&s, &t), &i) in scan.iter().zip(tof.iter()).zip(intensity.iter()) {
            if scan_selected(s, scan_begin, scan_end, scan_step) {
                table.push(frame_id, s, t, i);
            }
        }
        Ok(table)
    }
}

/// Calibration transform from scan number to inverse ion mobility (1/K0).
pub trait IndexConverter: Send + Sync {
    fn scan_to_inverse_mobility(&self, frame_id: u32, scan_values: &[u32]) -> Result<Vec<f64>>;
}

/// Linear scan to 1/K0 model spanned by the acquisition range of the instrument.
/// Scan 0 maps to the upper bound, `scan_max_index` to the lower bound.
#[derive(Debug, Clone)]
pub struct SimpleIndexConverter {
    pub scan_intercept: f64,
    pub scan_slope: f64,
    pub scan_max_index: u32,
}

impl SimpleIndexConverter {
    pub fn from_boundaries(im_min: f64, im_max: f64, scan_max_index: u32) -> Self {
        let scan_intercept: f64 = im_max;
        let scan_slope: f64 = (im_min - scan_intercept) / scan_max_index.max(1) as f64;
        Self {
            scan_intercept,
            scan_slope,
            scan_max_index,
        }
    }
}

impl IndexConverter for SimpleIndexConverter {
    fn scan_to_inverse_mobility(&self, frame_id: u32, scan_values: &[u32]) -> Result<Vec<f64>> {
        scan_values
            .iter()
            .map(|&scan| {
                if scan > self.scan_max_index {
                    Err(TimsIndexError::ScanOutOfRange { frame_id, scan })
                } else {
                    Ok(self.scan_intercept + self.scan_slope * scan as f64)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::meta::tests::frame_meta;
    use crate::data::utility::tests::encode_type2_payload;

    fn type2_blob(total_scans: u32, scans: &[u32], tofs: &[u32], intensities: &[u32]) -> Vec<u8> {
        let payload = encode_type2_payload(total_scans, scans, tofs, intensities);
        let compressed = zstd::encode_all(payload.as_slice(), 0).unwrap();
        let mut blob = Vec::new();
        blob.extend_from_slice(&(compressed.len() as i32 + 8).to_le_bytes());
        blob.extend_from_slice(&total_scans.to_le_bytes());
        blob.extend_from_slice(&compressed);
        blob
    }

    fn in_memory_extractor() -> TdfRawExtractor {
        let first = type2_blob(4, &[0, 1, 3], &[10, 11, 12], &[100, 200, 300]);
        let second = type2_blob(4, &[2], &[50], &[7]);

        let mut frames = vec![frame_meta(1, 0.1, 0, 4), frame_meta(2, 0.2, 9, 4), frame_meta(3, 0.3, 9, 4)];
        frames[0].num_peaks = 3;
        frames[1].tims_id = first.len() as i64;
        frames[1].num_peaks = 1;
        // frame 3 is empty

        let global = GlobalMetaData {
            tims_compression_type: 2,
            ..GlobalMetaData::default()
        };
        let layout = TimsRawDataLayout::new("unused.d", &global, &frames);

        let mut data = first;
        data.extend(second);
        TdfRawExtractor::from_storage(layout, TimsFrameStorage::InMemory(data))
    }

    #[test]
    fn test_extract_full_and_partial_scan_range() {
        let extractor = in_memory_extractor();

        let full = extractor.extract_raw(1, 0, 3, 1).unwrap();
        assert_eq!(full.frame, vec![1, 1, 1]);
        assert_eq!(full.scan, vec![0, 1, 3]);
        assert_eq!(full.mz_index, vec![10, 11, 12]);
        assert_eq!(full.intensity, vec![100, 200, 300]);

        let partial = extractor.extract_raw(1, 1, 2, 1).unwrap();
        assert_eq!(partial.scan, vec![1]);

        let stepped = extractor.extract_raw(1, 0, 3, 3).unwrap();
        assert_eq!(stepped.scan, vec![0, 3]);

        let second = extractor.extract_raw(2, 0, 3, 1).unwrap();
        assert_eq!(second.rows().collect::<Vec<_>>(), vec![(2, 2, 50, 7)]);
    }

    #[test]
    fn test_empty_and_unknown_frames() {
        let extractor = in_memory_extractor();
        assert!(extractor.extract_raw(3, 0, 3, 1).unwrap().is_empty());
        assert!(matches!(
            extractor.extract_raw(4, 0, 3, 1),
            Err(TimsIndexError::FrameOutOfRange { frame_id: 4 })
        ));
        assert!(matches!(
            extractor.extract_raw(0, 0, 3, 1),
            Err(TimsIndexError::FrameOutOfRange { frame_id: 0 })
        ));
    }

    #[test]
    fn test_unsupported_compression() {
        let mut extractor = in_memory_extractor();
        extractor.raw_data_layout.tims_compression_type = 3;
        assert!(matches!(
            extractor.extract_raw(1, 0, 3, 1),
            Err(TimsIndexError::UnsupportedCompression(3))
        ));
    }

    #[test]
    fn test_simple_converter_is_linear_and_bounded() {
        let converter = SimpleIndexConverter::from_boundaries(0.6, 1.6, 100);
        let values = converter.scan_to_inverse_mobility(1, &[0, 50, 100]).unwrap();
        assert!((values[0] - 1.6).abs() < 1e-12);
        assert!((values[1] - 1.1).abs() < 1e-12);
        assert!((values[2] - 0.6).abs() < 1e-12);

        assert!(matches!(
            converter.scan_to_inverse_mobility(1, &[101]),
            Err(TimsIndexError::ScanOutOfRange { frame_id: 1, scan: 101 })
        ));
    }
}
