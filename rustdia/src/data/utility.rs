use std::io::Read;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Result, TimsIndexError};

/// Decompresses a ZSTD compressed byte array
///
/// # Arguments
///
/// * `compressed_data` - A byte slice that holds the compressed data
///
/// # Returns
///
/// * `decompressed_data` - A vector of u8 that holds the decompressed data
///
pub fn zstd_decompress(compressed_data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = zstd::Decoder::new(compressed_data)?;
    let mut decompressed_data = Vec::new();
    decoder.read_to_end(&mut decompressed_data)?;
    Ok(decompressed_data)
}

pub fn lzf_decompress(data: &[u8], max_output_size: usize) -> Result<Vec<u8>> {
    lzf::decompress(data, max_output_size)
        .map_err(|e| TimsIndexError::Decompression(format!("LZF decompression failed: {:?}", e)))
}

/// Expands per-scan peak counts into one scan id per peak.
pub fn flatten_scan_values(scan_counts: &[u32]) -> Vec<u32> {
    let total = scan_counts.iter().map(|&x| x as usize).sum();
    let mut scan = Vec::with_capacity(total);
    for (scan_id, &count) in scan_counts.iter().enumerate() {
        scan.extend(std::iter::repeat(scan_id as u32).take(count as usize));
    }
    scan
}

/// Parses the decompressed bruker binary data of compression type 2
///
/// The payload is a byte-transposed array of little-endian u32 words: first one peak
/// count per scan (times two, the first slot holding the scan count), then interleaved
/// tof deltas and intensities.
///
/// # Returns
///
/// * `scan_counts` - number of peaks per scan
/// * `tof_indices` - tof index of each peak
/// * `intensities` - intensity of each peak
///
pub fn parse_decompressed_bruker_binary_data(decompressed_bytes: &[u8]) -> Result<(Vec<u32>, Vec<u32>, Vec<u32>)> {
    let quarter = decompressed_bytes.len() / 4;
    if quarter == 0 {
        return Err(TimsIndexError::Decompression("empty frame payload".to_string()));
    }

    let mut buffer_u32 = Vec::with_capacity(quarter);
    for i in 0..quarter {
        let value = LittleEndian::read_u32(&[
            decompressed_bytes[i],
            decompressed_bytes[i + quarter],
            decompressed_bytes[i + 2 * quarter],
            decompressed_bytes[i + 3 * quarter],
        ]);
        buffer_u32.push(value);
    }

    let scan_count = buffer_u32[0] as usize;
    if scan_count == 0 || scan_count > buffer_u32.len() || (buffer_u32.len() - scan_count) % 2 != 0 {
        return Err(TimsIndexError::Decompression(format!(
            "invalid scan count {} for payload of {} words",
            scan_count,
            buffer_u32.len()
        )));
    }

    let tof_deltas: Vec<u32> = buffer_u32.iter().skip(scan_count).step_by(2).copied().collect();
    let intensities: Vec<u32> = buffer_u32.iter().skip(scan_count + 1).step_by(2).copied().collect();

    // slot i + 1 holds the doubled peak count of scan i, the last scan gets the remainder
    let mut scan_counts: Vec<u32> = buffer_u32[1..scan_count].iter().map(|&x| x / 2).collect();
    let exceeded = || TimsIndexError::Decompression("peak counts exceed number of peaks".to_string());
    let counted = scan_counts
        .iter()
        .try_fold(0u32, |acc, &count| acc.checked_add(count))
        .ok_or_else(exceeded)?;
    let last_scan = (intensities.len() as u32).checked_sub(counted).ok_or_else(exceeded)?;
    scan_counts.push(last_scan);

    // tof values are delta encoded per scan, starting from -1
    let mut tof_indices = Vec::with_capacity(tof_deltas.len());
    let mut index = 0;
    for &size in &scan_counts {
        let mut current_sum = 0u32;
        for _ in 0..size {
            current_sum = current_sum.wrapping_add(tof_deltas[index]);
            tof_indices.push(current_sum.wrapping_sub(1));
            index += 1;
        }
    }

    Ok((scan_counts, tof_indices, intensities))
}

/// Parses a complete frame blob of compression type 1 (one lzf block per scan).
///
/// Blob layout: `[size: i32][scan_count: i32][scan offsets: i32 * (scan_count + 1)][blocks]`,
/// offsets are relative to the start of the blob.
pub fn parse_bruker_binary_type1(
    frame_blob: &[u8],
    scan_count: usize,
    num_peaks: usize,
) -> Result<(Vec<u32>, Vec<u32>, Vec<u32>)> {
    let header_size = 8 + (scan_count + 1) * 4;
    if frame_blob.len() < header_size {
        return Err(TimsIndexError::Decompression(format!(
            "frame blob of {} bytes is shorter than its header",
            frame_blob.len()
        )));
    }

    let scan_offsets: Vec<usize> = frame_blob[8..header_size]
        .chunks_exact(4)
        .map(|chunk| LittleEndian::read_i32(chunk).max(0) as usize)
        .collect();

    let mut scan_counts = vec![0u32; scan_count];
    let mut tof_indices = Vec::with_capacity(num_peaks);
    let mut intensities = Vec::with_capacity(num_peaks);

    for scan_index in 0..scan_count {
        let start = scan_offsets[scan_index];
        let end = scan_offsets[scan_index + 1];
        if start == end {
            continue;
        }
        if start > end || end > frame_blob.len() {
            return Err(TimsIndexError::Decompression(format!(
                "scan {} points outside of the frame blob",
                scan_index
            )));
        }

        let decompressed_bytes = lzf_decompress(&frame_blob[start..end], num_peaks * 8)?;

        // non-negative values are intensities, negative values advance the tof index
        let mut tof_index = 0i64;
        let mut previous_was_intensity = true;
        for chunk in decompressed_bytes.chunks_exact(4) {
            let value = LittleEndian::read_i32(chunk);
            if value >= 0 {
                if previous_was_intensity {
                    tof_index += 1;
                }
                tof_indices.push(tof_index as u32);
                intensities.push(value as u32);
                scan_counts[scan_index] += 1;
                previous_was_intensity = true;
            } else {
                tof_index -= value as i64;
                previous_was_intensity = false;
            }
        }
    }

    Ok((scan_counts, tof_indices, intensities))
}
