use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Runtime settings for opening a DIA dataset and running window queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiaIndexConfig {
    /// Size of the worker pool used for per-frame extraction, 1 runs sequentially.
    pub num_threads: usize,
    /// Scan stride forwarded to the raw extractor.
    pub scan_step: u32,
    /// Read the whole `analysis.tdf_bin` into memory instead of seeking per frame.
    pub in_memory: bool,
    /// Frame whose calibration is used to convert window scan bounds to 1/K0.
    pub reference_frame: u32,
}

impl Default for DiaIndexConfig {
    fn default() -> Self {
        DiaIndexConfig {
            num_threads: 4,
            scan_step: 1,
            in_memory: false,
            reference_frame: 1,
        }
    }
}

impl DiaIndexConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: DiaIndexConfig = serde_json::from_str(json)?;
        Ok(config.sanitized())
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    // zero threads or a zero stride would stall the extraction loop
    fn sanitized(mut self) -> Self {
        self.num_threads = self.num_threads.max(1);
        self.scan_step = self.scan_step.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = DiaIndexConfig::from_json_str(r#"{"num_threads": 8}"#).unwrap();
        assert_eq!(config.num_threads, 8);
        assert_eq!(config.scan_step, 1);
        assert_eq!(config.reference_frame, 1);
        assert!(!config.in_memory);
    }

    #[test]
    fn test_zero_values_are_clamped() {
        let config =
            DiaIndexConfig::from_json_str(r#"{"num_threads": 0, "scan_step": 0}"#).unwrap();
        assert_eq!(config.num_threads, 1);
        assert_eq!(config.scan_step, 1);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(DiaIndexConfig::from_json_str("{not json").is_err());
    }
}
