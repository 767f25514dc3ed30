use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionMode {
    PRECURSOR,
    DDA,
    DIA,
    Unknown,
}

impl AcquisitionMode {
    /// Acquisition mode of a dataset, derived from the `ScanMode` of its frames.
    pub fn from_scan_mode(scan_mode: i64) -> Self {
        match scan_mode {
            0 => AcquisitionMode::PRECURSOR,
            8 => AcquisitionMode::DDA,
            9 => AcquisitionMode::DIA,
            _ => AcquisitionMode::Unknown,
        }
    }

    pub fn to_str(&self) -> &str {
        match self {
            AcquisitionMode::PRECURSOR => "PRECURSOR",
            AcquisitionMode::DDA => "DDA",
            AcquisitionMode::DIA => "DIA",
            AcquisitionMode::Unknown => "UNKNOWN",
        }
    }
}

impl Display for AcquisitionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_str())
    }
}
