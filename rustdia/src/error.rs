use thiserror::Error;

/// Errors raised while reading TDF metadata, decoding frames or querying the DIA index.
#[derive(Debug, Error)]
pub enum TimsIndexError {
    #[error("sqlite error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("decompression failed: {0}")]
    Decompression(String),

    #[error("TimsCompressionType {0} is not supported, expected 1 or 2")]
    UnsupportedCompression(i64),

    #[error("frame {frame_id} is not part of this dataset")]
    FrameOutOfRange { frame_id: u32 },

    #[error("scan {scan} is out of range for frame {frame_id}")]
    ScanOutOfRange { frame_id: u32, scan: u32 },

    #[error("frame {frame_id} has {found} scans, expected {expected} like all other frames")]
    InconsistentScanCount {
        frame_id: u32,
        expected: u32,
        found: u32,
    },

    #[error("missing metadata: {0}")]
    MissingMetadata(String),

    #[error("malformed metadata value for {key}: {value}")]
    MalformedMetadata { key: String, value: String },

    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("query was cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, TimsIndexError>;
