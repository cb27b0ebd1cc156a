//! Error types for volume conversion

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for conversion operations
#[derive(Error, Debug)]
pub enum VolConvError {
    #[error("Input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error(
        "Dimension/filesize mismatch: {file_size} bytes is not a whole multiple of {voxels} voxels"
    )]
    DimensionMismatch { file_size: u64, voxels: u64 },

    #[error("Unsupported data type: {0} bytes per voxel (expected 1, 2, 4 or 8)")]
    UnsupportedDataType(u64),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Descriptor error: {0}")]
    Descriptor(String),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Decompression error: {0}")]
    Decompression(String),

    #[error("Invalid container format: {0}")]
    InvalidFormat(String),

    #[error("Checksum mismatch in chunk starting at slice {start}: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        start: usize,
        expected: u32,
        actual: u32,
    },

    #[error("Preview error: {0}")]
    Preview(String),

    #[error("Worker task failed: {0}")]
    Worker(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Specialized Result type for conversion operations
pub type Result<T> = std::result::Result<T, VolConvError>;

impl From<serde_json::Error> for VolConvError {
    fn from(err: serde_json::Error) -> Self {
        VolConvError::Serialization(err.to_string())
    }
}

impl From<tiff::TiffError> for VolConvError {
    fn from(err: tiff::TiffError) -> Self {
        VolConvError::Preview(err.to_string())
    }
}

impl From<tokio::task::JoinError> for VolConvError {
    fn from(err: tokio::task::JoinError) -> Self {
        VolConvError::Worker(err.to_string())
    }
}
