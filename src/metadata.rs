//! Container metadata structures

use crate::compression::{CompressionLevel, CompressionMethod};
use crate::types::{SampleType, VolumeDescriptor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name of the single dataset held by a container
pub const DATASET_NAME: &str = "voldata";

/// Container file format version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatVersion {
    pub major: u16,
    pub minor: u16,
}

impl FormatVersion {
    pub const CURRENT: Self = Self { major: 1, minor: 0 };

    pub fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    pub fn is_compatible(&self, other: &Self) -> bool {
        self.major == other.major
    }
}

impl Default for FormatVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

/// Shape and type of the stored dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    pub name: String,
    pub dims: VolumeDescriptor,
    pub sample_type: SampleType,
}

impl DatasetDescriptor {
    pub fn new(dims: VolumeDescriptor, sample_type: SampleType) -> Self {
        Self {
            name: DATASET_NAME.to_string(),
            dims,
            sample_type,
        }
    }

    /// Uncompressed size of one depth slice
    pub fn slice_bytes(&self) -> usize {
        self.dims.slice_voxels() * self.sample_type.size_in_bytes()
    }

    /// Uncompressed size of the full dataset
    pub fn total_bytes(&self) -> u64 {
        self.dims
            .voxel_count()
            .unwrap_or(u64::MAX)
            .saturating_mul(self.sample_type.size_in_bytes() as u64)
    }
}

/// Location of one compressed bunch inside the container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// First depth slice held by the chunk
    pub start: usize,

    /// Number of depth slices
    pub slices: usize,

    /// Byte offset of the payload in the file
    pub offset: u64,

    pub compressed_size: usize,

    pub uncompressed_size: usize,

    /// CRC32 of the compressed payload
    pub checksum: u32,
}

impl ChunkRecord {
    /// One past the last slice held
    pub fn end(&self) -> usize {
        self.start + self.slices
    }

    pub fn compression_ratio(&self) -> f64 {
        if self.compressed_size == 0 {
            0.0
        } else {
            self.uncompressed_size as f64 / self.compressed_size as f64
        }
    }
}

/// Footer describing everything stored in a container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerManifest {
    pub version: FormatVersion,

    pub id: Uuid,

    pub dataset: DatasetDescriptor,

    pub compression: CompressionMethod,

    pub compression_level: CompressionLevel,

    pub created_at: DateTime<Utc>,

    /// False when the writer was closed before every slice was written
    pub complete: bool,

    /// Chunks in increasing slice order
    pub chunks: Vec<ChunkRecord>,
}

impl ContainerManifest {
    pub fn new(
        dataset: DatasetDescriptor,
        compression: CompressionMethod,
        compression_level: CompressionLevel,
    ) -> Self {
        Self {
            version: FormatVersion::default(),
            id: Uuid::new_v4(),
            dataset,
            compression,
            compression_level,
            created_at: Utc::now(),
            complete: false,
            chunks: Vec::new(),
        }
    }

    /// Number of slices covered by the recorded chunks
    pub fn slices_written(&self) -> usize {
        self.chunks.last().map(ChunkRecord::end).unwrap_or(0)
    }

    /// Sum of compressed payload sizes
    pub fn compressed_bytes(&self) -> u64 {
        self.chunks.iter().map(|c| c.compressed_size as u64).sum()
    }

    /// Chunks overlapping `[start, end)`
    pub fn chunks_in(&self, start: usize, end: usize) -> impl Iterator<Item = &ChunkRecord> {
        self.chunks
            .iter()
            .filter(move |c| c.start < end && c.end() > start)
    }

    /// Get a summary string of the container
    pub fn summary(&self) -> String {
        let ratio = if self.compressed_bytes() == 0 {
            0.0
        } else {
            self.dataset.total_bytes() as f64 / self.compressed_bytes() as f64
        };
        format!(
            "'{}': {} ({}), {} chunks, {:?} level {}, ratio {:.2}{}",
            self.dataset.name,
            self.dataset.dims,
            self.dataset.sample_type,
            self.chunks.len(),
            self.compression,
            self.compression_level.value(),
            ratio,
            if self.complete { "" } else { " [INCOMPLETE]" }
        )
    }
}
