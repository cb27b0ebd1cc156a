//! VolConv - raw volume to compressed container converter
//!
//! Converts a headerless binary volume (a flat file of voxel samples) into a
//! compressed, lossless dataset container and, optionally, a stack of 8-bit
//! preview TIFFs for quick inspection.
//!
//! # Features
//!
//! - Sample type inferred from file size and dimensions (8/16/32/64 bit,
//!   unsigned integer or floating point)
//! - Bounded memory: the depth axis is streamed in bunches
//! - Preview rendering overlapped with container writes
//! - Deflate or Zstd compressed, checksummed chunks
//!
//! # Example
//!
//! ```rust,ignore
//! use volconv::{convert, ConversionConfig, NoProgress, VolumeDescriptor};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConversionConfig::new("/data/scan.vol")
//!     .with_dimensions(VolumeDescriptor::new(2048, 2048, 2048)?)
//!     .with_divisor(64);
//! let report = convert(config, &NoProgress).await?;
//! println!("{}", report.manifest.summary());
//! # Ok(())
//! # }
//! ```

pub mod bunch;
pub mod compression;
pub mod config;
pub mod container;
pub mod descriptor;
pub mod error;
pub mod inference;
pub mod metadata;
pub mod pipeline;
pub mod planner;
pub mod preview;
pub mod progress;
pub mod types;
pub mod utils;

// Re-exports
pub use bunch::VolumeBunch;
pub use compression::{CompressionLevel, CompressionMethod, Compressor};
pub use config::ConversionConfig;
pub use container::{ContainerReader, ContainerWriter};
pub use descriptor::{DimensionSource, FixedDimensions, XmlDescriptor};
pub use error::{Result, VolConvError};
pub use inference::infer_sample_type;
pub use metadata::{ContainerManifest, DATASET_NAME};
pub use pipeline::{convert, ConversionPlan, ConversionReport, PipelineState, StreamPipeline};
pub use planner::{plan_bunches, FracList};
pub use preview::{normalize_slice, PreviewWriter};
pub use progress::{BarProgress, NoProgress, ProgressReporter};
pub use types::{SampleType, VolumeDescriptor};

/// Version of the converter
pub const VOLCONV_VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VOLCONV_VERSION.is_empty());
    }
}
