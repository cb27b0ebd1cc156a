//! Sample type inference from file size and declared dimensions

use crate::error::{Result, VolConvError};
use crate::types::{SampleType, VolumeDescriptor};
use log::info;

/// Derive the sample type of a headerless volume.
///
/// The byte width is `file_size / voxel_count` and must divide exactly.
/// `integer` resolves the 2/4/8-byte ambiguity; `false` selects floating point.
pub fn infer_sample_type(
    file_size: u64,
    dims: &VolumeDescriptor,
    integer: bool,
) -> Result<SampleType> {
    let voxels = dims.voxel_count().ok_or_else(|| {
        VolConvError::InvalidDimensions(format!("{} voxels overflow a 64-bit count", dims))
    })?;
    if voxels == 0 || file_size % voxels != 0 {
        return Err(VolConvError::DimensionMismatch { file_size, voxels });
    }

    let byte_width = file_size / voxels;
    let sample_type = SampleType::from_byte_width(byte_width, integer)
        .ok_or(VolConvError::UnsupportedDataType(byte_width))?;

    info!("Detected {} bit data ({})", sample_type.bits(), sample_type);
    Ok(sample_type)
}
