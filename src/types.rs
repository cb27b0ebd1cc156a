//! Core data types for volume conversion

use crate::error::{Result, VolConvError};
use byteorder::{ByteOrder, LittleEndian};
use half::f16;
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sample types a raw volume may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SampleType {
    /// Unsigned 8-bit integer
    #[serde(rename = "uint8")]
    U8 = 0,
    /// Unsigned 16-bit integer
    #[serde(rename = "uint16")]
    U16 = 1,
    /// Unsigned 32-bit integer
    #[serde(rename = "uint32")]
    U32 = 2,
    /// Unsigned 64-bit integer
    #[serde(rename = "uint64")]
    U64 = 3,
    /// IEEE 754 half precision
    #[serde(rename = "float16")]
    F16 = 4,
    /// 32-bit floating point
    #[serde(rename = "float32")]
    F32 = 5,
    /// 64-bit floating point
    #[serde(rename = "float64")]
    F64 = 6,
}

impl SampleType {
    /// Resolve a byte width to a sample type.
    ///
    /// Width 1 is always `U8`; widths 2, 4 and 8 are ambiguous and resolved by
    /// `integer`. Any other width yields `None`.
    pub fn from_byte_width(width: u64, integer: bool) -> Option<Self> {
        match (width, integer) {
            (1, _) => Some(SampleType::U8),
            (2, true) => Some(SampleType::U16),
            (4, true) => Some(SampleType::U32),
            (8, true) => Some(SampleType::U64),
            (2, false) => Some(SampleType::F16),
            (4, false) => Some(SampleType::F32),
            (8, false) => Some(SampleType::F64),
            _ => None,
        }
    }

    /// Size in bytes of this sample type
    pub fn size_in_bytes(&self) -> usize {
        match self {
            SampleType::U8 => 1,
            SampleType::U16 | SampleType::F16 => 2,
            SampleType::U32 | SampleType::F32 => 4,
            SampleType::U64 | SampleType::F64 => 8,
        }
    }

    /// Bit width of a single sample
    pub fn bits(&self) -> usize {
        self.size_in_bytes() * 8
    }

    /// Check if this is a floating point type
    pub fn is_float(&self) -> bool {
        matches!(self, SampleType::F16 | SampleType::F32 | SampleType::F64)
    }

    pub fn name(&self) -> &'static str {
        match self {
            SampleType::U8 => "uint8",
            SampleType::U16 => "uint16",
            SampleType::U32 => "uint32",
            SampleType::U64 => "uint64",
            SampleType::F16 => "float16",
            SampleType::F32 => "float32",
            SampleType::F64 => "float64",
        }
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Dimensions of a volume, ordered slowest to fastest varying axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeDescriptor {
    /// Number of slices along the streaming axis
    pub depth: usize,
    pub height: usize,
    pub width: usize,
}

impl VolumeDescriptor {
    /// Create a descriptor, rejecting zero-sized axes and volumes whose voxel
    /// count does not fit in `usize`
    pub fn new(depth: usize, height: usize, width: usize) -> Result<Self> {
        if depth == 0 || height == 0 || width == 0 {
            return Err(VolConvError::InvalidDimensions(format!(
                "all dimensions must be positive, got {}x{}x{}",
                depth, height, width
            )));
        }
        if depth
            .checked_mul(height)
            .and_then(|v| v.checked_mul(width))
            .is_none()
        {
            return Err(VolConvError::InvalidDimensions(format!(
                "{}x{}x{} voxels overflow the addressable size",
                depth, height, width
            )));
        }
        Ok(Self {
            depth,
            height,
            width,
        })
    }

    /// Shape as `[depth, height, width]`
    pub fn shape(&self) -> [usize; 3] {
        [self.depth, self.height, self.width]
    }

    /// Number of voxels in one depth slice
    pub fn slice_voxels(&self) -> usize {
        // bounded by the volume check in `new`
        self.height.saturating_mul(self.width)
    }

    /// Total number of voxels in the volume, `None` if it overflows `u64`
    pub fn voxel_count(&self) -> Option<u64> {
        (self.depth as u64)
            .checked_mul(self.height as u64)?
            .checked_mul(self.width as u64)
    }
}

impl fmt::Display for VolumeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x {} x {}", self.depth, self.height, self.width)
    }
}

/// Element type of a decoded volume array.
///
/// Raw sources and container payloads are little-endian; `decode_le` and
/// `encode_le` require `src.len()` and `dst.len()` to agree on the element count.
pub trait Voxel: Copy + Default + Send + Sync + 'static {
    const SAMPLE_TYPE: SampleType;

    fn to_f64(self) -> f64;

    fn decode_le(src: &[u8], dst: &mut [Self]);

    fn encode_le(src: &[Self], dst: &mut [u8]);
}

impl Voxel for u8 {
    const SAMPLE_TYPE: SampleType = SampleType::U8;

    fn to_f64(self) -> f64 {
        f64::from(self)
    }

    fn decode_le(src: &[u8], dst: &mut [Self]) {
        dst.copy_from_slice(src);
    }

    fn encode_le(src: &[Self], dst: &mut [u8]) {
        dst.copy_from_slice(src);
    }
}

impl Voxel for u16 {
    const SAMPLE_TYPE: SampleType = SampleType::U16;

    fn to_f64(self) -> f64 {
        f64::from(self)
    }

    fn decode_le(src: &[u8], dst: &mut [Self]) {
        LittleEndian::read_u16_into(src, dst);
    }

    fn encode_le(src: &[Self], dst: &mut [u8]) {
        LittleEndian::write_u16_into(src, dst);
    }
}

impl Voxel for u32 {
    const SAMPLE_TYPE: SampleType = SampleType::U32;

    fn to_f64(self) -> f64 {
        f64::from(self)
    }

    fn decode_le(src: &[u8], dst: &mut [Self]) {
        LittleEndian::read_u32_into(src, dst);
    }

    fn encode_le(src: &[Self], dst: &mut [u8]) {
        LittleEndian::write_u32_into(src, dst);
    }
}

impl Voxel for u64 {
    const SAMPLE_TYPE: SampleType = SampleType::U64;

    fn to_f64(self) -> f64 {
        ToPrimitive::to_f64(&self).unwrap_or(f64::NAN)
    }

    fn decode_le(src: &[u8], dst: &mut [Self]) {
        LittleEndian::read_u64_into(src, dst);
    }

    fn encode_le(src: &[Self], dst: &mut [u8]) {
        LittleEndian::write_u64_into(src, dst);
    }
}

impl Voxel for f16 {
    const SAMPLE_TYPE: SampleType = SampleType::F16;

    fn to_f64(self) -> f64 {
        f16::to_f64(self)
    }

    fn decode_le(src: &[u8], dst: &mut [Self]) {
        for (value, bytes) in dst.iter_mut().zip(src.chunks_exact(2)) {
            *value = f16::from_bits(LittleEndian::read_u16(bytes));
        }
    }

    fn encode_le(src: &[Self], dst: &mut [u8]) {
        for (value, bytes) in src.iter().zip(dst.chunks_exact_mut(2)) {
            LittleEndian::write_u16(bytes, value.to_bits());
        }
    }
}

impl Voxel for f32 {
    const SAMPLE_TYPE: SampleType = SampleType::F32;

    fn to_f64(self) -> f64 {
        f64::from(self)
    }

    fn decode_le(src: &[u8], dst: &mut [Self]) {
        LittleEndian::read_f32_into(src, dst);
    }

    fn encode_le(src: &[Self], dst: &mut [u8]) {
        LittleEndian::write_f32_into(src, dst);
    }
}

impl Voxel for f64 {
    const SAMPLE_TYPE: SampleType = SampleType::F64;

    fn to_f64(self) -> f64 {
        self
    }

    fn decode_le(src: &[u8], dst: &mut [Self]) {
        LittleEndian::read_f64_into(src, dst);
    }

    fn encode_le(src: &[Self], dst: &mut [u8]) {
        LittleEndian::write_f64_into(src, dst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_type_sizes() {
        assert_eq!(SampleType::U8.size_in_bytes(), 1);
        assert_eq!(SampleType::F16.size_in_bytes(), 2);
        assert_eq!(SampleType::U32.size_in_bytes(), 4);
        assert_eq!(SampleType::F64.bits(), 64);
    }

    #[test]
    fn test_from_byte_width() {
        assert_eq!(SampleType::from_byte_width(1, false), Some(SampleType::U8));
        assert_eq!(SampleType::from_byte_width(1, true), Some(SampleType::U8));
        assert_eq!(SampleType::from_byte_width(2, false), Some(SampleType::F16));
        assert_eq!(SampleType::from_byte_width(2, true), Some(SampleType::U16));
        assert_eq!(SampleType::from_byte_width(8, true), Some(SampleType::U64));
        assert_eq!(SampleType::from_byte_width(3, true), None);
        assert_eq!(SampleType::from_byte_width(0, false), None);
    }

    #[test]
    fn test_sample_type_serde_names() {
        let json = serde_json::to_string(&SampleType::F32).unwrap();
        assert_eq!(json, "\"float32\"");
        let parsed: SampleType = serde_json::from_str("\"uint16\"").unwrap();
        assert_eq!(parsed, SampleType::U16);
    }

    #[test]
    fn test_descriptor_rejects_zero() {
        assert!(VolumeDescriptor::new(0, 4, 4).is_err());
        let desc = VolumeDescriptor::new(3, 4, 5).unwrap();
        assert_eq!(desc.voxel_count(), Some(60));
        assert_eq!(desc.slice_voxels(), 20);
        assert_eq!(desc.to_string(), "3 x 4 x 5");
    }

    #[test]
    fn test_descriptor_rejects_overflow() {
        assert!(matches!(
            VolumeDescriptor::new(usize::MAX, 2, 1),
            Err(VolConvError::InvalidDimensions(_))
        ));
        assert!(matches!(
            VolumeDescriptor::new(1 << 20, 1 << 20, 1 << 30),
            Err(VolConvError::InvalidDimensions(_))
        ));

        let huge = VolumeDescriptor {
            depth: usize::MAX,
            height: usize::MAX,
            width: usize::MAX,
        };
        assert_eq!(huge.voxel_count(), None);
        assert_eq!(huge.slice_voxels(), usize::MAX);
    }

    #[test]
    fn test_f16_little_endian() {
        let bytes = [0x00, 0x3c, 0x00, 0xc0];
        let mut values = [f16::ZERO; 2];
        f16::decode_le(&bytes, &mut values);
        assert_eq!(values[0].to_f32(), 1.0);
        assert_eq!(values[1].to_f32(), -2.0);

        let mut out = [0u8; 4];
        f16::encode_le(&values, &mut out);
        assert_eq!(out, bytes);
    }
}
