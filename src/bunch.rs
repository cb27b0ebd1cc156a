//! Typed in-memory bunch of depth slices

use crate::error::{Result, VolConvError};
use crate::preview::normalize_slice;
use crate::types::{SampleType, Voxel};
use half::f16;
use ndarray::{Array2, Array3, ArrayView2, Axis};

/// A dense `(slices, height, width)` array of one sample type
#[derive(Debug, Clone, PartialEq)]
pub enum VolumeBunch {
    U8(Array3<u8>),
    U16(Array3<u16>),
    U32(Array3<u32>),
    U64(Array3<u64>),
    F16(Array3<f16>),
    F32(Array3<f32>),
    F64(Array3<f64>),
}

fn decode<T: Voxel>(raw: &[u8], shape: (usize, usize, usize)) -> Result<Array3<T>> {
    let count = shape.0 * shape.1 * shape.2;
    let expected = count * T::SAMPLE_TYPE.size_in_bytes();
    if raw.len() != expected {
        return Err(VolConvError::InvalidDimensions(format!(
            "bunch of shape {:?} needs {} bytes of {}, got {}",
            shape,
            expected,
            T::SAMPLE_TYPE,
            raw.len()
        )));
    }

    let mut values = vec![T::default(); count];
    T::decode_le(raw, &mut values);
    Array3::from_shape_vec(shape, values).map_err(|e| VolConvError::InvalidDimensions(e.to_string()))
}

fn encode<T: Voxel>(array: &Array3<T>) -> Vec<u8> {
    let mut bytes = vec![0u8; array.len() * T::SAMPLE_TYPE.size_in_bytes()];
    match array.as_slice() {
        Some(values) => T::encode_le(values, &mut bytes),
        None => {
            let values: Vec<T> = array.iter().copied().collect();
            T::encode_le(&values, &mut bytes);
        }
    }
    bytes
}

fn preview_at<T: Voxel>(array: &Array3<T>, slice: usize) -> Array2<u8> {
    let view: ArrayView2<T> = array.index_axis(Axis(0), slice);
    normalize_slice(view)
}

impl VolumeBunch {
    /// Reinterpret little-endian bytes as a `(slices, height, width)` bunch
    pub fn from_le_bytes(
        sample_type: SampleType,
        shape: (usize, usize, usize),
        raw: &[u8],
    ) -> Result<Self> {
        Ok(match sample_type {
            SampleType::U8 => VolumeBunch::U8(decode(raw, shape)?),
            SampleType::U16 => VolumeBunch::U16(decode(raw, shape)?),
            SampleType::U32 => VolumeBunch::U32(decode(raw, shape)?),
            SampleType::U64 => VolumeBunch::U64(decode(raw, shape)?),
            SampleType::F16 => VolumeBunch::F16(decode(raw, shape)?),
            SampleType::F32 => VolumeBunch::F32(decode(raw, shape)?),
            SampleType::F64 => VolumeBunch::F64(decode(raw, shape)?),
        })
    }

    /// Serialize back to little-endian bytes in row-major order
    pub fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            VolumeBunch::U8(a) => encode(a),
            VolumeBunch::U16(a) => encode(a),
            VolumeBunch::U32(a) => encode(a),
            VolumeBunch::U64(a) => encode(a),
            VolumeBunch::F16(a) => encode(a),
            VolumeBunch::F32(a) => encode(a),
            VolumeBunch::F64(a) => encode(a),
        }
    }

    pub fn sample_type(&self) -> SampleType {
        match self {
            VolumeBunch::U8(_) => SampleType::U8,
            VolumeBunch::U16(_) => SampleType::U16,
            VolumeBunch::U32(_) => SampleType::U32,
            VolumeBunch::U64(_) => SampleType::U64,
            VolumeBunch::F16(_) => SampleType::F16,
            VolumeBunch::F32(_) => SampleType::F32,
            VolumeBunch::F64(_) => SampleType::F64,
        }
    }

    /// Shape as `(slices, height, width)`
    pub fn shape(&self) -> (usize, usize, usize) {
        match self {
            VolumeBunch::U8(a) => a.dim(),
            VolumeBunch::U16(a) => a.dim(),
            VolumeBunch::U32(a) => a.dim(),
            VolumeBunch::U64(a) => a.dim(),
            VolumeBunch::F16(a) => a.dim(),
            VolumeBunch::F32(a) => a.dim(),
            VolumeBunch::F64(a) => a.dim(),
        }
    }

    /// Number of depth slices held
    pub fn slices(&self) -> usize {
        self.shape().0
    }

    /// Size of the bunch in bytes
    pub fn size_in_bytes(&self) -> usize {
        let (d, h, w) = self.shape();
        d * h * w * self.sample_type().size_in_bytes()
    }

    /// 8-bit preview of the slice at `slice` (relative to this bunch)
    pub fn preview_slice(&self, slice: usize) -> Array2<u8> {
        match self {
            VolumeBunch::U8(a) => preview_at(a, slice),
            VolumeBunch::U16(a) => preview_at(a, slice),
            VolumeBunch::U32(a) => preview_at(a, slice),
            VolumeBunch::U64(a) => preview_at(a, slice),
            VolumeBunch::F16(a) => preview_at(a, slice),
            VolumeBunch::F32(a) => preview_at(a, slice),
            VolumeBunch::F64(a) => preview_at(a, slice),
        }
    }
}
