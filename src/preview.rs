//! 8-bit preview rendering
//!
//! Previews are diagnostic only. Each slice is normalized against its own
//! min/max, so brightness is not comparable between slices; the container
//! keeps the full-precision data.

use crate::bunch::VolumeBunch;
use crate::error::Result;
use crate::types::Voxel;
use crate::utils::preview_file_name;
use log::debug;
use ndarray::{Array2, ArrayView2};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tiff::encoder::compression::{Deflate, DeflateLevel};
use tiff::encoder::{colortype, TiffEncoder};

/// Map one slice to 8-bit intensity.
///
/// - `min == max == 0`: all zero
/// - `min == max != 0`: `round(v / max * 255)`
/// - otherwise: `round((v - min) / (max - min) * 255)`
///
/// Results are clamped to `[0, 255]`. Non-finite samples do not take part in
/// the min/max and render as 0.
pub fn normalize_slice<T: Voxel>(slice: ArrayView2<T>) -> Array2<u8> {
    let (min, max) = slice
        .iter()
        .map(|v| v.to_f64())
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });

    if min > max {
        // no finite samples at all
        return Array2::zeros(slice.raw_dim());
    }

    let (offset, scale) = if min != max {
        (min, 255.0 / (max - min))
    } else if max != 0.0 {
        (0.0, 255.0 / max)
    } else {
        return Array2::zeros(slice.raw_dim());
    };

    slice.map(|v| {
        let value = v.to_f64();
        if value.is_finite() {
            ((value - offset) * scale).round().clamp(0.0, 255.0) as u8
        } else {
            0
        }
    })
}

/// Writes preview slices as Deflate-compressed 8-bit grayscale TIFFs
#[derive(Debug, Clone)]
pub struct PreviewWriter {
    dir: PathBuf,
}

impl PreviewWriter {
    /// Create a writer for `dir`, creating the directory if needed
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the preview for a global slice index
    pub fn slice_path(&self, slice: usize) -> PathBuf {
        self.dir.join(preview_file_name(slice))
    }

    /// Write every slice of `bunch`, numbering from `first_slice`.
    ///
    /// Returns the number of images written.
    pub fn write_bunch(&self, bunch: &VolumeBunch, first_slice: usize) -> Result<usize> {
        let (slices, _, _) = bunch.shape();
        for j in 0..slices {
            let image = bunch.preview_slice(j);
            self.write_slice(first_slice + j, &image)?;
        }
        debug!(
            "Wrote previews {}..{} to {}",
            first_slice,
            first_slice + slices,
            self.dir.display()
        );
        Ok(slices)
    }

    /// Write a single 8-bit image for the global slice index `slice`
    pub fn write_slice(&self, slice: usize, image: &Array2<u8>) -> Result<()> {
        let (height, width) = image.dim();
        let pixels: Vec<u8> = image.iter().copied().collect();

        let mut file = BufWriter::new(File::create(self.slice_path(slice))?);
        TiffEncoder::new(&mut file)?.write_image_with_compression::<colortype::Gray8, _>(
            width as u32,
            height as u32,
            Deflate::with_level(DeflateLevel::Balanced),
            &pixels,
        )?;
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tempfile::TempDir;
    use tiff::decoder::{Decoder, DecodingResult};

    #[test]
    fn test_constant_nonzero_slice() {
        let slice = Array2::from_elem((3, 4), 7u16);
        let out = normalize_slice(slice.view());
        assert!(out.iter().all(|&v| v == 255));
    }

    #[test]
    fn test_zero_slice() {
        let slice = Array2::<f32>::zeros((3, 4));
        let out = normalize_slice(slice.view());
        assert!(out.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_constant_negative_slice() {
        let slice = Array2::from_elem((2, 2), -3.0f64);
        let out = normalize_slice(slice.view());
        assert!(out.iter().all(|&v| v == 255));
    }

    #[test]
    fn test_stretch() {
        let slice = array![[10.0f32, 30.0], [50.0, 110.0]];
        let out = normalize_slice(slice.view());
        assert_eq!(out, array![[0u8, 51], [102, 255]]);
    }

    #[test]
    fn test_non_finite_ignored() {
        let slice = array![[f32::NAN, 0.0], [1.0, f32::INFINITY]];
        let out = normalize_slice(slice.view());
        assert_eq!(out, array![[0u8, 0], [255, 0]]);
    }

    #[test]
    fn test_write_bunch() {
        let dir = TempDir::new().unwrap();
        let writer = PreviewWriter::create(dir.path().join("previews")).unwrap();

        let raw: Vec<u8> = (0..2 * 3 * 5).map(|v| v as u8).collect();
        let bunch = VolumeBunch::from_le_bytes(crate::types::SampleType::U8, (2, 3, 5), &raw)
            .unwrap();
        assert_eq!(writer.write_bunch(&bunch, 10).unwrap(), 2);

        assert!(writer.slice_path(10).exists());
        assert!(writer.slice_path(11).exists());
        assert!(!writer.slice_path(12).exists());

        let mut decoder = Decoder::new(File::open(writer.slice_path(11)).unwrap()).unwrap();
        assert_eq!(decoder.dimensions().unwrap(), (5, 3));
        match decoder.read_image().unwrap() {
            DecodingResult::U8(pixels) => {
                assert_eq!(pixels.len(), 15);
                assert_eq!(pixels[0], 0);
                assert_eq!(pixels[14], 255);
            }
            _ => panic!("expected 8-bit preview"),
        }
    }
}
