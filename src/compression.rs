//! Compression and decompression of container chunks

use crate::error::{Result, VolConvError};
use flate2::read::{DeflateDecoder, DeflateEncoder};
use flate2::Compression as FlateCompression;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::str::FromStr;

/// Compression methods supported by the container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMethod {
    /// No compression
    None,
    /// Deflate/ZIP compression
    Deflate,
    /// Zstandard compression
    Zstd,
}

impl FromStr for CompressionMethod {
    type Err = VolConvError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(CompressionMethod::None),
            "deflate" | "gzip" | "zip" => Ok(CompressionMethod::Deflate),
            "zstd" => Ok(CompressionMethod::Zstd),
            other => Err(VolConvError::InvalidConfiguration(format!(
                "unknown compression method '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Compression level (0-9, where 0 is no compression and 9 is maximum)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionLevel(u8);

impl CompressionLevel {
    pub fn new(level: u8) -> Self {
        Self(level.min(9))
    }

    pub fn fast() -> Self {
        Self(1)
    }

    pub fn best() -> Self {
        Self(9)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self(6)
    }
}

/// Trait for compression/decompression operations
pub trait Compressor: Send + Sync {
    /// Compress data
    fn compress(&self, data: &[u8], level: CompressionLevel) -> Result<Vec<u8>>;

    /// Decompress data
    fn decompress(&self, data: &[u8], expected_size: Option<usize>) -> Result<Vec<u8>>;
}

/// No compression
#[derive(Debug, Default)]
pub struct NoneCompressor;

impl Compressor for NoneCompressor {
    fn compress(&self, data: &[u8], _level: CompressionLevel) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8], _expected_size: Option<usize>) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

/// Deflate compression
#[derive(Debug, Default)]
pub struct DeflateCompressor;

impl Compressor for DeflateCompressor {
    fn compress(&self, data: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
        let mut encoder = DeflateEncoder::new(data, FlateCompression::new(level.value() as u32));
        let mut compressed = Vec::new();
        encoder
            .read_to_end(&mut compressed)
            .map_err(|e| VolConvError::Compression(e.to_string()))?;
        Ok(compressed)
    }

    fn decompress(&self, data: &[u8], expected_size: Option<usize>) -> Result<Vec<u8>> {
        let mut decoder = DeflateDecoder::new(data);
        let mut decompressed = if let Some(size) = expected_size {
            Vec::with_capacity(size)
        } else {
            Vec::new()
        };
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| VolConvError::Decompression(e.to_string()))?;
        Ok(decompressed)
    }
}

/// Zstandard compression
#[derive(Debug, Default)]
pub struct ZstdCompressor;

impl Compressor for ZstdCompressor {
    fn compress(&self, data: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
        // Spread the 0-9 scale over zstd's useful range
        let zstd_level = i32::from(level.value()) * 2 + 1;
        zstd::encode_all(data, zstd_level).map_err(|e| VolConvError::Compression(e.to_string()))
    }

    fn decompress(&self, data: &[u8], _expected_size: Option<usize>) -> Result<Vec<u8>> {
        zstd::decode_all(data).map_err(|e| VolConvError::Decompression(e.to_string()))
    }
}

/// Get a compressor for a given method
pub fn get_compressor(method: CompressionMethod) -> Box<dyn Compressor> {
    match method {
        CompressionMethod::None => Box::new(NoneCompressor),
        CompressionMethod::Deflate => Box::new(DeflateCompressor),
        CompressionMethod::Zstd => Box::new(ZstdCompressor),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_compression() {
        let compressor = NoneCompressor;
        let data = b"Hello, world!";
        let compressed = compressor
            .compress(data, CompressionLevel::default())
            .unwrap();
        assert_eq!(compressed, data);
        let decompressed = compressor.decompress(&compressed, None).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn test_deflate() {
        let compressor = DeflateCompressor;
        let data = b"Hello, world! ".repeat(100);
        let compressed = compressor.compress(&data, CompressionLevel::best()).unwrap();
        assert!(compressed.len() < data.len());
        let decompressed = compressor
            .decompress(&compressed, Some(data.len()))
            .unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn test_zstd() {
        let compressor = ZstdCompressor;
        let data = b"Hello, world! ".repeat(100);
        let compressed = compressor
            .compress(&data, CompressionLevel::default())
            .unwrap();
        assert!(compressed.len() < data.len());
        let decompressed = compressor.decompress(&compressed, None).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn test_corrupt_zstd_stream() {
        let compressor = get_compressor(CompressionMethod::Zstd);
        assert!(matches!(
            compressor.decompress(&[0xde, 0xad, 0xbe, 0xef], None),
            Err(VolConvError::Decompression(_))
        ));
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("gzip".parse::<CompressionMethod>().unwrap(), CompressionMethod::Deflate);
        assert_eq!("ZSTD".parse::<CompressionMethod>().unwrap(), CompressionMethod::Zstd);
        assert!("lzma".parse::<CompressionMethod>().is_err());
        assert_eq!(
            serde_json::to_string(&CompressionMethod::Zstd).unwrap(),
            "\"zstd\""
        );
        assert_eq!(CompressionLevel::new(42).value(), 9);
    }
}
