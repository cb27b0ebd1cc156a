//! Conversion configuration

use crate::compression::{CompressionLevel, CompressionMethod};
use crate::container::CONTAINER_EXTENSION;
use crate::descriptor::{DimensionSource, FixedDimensions, XmlDescriptor};
use crate::error::{Result, VolConvError};
use crate::planner::DEFAULT_DIVISOR;
use crate::types::VolumeDescriptor;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Suffix appended to the source stem for the preview directory
pub const PREVIEW_DIR_SUFFIX: &str = "_8b_tiffs";

/// Everything a single conversion run needs
#[derive(Debug, Clone)]
pub struct ConversionConfig {
    /// Raw headerless source file
    pub source: PathBuf,

    /// Explicit dimensions; `None` reads the XML descriptor next to the source
    pub dimensions: Option<VolumeDescriptor>,

    /// Target number of bunches the depth axis is split into
    pub divisor: usize,

    /// Write 8-bit preview TIFFs alongside the container
    pub write_previews: bool,

    /// Treat 2/4/8-byte samples as unsigned integers instead of floats
    pub integer_data: bool,

    pub compression: CompressionMethod,

    pub compression_level: CompressionLevel,
}

impl ConversionConfig {
    /// Create a configuration with defaults for `source`
    pub fn new(source: impl AsRef<Path>) -> Self {
        Self {
            source: source.as_ref().to_path_buf(),
            dimensions: None,
            divisor: DEFAULT_DIVISOR,
            write_previews: true,
            integer_data: false,
            compression: CompressionMethod::Deflate,
            compression_level: CompressionLevel::best(),
        }
    }

    /// Set explicit dimensions
    pub fn with_dimensions(mut self, dims: VolumeDescriptor) -> Self {
        self.dimensions = Some(dims);
        self
    }

    /// Set the bunch divisor
    pub fn with_divisor(mut self, divisor: usize) -> Self {
        self.divisor = divisor;
        self
    }

    /// Enable or disable previews
    pub fn with_previews(mut self, write_previews: bool) -> Self {
        self.write_previews = write_previews;
        self
    }

    /// Declare integer sample data
    pub fn with_integer_data(mut self, integer_data: bool) -> Self {
        self.integer_data = integer_data;
        self
    }

    /// Set compression method and level
    pub fn with_compression(mut self, method: CompressionMethod, level: CompressionLevel) -> Self {
        self.compression = method;
        self.compression_level = level;
        self
    }

    /// Check settings that do not need the filesystem
    pub fn validate(&self) -> Result<()> {
        if self.divisor == 0 {
            return Err(VolConvError::InvalidConfiguration(
                "divisor must be at least 1".to_string(),
            ));
        }
        if self.source.file_name().is_none() {
            return Err(VolConvError::InvalidConfiguration(format!(
                "source path {} does not name a file",
                self.source.display()
            )));
        }
        if self.container_path() == self.source {
            return Err(VolConvError::InvalidConfiguration(format!(
                "source {} would be overwritten by the container",
                self.source.display()
            )));
        }
        Ok(())
    }

    /// Where dimensions come from for this run
    pub fn dimension_source(&self) -> Box<dyn DimensionSource> {
        match self.dimensions {
            Some(dims) => Box::new(FixedDimensions(dims)),
            None => Box::new(XmlDescriptor::for_source(&self.source)),
        }
    }

    /// `<basename>.vdc`
    pub fn container_path(&self) -> PathBuf {
        self.source.with_extension(CONTAINER_EXTENSION)
    }

    /// `<basename>_8b_tiffs/`
    pub fn preview_dir(&self) -> PathBuf {
        let mut name: OsString = self
            .source
            .file_stem()
            .map(|s| s.to_os_string())
            .unwrap_or_default();
        name.push(PREVIEW_DIR_SUFFIX);
        self.source.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConversionConfig::new("/data/scan.vol");
        assert_eq!(config.divisor, 64);
        assert!(config.write_previews);
        assert!(!config.integer_data);
        assert_eq!(config.compression, CompressionMethod::Deflate);
        assert_eq!(config.compression_level.value(), 9);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_output_paths() {
        let config = ConversionConfig::new("/data/scan.vol");
        assert_eq!(config.container_path(), PathBuf::from("/data/scan.vdc"));
        assert_eq!(config.preview_dir(), PathBuf::from("/data/scan_8b_tiffs"));

        let bare = ConversionConfig::new("scan");
        assert_eq!(bare.container_path(), PathBuf::from("scan.vdc"));
        assert_eq!(bare.preview_dir(), PathBuf::from("scan_8b_tiffs"));
    }

    #[test]
    fn test_zero_divisor_rejected() {
        let config = ConversionConfig::new("scan.raw").with_divisor(0);
        assert!(matches!(
            config.validate(),
            Err(VolConvError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_source_with_container_extension_rejected() {
        let config = ConversionConfig::new("/data/scan.vdc");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_dimension_source_choice() {
        let auto = ConversionConfig::new("/data/scan.vol");
        assert_eq!(auto.dimension_source().describe(), "/data/scan.vol.xml");

        let fixed = auto.with_dimensions(VolumeDescriptor::new(2, 2, 2).unwrap());
        assert_eq!(fixed.dimension_source().describe(), "explicit dimensions");
    }
}
