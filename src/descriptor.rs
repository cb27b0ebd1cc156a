//! Sources of volume dimensions

use crate::error::{Result, VolConvError};
use crate::types::VolumeDescriptor;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use xmlparser::{ElementEnd, Token, Tokenizer};

/// Tags holding depth, height and width in an XML descriptor
pub const DESCRIPTOR_TAGS: [&str; 3] = ["SIZEZ", "SIZEY", "SIZEX"];

/// Trait for anything that can supply the dimensions of a raw volume
#[async_trait]
pub trait DimensionSource: Send + Sync {
    /// Resolve `(depth, height, width)`
    async fn dimensions(&self) -> Result<VolumeDescriptor>;

    /// Human-readable origin, used in log messages
    fn describe(&self) -> String;
}

/// Dimensions given explicitly by the caller
#[derive(Debug, Clone, Copy)]
pub struct FixedDimensions(pub VolumeDescriptor);

#[async_trait]
impl DimensionSource for FixedDimensions {
    async fn dimensions(&self) -> Result<VolumeDescriptor> {
        Ok(self.0)
    }

    fn describe(&self) -> String {
        "explicit dimensions".to_string()
    }
}

/// XML sidecar written next to the raw file (`<file>.xml`)
#[derive(Debug, Clone)]
pub struct XmlDescriptor {
    path: PathBuf,
}

impl XmlDescriptor {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Descriptor conventionally paired with `source`: the full file name plus `.xml`
    pub fn for_source(source: impl AsRef<Path>) -> Self {
        let mut path = source.as_ref().as_os_str().to_os_string();
        path.push(".xml");
        Self::new(PathBuf::from(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unresolved(&self, reason: impl std::fmt::Display) -> VolConvError {
        VolConvError::Descriptor(format!(
            "unable to determine dimensions from {}: {}. Please specify them explicitly as [SIZEZ, SIZEY, SIZEX]",
            self.path.display(),
            reason
        ))
    }
}

#[async_trait]
impl DimensionSource for XmlDescriptor {
    async fn dimensions(&self) -> Result<VolumeDescriptor> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.unresolved(e))?;
        parse_descriptor(&text).map_err(|e| self.unresolved(e))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Extract dimensions from descriptor XML.
///
/// When a tag repeats, the last occurrence of each of `SIZEZ`, `SIZEY`, `SIZEX`
/// in document order wins, wherever it sits in the document.
pub fn parse_descriptor(text: &str) -> std::result::Result<VolumeDescriptor, String> {
    let mut values: [Option<usize>; 3] = [None; 3];
    let mut open: Option<usize> = None;

    for token in Tokenizer::from(text) {
        match token.map_err(|e| e.to_string())? {
            Token::ElementStart { local, .. } => {
                open = DESCRIPTOR_TAGS.iter().position(|tag| *tag == local.as_str());
            }
            Token::ElementEnd {
                end: ElementEnd::Close(..) | ElementEnd::Empty,
                ..
            } => open = None,
            Token::Text { text } => {
                if let Some(slot) = open {
                    let raw = text.as_str().trim();
                    if !raw.is_empty() {
                        let value = raw.parse::<usize>().map_err(|_| {
                            format!("{} is not a positive integer: '{}'", DESCRIPTOR_TAGS[slot], raw)
                        })?;
                        values[slot] = Some(value);
                    }
                }
            }
            _ => {}
        }
    }

    match values {
        [Some(depth), Some(height), Some(width)] => {
            VolumeDescriptor::new(depth, height, width).map_err(|e| e.to_string())
        }
        _ => {
            let missing: Vec<&str> = DESCRIPTOR_TAGS
                .iter()
                .zip(values.iter())
                .filter(|(_, v)| v.is_none())
                .map(|(tag, _)| *tag)
                .collect();
            Err(format!("missing {}", missing.join(", ")))
        }
    }
}
