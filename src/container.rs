//! Compressed dataset container
//!
//! A container is a single file:
//!
//! ```text
//! "VDC\0" | u16 major | u16 minor          header, 8 bytes
//! chunk payload 0 | chunk payload 1 | ...  compressed bunches, in slice order
//! manifest (JSON)                          ContainerManifest
//! u64 manifest length | "VDC\0"            trailer, 12 bytes
//! ```
//!
//! All integers are little-endian. The trailer is written by
//! [`ContainerWriter::close`], or by [`ContainerWriter::abort`] when a
//! conversion fails part way, in which case the manifest is flagged incomplete.

use crate::bunch::VolumeBunch;
use crate::compression::{get_compressor, CompressionLevel, CompressionMethod};
use crate::error::{Result, VolConvError};
use crate::metadata::{ChunkRecord, ContainerManifest, DatasetDescriptor, FormatVersion};
use crate::utils::calculate_checksum;
use bytes::Bytes;
use log::{debug, warn};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufWriter};

/// Magic number opening and closing every container
pub const CONTAINER_MAGIC: &[u8; 4] = b"VDC\0";

/// File extension used for containers
pub const CONTAINER_EXTENSION: &str = "vdc";

const HEADER_LEN: u64 = 8;
const TRAILER_LEN: u64 = 12;

/// Writes bunches into a new container, strictly in increasing slice order
pub struct ContainerWriter {
    path: PathBuf,
    file: BufWriter<File>,
    manifest: ContainerManifest,
    position: u64,
    next_slice: usize,
}

impl ContainerWriter {
    /// Create (or truncate) a container at `path`
    pub async fn create(
        path: impl AsRef<Path>,
        dataset: DatasetDescriptor,
        compression: CompressionMethod,
        level: CompressionLevel,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = BufWriter::new(File::create(&path).await?);

        let version = FormatVersion::CURRENT;
        file.write_all(CONTAINER_MAGIC).await?;
        file.write_u16_le(version.major).await?;
        file.write_u16_le(version.minor).await?;

        debug!(
            "Created container {} for {} ({})",
            path.display(),
            dataset.dims,
            dataset.sample_type
        );

        Ok(Self {
            path,
            file,
            manifest: ContainerManifest::new(dataset, compression, level),
            position: HEADER_LEN,
            next_slice: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// First slice the next `write_range` call must start at
    pub fn next_slice(&self) -> usize {
        self.next_slice
    }

    pub fn manifest(&self) -> &ContainerManifest {
        &self.manifest
    }

    /// Write `bunch` as slices `[start, start + bunch.slices())`.
    ///
    /// Callers must tile the depth axis in order: `start` is always the end of
    /// the previous range. Compression runs on the blocking pool.
    pub async fn write_range(
        &mut self,
        start: usize,
        bunch: Arc<VolumeBunch>,
    ) -> Result<ChunkRecord> {
        debug_assert_eq!(start, self.next_slice, "container ranges must be contiguous");
        debug_assert_eq!(bunch.sample_type(), self.manifest.dataset.sample_type);
        debug_assert!(start + bunch.slices() <= self.manifest.dataset.dims.depth);

        let slices = bunch.slices();
        let method = self.manifest.compression;
        let level = self.manifest.compression_level;
        let (uncompressed_size, payload) = tokio::task::spawn_blocking(move || {
            let raw = bunch.to_le_bytes();
            let compressed = get_compressor(method).compress(&raw, level)?;
            Ok::<_, VolConvError>((raw.len(), compressed))
        })
        .await??;

        self.file.write_all(&payload).await?;

        let record = ChunkRecord {
            start,
            slices,
            offset: self.position,
            compressed_size: payload.len(),
            uncompressed_size,
            checksum: calculate_checksum(&payload),
        };
        self.position += payload.len() as u64;
        self.next_slice = start + slices;
        self.manifest.chunks.push(record.clone());

        debug!(
            "Wrote slices {}..{} ({} -> {} bytes)",
            record.start,
            record.end(),
            record.uncompressed_size,
            record.compressed_size
        );
        Ok(record)
    }

    /// Write the manifest and trailer, flush and close the file.
    ///
    /// Consumes the writer so it can only happen once. The container is
    /// flagged complete when every slice of the dataset was written.
    pub async fn close(self) -> Result<ContainerManifest> {
        let complete = self.next_slice == self.manifest.dataset.dims.depth;
        self.finish(complete).await
    }

    /// Close after a failed conversion.
    ///
    /// The container stays readable but is always flagged incomplete, even if
    /// every slice reached it.
    pub async fn abort(self) -> Result<ContainerManifest> {
        self.finish(false).await
    }

    async fn finish(mut self, complete: bool) -> Result<ContainerManifest> {
        self.manifest.complete = complete;
        if !complete {
            warn!(
                "Closing incomplete container {} ({} of {} slices written)",
                self.path.display(),
                self.next_slice,
                self.manifest.dataset.dims.depth
            );
        }

        let manifest_json = serde_json::to_vec(&self.manifest)?;
        self.file.write_all(&manifest_json).await?;
        self.file.write_u64_le(manifest_json.len() as u64).await?;
        self.file.write_all(CONTAINER_MAGIC).await?;
        self.file.flush().await?;
        self.file.get_ref().sync_all().await?;

        Ok(self.manifest)
    }
}

/// Reads a container written by [`ContainerWriter`]
pub struct ContainerReader {
    path: PathBuf,
    file: File,
    manifest: ContainerManifest,
}

impl ContainerReader {
    /// Open a container and load its manifest
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path).await?;
        let file_len = file.metadata().await?.len();

        if file_len < HEADER_LEN + TRAILER_LEN {
            return Err(VolConvError::InvalidFormat(format!(
                "{} is too short to be a container ({} bytes)",
                path.display(),
                file_len
            )));
        }

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic).await?;
        if &magic != CONTAINER_MAGIC {
            return Err(VolConvError::InvalidFormat("bad header magic".to_string()));
        }
        let version = FormatVersion::new(file.read_u16_le().await?, file.read_u16_le().await?);
        if !version.is_compatible(&FormatVersion::CURRENT) {
            return Err(VolConvError::InvalidFormat(format!(
                "unsupported container version {}.{}",
                version.major, version.minor
            )));
        }

        file.seek(SeekFrom::Start(file_len - TRAILER_LEN)).await?;
        let manifest_len = file.read_u64_le().await?;
        file.read_exact(&mut magic).await?;
        if &magic != CONTAINER_MAGIC {
            return Err(VolConvError::InvalidFormat(
                "bad trailer magic (container was not closed)".to_string(),
            ));
        }
        if manifest_len > file_len - HEADER_LEN - TRAILER_LEN {
            return Err(VolConvError::InvalidFormat(format!(
                "manifest length {} exceeds file size",
                manifest_len
            )));
        }

        file.seek(SeekFrom::Start(file_len - TRAILER_LEN - manifest_len))
            .await?;
        let mut manifest_json = vec![0u8; manifest_len as usize];
        file.read_exact(&mut manifest_json).await?;
        let manifest: ContainerManifest = serde_json::from_slice(&manifest_json)?;

        Ok(Self {
            path,
            file,
            manifest,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn manifest(&self) -> &ContainerManifest {
        &self.manifest
    }

    /// Raw little-endian bytes of slices `[start, start + count)`
    pub async fn read_range_bytes(&mut self, start: usize, count: usize) -> Result<Bytes> {
        let end = start + count;
        if count == 0 || end > self.manifest.slices_written() {
            return Err(VolConvError::InvalidDimensions(format!(
                "slices {}..{} are outside the {} written slices",
                start,
                end,
                self.manifest.slices_written()
            )));
        }

        let slice_bytes = self.manifest.dataset.slice_bytes();
        let compressor = get_compressor(self.manifest.compression);
        let chunks: Vec<ChunkRecord> = self.manifest.chunks_in(start, end).cloned().collect();
        let mut out = Vec::with_capacity(count * slice_bytes);

        for chunk in chunks {
            self.file.seek(SeekFrom::Start(chunk.offset)).await?;
            let mut payload = vec![0u8; chunk.compressed_size];
            self.file.read_exact(&mut payload).await?;

            let actual = calculate_checksum(&payload);
            if actual != chunk.checksum {
                return Err(VolConvError::ChecksumMismatch {
                    start: chunk.start,
                    expected: chunk.checksum,
                    actual,
                });
            }

            let data = compressor.decompress(&payload, Some(chunk.uncompressed_size))?;
            if data.len() != chunk.slices * slice_bytes {
                return Err(VolConvError::Decompression(format!(
                    "chunk at slice {} inflated to {} bytes, expected {}",
                    chunk.start,
                    data.len(),
                    chunk.slices * slice_bytes
                )));
            }

            let from = start.max(chunk.start) - chunk.start;
            let to = end.min(chunk.end()) - chunk.start;
            out.extend_from_slice(&data[from * slice_bytes..to * slice_bytes]);
        }

        Ok(Bytes::from(out))
    }

    /// Decode slices `[start, start + count)` into a typed bunch
    pub async fn read_range(&mut self, start: usize, count: usize) -> Result<VolumeBunch> {
        let raw = self.read_range_bytes(start, count).await?;
        let dims = self.manifest.dataset.dims;
        VolumeBunch::from_le_bytes(
            self.manifest.dataset.sample_type,
            (count, dims.height, dims.width),
            &raw,
        )
    }

    /// Decode the whole dataset
    pub async fn read_all(&mut self) -> Result<VolumeBunch> {
        if !self.manifest.complete {
            return Err(VolConvError::InvalidFormat(format!(
                "{} is incomplete",
                self.path.display()
            )));
        }
        let depth = self.manifest.dataset.dims.depth;
        self.read_range(0, depth).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SampleType, VolumeDescriptor};
    use tempfile::TempDir;

    fn u16_bunch(start: usize, slices: usize) -> Arc<VolumeBunch> {
        let raw: Vec<u8> = (start * 6..(start + slices) * 6)
            .flat_map(|v| (v as u16 * 3).to_le_bytes())
            .collect();
        Arc::new(VolumeBunch::from_le_bytes(SampleType::U16, (slices, 2, 3), &raw).unwrap())
    }

    fn dataset() -> DatasetDescriptor {
        DatasetDescriptor::new(VolumeDescriptor::new(5, 2, 3).unwrap(), SampleType::U16)
    }

    #[tokio::test]
    async fn test_write_and_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("volume.vdc");

        let mut writer = ContainerWriter::create(
            &path,
            dataset(),
            CompressionMethod::Deflate,
            CompressionLevel::best(),
        )
        .await
        .unwrap();
        writer.write_range(0, u16_bunch(0, 2)).await.unwrap();
        writer.write_range(2, u16_bunch(2, 2)).await.unwrap();
        let record = writer.write_range(4, u16_bunch(4, 1)).await.unwrap();
        assert_eq!(record.end(), 5);
        let manifest = writer.close().await.unwrap();
        assert!(manifest.complete);
        assert_eq!(manifest.chunks.len(), 3);

        let mut reader = ContainerReader::open(&path).await.unwrap();
        assert_eq!(reader.manifest().dataset.name, "voldata");
        assert_eq!(reader.manifest().id, manifest.id);

        let all = reader.read_all().await.unwrap();
        assert_eq!(all.to_le_bytes(), u16_bunch(0, 5).to_le_bytes());

        // range straddling two chunks
        let middle = reader.read_range(1, 3).await.unwrap();
        assert_eq!(middle.shape(), (3, 2, 3));
        assert_eq!(middle, *u16_bunch(1, 3));
    }

    #[tokio::test]
    async fn test_incomplete_container_is_readable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.vdc");

        let mut writer = ContainerWriter::create(
            &path,
            dataset(),
            CompressionMethod::Zstd,
            CompressionLevel::fast(),
        )
        .await
        .unwrap();
        writer.write_range(0, u16_bunch(0, 2)).await.unwrap();
        let manifest = writer.close().await.unwrap();
        assert!(!manifest.complete);

        let mut reader = ContainerReader::open(&path).await.unwrap();
        assert!(!reader.manifest().complete);
        assert!(reader.read_all().await.is_err());
        assert_eq!(reader.read_range(0, 2).await.unwrap(), *u16_bunch(0, 2));
        assert!(reader.read_range(1, 2).await.is_err());
    }

    #[tokio::test]
    async fn test_abort_marks_full_container_incomplete() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("aborted.vdc");

        let mut writer = ContainerWriter::create(
            &path,
            dataset(),
            CompressionMethod::Deflate,
            CompressionLevel::fast(),
        )
        .await
        .unwrap();
        writer.write_range(0, u16_bunch(0, 5)).await.unwrap();
        let manifest = writer.abort().await.unwrap();
        assert!(!manifest.complete);
        assert_eq!(manifest.slices_written(), 5);

        let mut reader = ContainerReader::open(&path).await.unwrap();
        assert!(!reader.manifest().complete);
        assert!(reader.read_all().await.is_err());
        assert_eq!(reader.read_range(0, 5).await.unwrap(), *u16_bunch(0, 5));
    }

    #[tokio::test]
    async fn test_corrupted_payload_detected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corrupt.vdc");

        let mut writer = ContainerWriter::create(
            &path,
            dataset(),
            CompressionMethod::None,
            CompressionLevel::default(),
        )
        .await
        .unwrap();
        writer.write_range(0, u16_bunch(0, 5)).await.unwrap();
        writer.close().await.unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        bytes[HEADER_LEN as usize] ^= 0xff;
        std::fs::write(&path, &bytes).unwrap();

        let mut reader = ContainerReader::open(&path).await.unwrap();
        assert!(matches!(
            reader.read_all().await,
            Err(VolConvError::ChecksumMismatch { start: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_rejects_non_container() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("garbage.vdc");
        std::fs::write(&path, vec![7u8; 64]).unwrap();
        assert!(matches!(
            ContainerReader::open(&path).await,
            Err(VolConvError::InvalidFormat(_))
        ));
    }
}
