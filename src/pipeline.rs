//! Streaming conversion pipeline
//!
//! The depth axis is read one bunch at a time. For each bunch the preview
//! images are rendered on a blocking worker while the primary task compresses
//! the bunch into the container; the worker is joined before the next read,
//! so at most one bunch is in flight.

use crate::bunch::VolumeBunch;
use crate::config::ConversionConfig;
use crate::container::ContainerWriter;
use crate::error::{Result, VolConvError};
use crate::inference::infer_sample_type;
use crate::metadata::{ContainerManifest, DatasetDescriptor};
use crate::planner::{plan_bunches, FracList};
use crate::preview::PreviewWriter;
use crate::progress::ProgressReporter;
use crate::types::{SampleType, VolumeDescriptor};
use crate::utils::format_bytes;
use log::{debug, info, warn};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Lifecycle of a [`StreamPipeline`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    Planning,
    /// Processing the bunch with this index
    Streaming(usize),
    Done,
    Failed,
}

/// Everything derived from the source before streaming starts
#[derive(Debug, Clone)]
pub struct ConversionPlan {
    pub dims: VolumeDescriptor,
    pub sample_type: SampleType,
    pub fractions: FracList,
    pub source_size: u64,
}

impl ConversionPlan {
    /// Bytes in one depth slice of the source
    pub fn slice_bytes(&self) -> usize {
        self.dims.slice_voxels() * self.sample_type.size_in_bytes()
    }

    /// Peak size of a single bunch in memory
    pub fn max_bunch_bytes(&self) -> usize {
        self.fractions.max_bunch() * self.slice_bytes()
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct ConversionReport {
    pub plan: ConversionPlan,
    pub container_path: PathBuf,
    pub preview_dir: Option<PathBuf>,
    pub previews_written: usize,
    pub manifest: ContainerManifest,
}

/// Converts one raw volume into a container and optional previews
pub struct StreamPipeline {
    config: ConversionConfig,
    state: PipelineState,
    plan: Option<ConversionPlan>,
}

impl StreamPipeline {
    pub fn new(config: ConversionConfig) -> Self {
        Self {
            config,
            state: PipelineState::Init,
            plan: None,
        }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Plan resolved by [`prepare`](Self::prepare), if any
    pub fn plan(&self) -> Option<&ConversionPlan> {
        self.plan.as_ref()
    }

    fn transition(&mut self, next: PipelineState) {
        debug!("Pipeline state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Resolve dimensions, sample type and bunch sizes.
    pub async fn prepare(&mut self) -> Result<&ConversionPlan> {
        if self.state != PipelineState::Init {
            return Err(VolConvError::InvalidConfiguration(format!(
                "cannot plan a pipeline in state {:?}",
                self.state
            )));
        }

        match self.resolve_plan().await {
            Ok(plan) => {
                self.transition(PipelineState::Planning);
                Ok(&*self.plan.insert(plan))
            }
            Err(err) => {
                self.transition(PipelineState::Failed);
                Err(err)
            }
        }
    }

    async fn resolve_plan(&self) -> Result<ConversionPlan> {
        self.config.validate()?;

        let source = &self.config.source;
        let metadata = tokio::fs::metadata(source).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => VolConvError::InputNotFound(source.clone()),
            _ => VolConvError::Io(e),
        })?;
        if !metadata.is_file() {
            return Err(VolConvError::InputNotFound(source.clone()));
        }

        let dimension_source = self.config.dimension_source();
        let dims = dimension_source.dimensions().await?;
        debug!("Dimensions {} from {}", dims, dimension_source.describe());

        let sample_type = infer_sample_type(metadata.len(), &dims, self.config.integer_data)?;
        let fractions = plan_bunches(dims.depth, self.config.divisor)?;

        let plan = ConversionPlan {
            dims,
            sample_type,
            fractions,
            source_size: metadata.len(),
        };
        info!(
            "Planned {} ({}, {}) in {} bunches, at most {} per bunch",
            plan.dims,
            plan.sample_type,
            format_bytes(plan.source_size as usize),
            plan.fractions.len(),
            format_bytes(plan.max_bunch_bytes())
        );
        Ok(plan)
    }

    /// Run the conversion to completion, planning first if needed.
    ///
    /// On failure after the container was created it is still closed, leaving
    /// a readable container flagged incomplete even if every slice reached it.
    pub async fn run(&mut self, progress: &dyn ProgressReporter) -> Result<ConversionReport> {
        if self.state == PipelineState::Init {
            self.prepare().await?;
        }
        let plan = match (self.state, &self.plan) {
            (PipelineState::Planning, Some(plan)) => plan.clone(),
            (state, _) => {
                return Err(VolConvError::InvalidConfiguration(format!(
                    "cannot run a pipeline in state {:?}",
                    state
                )))
            }
        };

        match self.execute(&plan, progress).await {
            Ok(report) => {
                self.transition(PipelineState::Done);
                progress.finish();
                Ok(report)
            }
            Err(err) => {
                self.transition(PipelineState::Failed);
                Err(err)
            }
        }
    }

    async fn execute(
        &mut self,
        plan: &ConversionPlan,
        progress: &dyn ProgressReporter,
    ) -> Result<ConversionReport> {
        let container_path = self.config.container_path();
        let previews = if self.config.write_previews {
            Some(PreviewWriter::create(self.config.preview_dir())?)
        } else {
            None
        };

        info!("Saving {}", container_path.display());
        if let Some(writer) = &previews {
            info!("Saving previews to {}", writer.dir().display());
        }

        let mut container = ContainerWriter::create(
            &container_path,
            DatasetDescriptor::new(plan.dims, plan.sample_type),
            self.config.compression,
            self.config.compression_level,
        )
        .await?;

        let streamed = self
            .stream(plan, &mut container, previews.as_ref(), progress)
            .await;
        let (previews_written, manifest) = match streamed {
            Ok(written) => (written, container.close().await?),
            Err(err) => {
                // the stream error wins over any error closing the container
                if let Err(close_err) = container.abort().await {
                    warn!("Failed to close {}: {}", container_path.display(), close_err);
                }
                return Err(err);
            }
        };

        Ok(ConversionReport {
            plan: plan.clone(),
            container_path,
            preview_dir: previews.map(|w| w.dir().to_path_buf()),
            previews_written,
            manifest,
        })
    }

    async fn stream(
        &mut self,
        plan: &ConversionPlan,
        container: &mut ContainerWriter,
        previews: Option<&PreviewWriter>,
        progress: &dyn ProgressReporter,
    ) -> Result<usize> {
        let mut source = File::open(&self.config.source).await?;
        let slice_bytes = plan.slice_bytes();
        let total = plan.fractions.len();
        let mut previews_written = 0;

        for range in plan.fractions.ranges() {
            self.transition(PipelineState::Streaming(range.index));

            let mut raw = vec![0u8; range.count * slice_bytes];
            source.read_exact(&mut raw).await?;
            let bunch = Arc::new(VolumeBunch::from_le_bytes(
                plan.sample_type,
                (range.count, plan.dims.height, plan.dims.width),
                &raw,
            )?);
            drop(raw);

            let helper = previews.map(|writer| {
                let writer = writer.clone();
                let bunch = Arc::clone(&bunch);
                tokio::task::spawn_blocking(move || writer.write_bunch(&bunch, range.start))
            });

            let stored = container.write_range(range.start, bunch).await;

            // join before touching the next bunch, even if the container write failed
            let rendered = match helper {
                Some(handle) => handle.await.map_err(VolConvError::from).and_then(|r| r),
                None => Ok(0),
            };
            stored?;
            previews_written += rendered?;

            progress.advance(range.index + 1, total);
        }

        Ok(previews_written)
    }
}

/// Plan and run a conversion in one call
pub async fn convert(
    config: ConversionConfig,
    progress: &dyn ProgressReporter,
) -> Result<ConversionReport> {
    StreamPipeline::new(config).run(progress).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_prepare_plans_bunches() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("scan.raw");
        std::fs::write(&source, vec![0u8; 10 * 3 * 3 * 4]).unwrap();

        let config = ConversionConfig::new(&source)
            .with_dimensions(VolumeDescriptor::new(10, 3, 3).unwrap())
            .with_divisor(4);
        let mut pipeline = StreamPipeline::new(config);
        assert_eq!(pipeline.state(), PipelineState::Init);

        let plan = pipeline.prepare().await.unwrap();
        assert_eq!(plan.sample_type, SampleType::F32);
        assert_eq!(plan.fractions.sizes(), &[2, 2, 2, 2, 2]);
        assert_eq!(plan.slice_bytes(), 36);
        assert_eq!(plan.max_bunch_bytes(), 72);
        assert_eq!(pipeline.state(), PipelineState::Planning);

        // nothing is written until run
        assert!(!dir.path().join("scan.vdc").exists());
        assert!(!dir.path().join("scan_8b_tiffs").exists());
    }

    #[tokio::test]
    async fn test_failed_prepare_sets_state() {
        let dir = TempDir::new().unwrap();
        let config = ConversionConfig::new(dir.path().join("missing.raw"))
            .with_dimensions(VolumeDescriptor::new(1, 1, 1).unwrap());
        let mut pipeline = StreamPipeline::new(config);

        assert!(matches!(
            pipeline.prepare().await,
            Err(VolConvError::InputNotFound(_))
        ));
        assert_eq!(pipeline.state(), PipelineState::Failed);
        assert!(pipeline.run(&NoProgress).await.is_err());
    }

    #[tokio::test]
    async fn test_run_twice_rejected() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("tiny.raw");
        std::fs::write(&source, [1u8, 2, 3, 4]).unwrap();

        let config = ConversionConfig::new(&source)
            .with_dimensions(VolumeDescriptor::new(4, 1, 1).unwrap())
            .with_previews(false);
        let mut pipeline = StreamPipeline::new(config);
        pipeline.run(&NoProgress).await.unwrap();
        assert_eq!(pipeline.state(), PipelineState::Done);
        assert!(matches!(
            pipeline.run(&NoProgress).await,
            Err(VolConvError::InvalidConfiguration(_))
        ));
    }
}
