//! The segmentation pipeline itself: preprocessing, transfer, execution,
//! and class reduction behind a single blocking call.

use image::{GrayImage, RgbImage};

use preprocess::TransformPipeline;

use crate::buffers::IoBuffers;
use crate::config::PipelineConfig;
use crate::engine::{ExecutionContext, ExecutionEngine, Stream};
use crate::error::{PipelineError, Result};
use crate::postprocessing::{self, ReductionStrategy};
use crate::shape::ShapeDescriptor;

/// Single-channel class map, one class index per pixel of the padded
/// network input.
pub type SegmentationMask = GrayImage;

/// One inference instance: a loaded graph, its fixed transfer buffers, and
/// an execution stream.
///
/// `infer` takes `&mut self`, so a shared instance cannot run concurrent
/// calls; embedders that want parallelism construct one pipeline per
/// worker.
pub struct SegmentationPipeline<E: ExecutionEngine> {
    engine: E,
    context: Box<dyn ExecutionContext>,
    buffers: IoBuffers,
    stream: Stream,
    transforms: TransformPipeline,
    config: PipelineConfig,
}

impl<E: ExecutionEngine> std::fmt::Debug for SegmentationPipeline<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentationPipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutionEngine> SegmentationPipeline<E> {
    pub fn new(engine: E, config: PipelineConfig) -> Result<Self> {
        tracing::info!(
            engine = engine.name(),
            device_index = config.device_index,
            model = %config.model_path.display(),
            "starting segmentation pipeline"
        );

        let context = crate::lifecycle::load_or_build(&engine, &config)?;
        let mut buffers = IoBuffers::allocate(&engine, &config.max_shape, config.num_classes)?;
        let stream = match engine.create_stream() {
            Ok(stream) => stream,
            Err(source) => {
                buffers.release(&engine);
                return Err(PipelineError::Allocation(source));
            }
        };

        let target = (
            config.max_shape.width() as u32,
            config.max_shape.height() as u32,
        );
        let transforms = TransformPipeline::new(target, config.stride, config.mean, config.std);

        Ok(Self {
            engine,
            context,
            buffers,
            stream,
            transforms,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Segment one RGB frame. Blocks until the device work is complete and
    /// returns the class map at the padded input resolution.
    ///
    /// An empty frame (either dimension zero) short-circuits to an empty
    /// mask without touching the transform chain or the device.
    pub fn infer(&mut self, image: &RgbImage) -> Result<SegmentationMask> {
        if image.width() == 0 || image.height() == 0 {
            tracing::debug!("empty frame, skipping inference");
            return Ok(GrayImage::new(image.width(), image.height()));
        }

        let span = tracing::info_span!("infer", width = image.width(), height = image.height());
        let _guard = span.enter();

        let info = self
            .transforms
            .apply(
                image.as_raw(),
                image.width(),
                image.height(),
                self.buffers.input_host_mut(),
            )
            .map_err(PipelineError::Preprocess)?;

        let input_shape = ShapeDescriptor::new(1, 3, info.height as usize, info.width as usize)?;
        let output_shape = input_shape.with_channels(self.config.num_classes)?;

        self.engine
            .copy_to_device(
                self.buffers.input_host(),
                self.buffers.input_device(),
                input_shape.count(),
            )
            .map_err(PipelineError::Transfer)?;

        self.context
            .set_input_shape(&input_shape)
            .map_err(PipelineError::Execution)?;
        self.context
            .enqueue(self.buffers.bindings(), self.stream)
            .map_err(PipelineError::Execution)?;
        self.engine
            .synchronize(self.stream)
            .map_err(PipelineError::Execution)?;

        let mut data = vec![0u8; (info.width * info.height) as usize];
        match self.config.reduction {
            ReductionStrategy::Device => {
                self.engine
                    .argmax_channels(self.buffers.output_device(), &output_shape, &mut data)
                    .map_err(PipelineError::Execution)?;
            }
            ReductionStrategy::Host => {
                let count = output_shape.count();
                self.engine
                    .copy_to_host(
                        self.buffers.output_device(),
                        self.buffers.output_host_mut(),
                        count,
                    )
                    .map_err(PipelineError::Transfer)?;
                postprocessing::argmax_channels_into(
                    &self.buffers.output_host()[..count],
                    &output_shape,
                    &mut data,
                )
                .map_err(PipelineError::Execution)?;
            }
        }

        GrayImage::from_raw(info.width, info.height, data).ok_or_else(|| {
            PipelineError::Execution(anyhow::anyhow!("class map does not match padded shape"))
        })
    }
}

impl<E: ExecutionEngine> Drop for SegmentationPipeline<E> {
    fn drop(&mut self) {
        if let Err(source) = self.engine.synchronize(self.stream) {
            tracing::warn!(error = %source, "stream did not drain cleanly on shutdown");
        }
        self.buffers.release(&self.engine);
        self.engine.destroy_stream(self.stream);
    }
}
