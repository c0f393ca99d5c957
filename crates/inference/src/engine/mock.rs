//! Deterministic in-process engine used by tests and development builds.
//!
//! "Device" memory is heap-backed behind handle ids, builds are counted so
//! cache behavior can be asserted, and execution runs a fixed per-pixel
//! class function of the input tensor so outputs are predictable.

use std::collections::HashMap;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use anyhow::{Context, ensure};
use ndarray::{ArrayView3, ArrayViewMut3};

use super::{
    BindingList, BuildOptions, DeviceBuffer, ExecutionContext, ExecutionEngine, HostMemory,
    OptimizationProfile, Stream,
};
use crate::postprocessing;
use crate::shape::ShapeDescriptor;

const ARTIFACT_MAGIC: &[u8; 8] = b"MOCKSEG1";

#[derive(Default)]
struct DeviceMemory {
    next_handle: u64,
    allocations: HashMap<u64, Vec<f32>>,
}

impl DeviceMemory {
    fn fresh_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

struct PinnedAllocation(Vec<f32>);

impl HostMemory for PinnedAllocation {
    fn as_slice(&self) -> &[f32] {
        &self.0
    }

    fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.0
    }
}

/// In-process mock of the vendor engine capability.
///
/// Clones share device memory and the build/execution counters, so a test
/// can keep a handle to the engine it moved into a pipeline.
#[derive(Clone)]
pub struct MockEngine {
    device_index: u32,
    num_classes: usize,
    memory: Arc<Mutex<DeviceMemory>>,
    build_calls: Arc<AtomicUsize>,
    exec_calls: Arc<AtomicUsize>,
}

impl MockEngine {
    pub fn new(device_index: u32, num_classes: usize) -> Self {
        Self {
            device_index,
            num_classes,
            memory: Arc::default(),
            build_calls: Arc::default(),
            exec_calls: Arc::default(),
        }
    }

    pub fn device_index(&self) -> u32 {
        self.device_index
    }

    /// How many times `build` ran. Stays at the old value when a cached
    /// artifact was loaded instead.
    pub fn build_count(&self) -> usize {
        self.build_calls.load(Ordering::SeqCst)
    }

    /// How many executions were enqueued across all contexts.
    pub fn execution_count(&self) -> usize {
        self.exec_calls.load(Ordering::SeqCst)
    }

    /// The per-pixel class function the mock graph computes: the channel-0
    /// activation, clamped to [-3, 3], quantized over the class range.
    pub fn class_for(value: f32, num_classes: usize) -> u8 {
        let clamped = value.clamp(-3.0, 3.0);
        (((clamped + 3.0) / 6.0) * (num_classes.saturating_sub(1)) as f32).round() as u8
    }

    fn lock_memory(&self) -> anyhow::Result<std::sync::MutexGuard<'_, DeviceMemory>> {
        self.memory
            .lock()
            .map_err(|_| anyhow::anyhow!("mock device memory lock poisoned"))
    }
}

impl ExecutionEngine for MockEngine {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn supports_reduced_precision(&self) -> bool {
        true
    }

    fn build(
        &self,
        model: &[u8],
        profile: &OptimizationProfile,
        options: &BuildOptions,
    ) -> anyhow::Result<Vec<u8>> {
        ensure!(!model.is_empty(), "empty model description");
        ensure!(
            profile.min.channels() == profile.max.channels(),
            "profile channel counts must agree"
        );
        self.build_calls.fetch_add(1, Ordering::SeqCst);

        tracing::debug!(
            max_shape = %profile.max,
            reduced_precision = options.reduced_precision,
            "mock engine build"
        );

        let mut artifact = Vec::with_capacity(ARTIFACT_MAGIC.len() + 13 + model.len());
        artifact.extend_from_slice(ARTIFACT_MAGIC);
        artifact.extend_from_slice(&(self.num_classes as u32).to_le_bytes());
        artifact.push(options.reduced_precision as u8);
        artifact.extend_from_slice(&(model.len() as u64).to_le_bytes());
        artifact.extend_from_slice(model);
        Ok(artifact)
    }

    fn load(&self, artifact: &[u8]) -> anyhow::Result<Box<dyn ExecutionContext>> {
        ensure!(
            artifact.len() > ARTIFACT_MAGIC.len() + 13,
            "artifact truncated"
        );
        ensure!(
            &artifact[..ARTIFACT_MAGIC.len()] == ARTIFACT_MAGIC,
            "bad artifact magic"
        );
        let num_classes = u32::from_le_bytes(
            artifact[8..12]
                .try_into()
                .context("artifact header truncated")?,
        ) as usize;
        ensure!(num_classes > 0, "artifact declares zero classes");

        Ok(Box::new(MockContext {
            num_classes,
            memory: Arc::clone(&self.memory),
            exec_calls: Arc::clone(&self.exec_calls),
            input_shape: None,
        }))
    }

    fn alloc_host(&self, len: usize) -> anyhow::Result<Box<dyn HostMemory>> {
        Ok(Box::new(PinnedAllocation(vec![0.0; len])))
    }

    fn alloc_device(&self, len: usize) -> anyhow::Result<DeviceBuffer> {
        let mut memory = self.lock_memory()?;
        let handle = memory.fresh_handle();
        memory.allocations.insert(handle, vec![0.0; len]);
        Ok(DeviceBuffer { ptr: handle, len })
    }

    fn free_device(&self, buffer: DeviceBuffer) {
        if let Ok(mut memory) = self.memory.lock() {
            memory.allocations.remove(&buffer.ptr);
        }
    }

    fn create_stream(&self) -> anyhow::Result<Stream> {
        let mut memory = self.lock_memory()?;
        Ok(Stream(memory.fresh_handle()))
    }

    fn destroy_stream(&self, _stream: Stream) {}

    fn synchronize(&self, _stream: Stream) -> anyhow::Result<()> {
        // Execution is synchronous in the mock; nothing to wait for.
        Ok(())
    }

    fn copy_to_device(&self, src: &[f32], dst: DeviceBuffer, len: usize) -> anyhow::Result<()> {
        ensure!(len <= src.len(), "source slice shorter than copy length");
        let mut memory = self.lock_memory()?;
        let allocation = memory
            .allocations
            .get_mut(&dst.ptr)
            .context("invalid device pointer")?;
        ensure!(len <= allocation.len(), "device allocation overrun");
        allocation[..len].copy_from_slice(&src[..len]);
        Ok(())
    }

    fn copy_to_host(&self, src: DeviceBuffer, dst: &mut [f32], len: usize) -> anyhow::Result<()> {
        ensure!(len <= dst.len(), "destination slice shorter than copy length");
        let memory = self.lock_memory()?;
        let allocation = memory
            .allocations
            .get(&src.ptr)
            .context("invalid device pointer")?;
        ensure!(len <= allocation.len(), "device allocation overrun");
        dst[..len].copy_from_slice(&allocation[..len]);
        Ok(())
    }

    fn argmax_channels(
        &self,
        src: DeviceBuffer,
        shape: &ShapeDescriptor,
        dst: &mut [u8],
    ) -> anyhow::Result<()> {
        let memory = self.lock_memory()?;
        let allocation = memory
            .allocations
            .get(&src.ptr)
            .context("invalid device pointer")?;
        ensure!(shape.count() <= allocation.len(), "device allocation overrun");
        postprocessing::argmax_channels_into(&allocation[..shape.count()], shape, dst)
    }
}

struct MockContext {
    num_classes: usize,
    memory: Arc<Mutex<DeviceMemory>>,
    exec_calls: Arc<AtomicUsize>,
    input_shape: Option<ShapeDescriptor>,
}

impl ExecutionContext for MockContext {
    fn set_input_shape(&mut self, shape: &ShapeDescriptor) -> anyhow::Result<()> {
        ensure!(shape.num() == 1, "mock graph only supports batch size 1");
        self.input_shape = Some(*shape);
        Ok(())
    }

    fn enqueue(&mut self, bindings: &BindingList, _stream: Stream) -> anyhow::Result<()> {
        let shape = self
            .input_shape
            .context("input shape not set before enqueue")?;
        self.exec_calls.fetch_add(1, Ordering::SeqCst);

        let mut memory = self
            .memory
            .lock()
            .map_err(|_| anyhow::anyhow!("mock device memory lock poisoned"))?;

        let input = memory
            .allocations
            .get(&bindings.input())
            .context("input binding is not a live device allocation")?;
        ensure!(shape.count() <= input.len(), "input allocation overrun");
        let input = input[..shape.count()].to_vec();

        let out_count = self.num_classes * shape.height() * shape.width();
        let output = memory
            .allocations
            .get_mut(&bindings.output())
            .context("output binding is not a live device allocation")?;
        ensure!(out_count <= output.len(), "output allocation overrun");

        forward(&input, &mut output[..out_count], &shape, self.num_classes)
    }
}

/// One-hot logits: class = `MockEngine::class_for` of the channel-0
/// activation at each pixel.
fn forward(
    input: &[f32],
    output: &mut [f32],
    shape: &ShapeDescriptor,
    num_classes: usize,
) -> anyhow::Result<()> {
    let (h, w) = (shape.height(), shape.width());
    let x = ArrayView3::from_shape((shape.channels(), h, w), input)?;
    let mut y = ArrayViewMut3::from_shape((num_classes, h, w), output)?;
    y.fill(0.0);

    for row in 0..h {
        for col in 0..w {
            let class = MockEngine::class_for(x[[0, row, col]], num_classes) as usize;
            y[[class, row, col]] = 1.0;
        }
    }
    Ok(())
}
