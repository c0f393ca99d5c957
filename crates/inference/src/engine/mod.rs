//! Capability interface over the external graph compiler/runtime.
//!
//! The pipeline never talks to a concrete vendor API: it builds, loads and
//! executes through these traits, which also cover the device-side memory
//! operations an execution call needs (pinned host allocation, device
//! allocation, streams, copies, and the device argmax kernel). Engine-level
//! failures are opaque `anyhow` errors at this boundary; the pipeline maps
//! them into its structured taxonomy.

pub mod mock;

pub use mock::MockEngine;

use crate::shape::ShapeDescriptor;

/// Input-shape range the compiled graph must support.
#[derive(Debug, Clone, Copy)]
pub struct OptimizationProfile {
    pub min: ShapeDescriptor,
    pub opt: ShapeDescriptor,
    pub max: ShapeDescriptor,
}

/// Build-time knobs forwarded to the graph compiler.
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    /// Request FP16 (or similar) execution. Only honored when the engine
    /// reports support; the lifecycle manager downgrades it otherwise.
    pub reduced_precision: bool,
    /// Scratch memory budget for the builder.
    pub workspace_bytes: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            reduced_precision: false,
            workspace_bytes: 1 << 30,
        }
    }
}

/// Handle to a device allocation. `ptr` is the raw device address (or an
/// engine-defined handle id); `len` is the element capacity in f32.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceBuffer {
    pub ptr: u64,
    pub len: usize,
}

/// Handle to an execution stream owned by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stream(pub u64);

/// Position-indexed device pointers for one execution call.
///
/// The order is fixed for the life of the pipeline: index 0 is the input
/// tensor, index 1 the output tensor.
#[derive(Debug, Clone)]
pub struct BindingList {
    ptrs: Vec<u64>,
}

impl BindingList {
    pub fn new(input: DeviceBuffer, output: DeviceBuffer) -> Self {
        Self {
            ptrs: vec![input.ptr, output.ptr],
        }
    }

    pub fn input(&self) -> u64 {
        self.ptrs[0]
    }

    pub fn output(&self) -> u64 {
        self.ptrs[1]
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.ptrs
    }
}

/// Pinned host allocation handed out by an engine. Freed on drop.
pub trait HostMemory: Send {
    fn as_slice(&self) -> &[f32];
    fn as_mut_slice(&mut self) -> &mut [f32];

    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

/// A loaded, ready-to-run compiled graph.
pub trait ExecutionContext: Send {
    /// Declare the actual input shape for the next execution. The compiled
    /// graph supports a shape range, so this must be set before every
    /// launch whose shape differs from the previous call.
    fn set_input_shape(&mut self, shape: &ShapeDescriptor) -> anyhow::Result<()>;

    /// Launch asynchronously on `stream` against the bound tensors.
    /// Completion is observed via `ExecutionEngine::synchronize`.
    fn enqueue(&mut self, bindings: &BindingList, stream: Stream) -> anyhow::Result<()>;
}

/// The full engine capability: graph compilation, artifact loading, and the
/// device-side plumbing one pipeline instance needs.
pub trait ExecutionEngine: Send {
    fn name(&self) -> &'static str;

    /// Whether the target device can honor a reduced-precision request.
    fn supports_reduced_precision(&self) -> bool;

    /// Compile a portable model description into an opaque serialized
    /// artifact, optimized for the given shape range.
    fn build(
        &self,
        model: &[u8],
        profile: &OptimizationProfile,
        options: &BuildOptions,
    ) -> anyhow::Result<Vec<u8>>;

    /// Deserialize a previously built artifact into an execution context.
    fn load(&self, artifact: &[u8]) -> anyhow::Result<Box<dyn ExecutionContext>>;

    fn alloc_host(&self, len: usize) -> anyhow::Result<Box<dyn HostMemory>>;

    fn alloc_device(&self, len: usize) -> anyhow::Result<DeviceBuffer>;

    /// Free a device allocation. Unknown or already-freed handles are a
    /// no-op.
    fn free_device(&self, buffer: DeviceBuffer);

    fn create_stream(&self) -> anyhow::Result<Stream>;

    fn destroy_stream(&self, stream: Stream);

    /// Block until all work queued on `stream` has completed.
    fn synchronize(&self, stream: Stream) -> anyhow::Result<()>;

    fn copy_to_device(&self, src: &[f32], dst: DeviceBuffer, len: usize) -> anyhow::Result<()>;

    fn copy_to_host(&self, src: DeviceBuffer, dst: &mut [f32], len: usize) -> anyhow::Result<()>;

    /// Device-side class reduction: per spatial position, write the index
    /// of the maximum channel of `src` (shaped `shape`) into `dst` as one
    /// byte per pixel.
    fn argmax_channels(
        &self,
        src: DeviceBuffer,
        shape: &ShapeDescriptor,
        dst: &mut [u8],
    ) -> anyhow::Result<()>;
}
