//! Fixed input/output transfer buffers.
//!
//! Both tensors get a pinned host staging area and a device allocation
//! sized for the maximum profile shape, allocated once at startup. Per-call
//! shapes only ever use a prefix of each buffer, so no allocation happens
//! on the inference path.

use crate::engine::{BindingList, DeviceBuffer, ExecutionEngine, HostMemory};
use crate::error::{PipelineError, Result};
use crate::shape::ShapeDescriptor;

/// Pinned host staging memory paired with its device counterpart.
pub struct BufferPair {
    host: Box<dyn HostMemory>,
    device: DeviceBuffer,
}

/// The two buffer pairs a pipeline instance owns, plus the position-indexed
/// binding list derived from them.
pub struct IoBuffers {
    input: BufferPair,
    output: BufferPair,
    bindings: BindingList,
    released: bool,
}

impl IoBuffers {
    /// Allocate input (`max_shape` elements) and output (`max_shape` with
    /// `num_classes` channels) pairs. Any device memory already claimed is
    /// freed again if a later allocation fails.
    pub fn allocate(
        engine: &dyn ExecutionEngine,
        max_shape: &ShapeDescriptor,
        num_classes: usize,
    ) -> Result<Self> {
        let input_len = max_shape.count();
        let output_len = max_shape.with_channels(num_classes)?.count();

        let input_host = engine.alloc_host(input_len).map_err(PipelineError::Allocation)?;
        let output_host = engine
            .alloc_host(output_len)
            .map_err(PipelineError::Allocation)?;

        let input_device = engine
            .alloc_device(input_len)
            .map_err(PipelineError::Allocation)?;
        let output_device = match engine.alloc_device(output_len) {
            Ok(buffer) => buffer,
            Err(source) => {
                engine.free_device(input_device);
                return Err(PipelineError::Allocation(source));
            }
        };

        tracing::debug!(
            input_elements = input_len,
            output_elements = output_len,
            "transfer buffers allocated"
        );

        Ok(Self {
            input: BufferPair {
                host: input_host,
                device: input_device,
            },
            output: BufferPair {
                host: output_host,
                device: output_device,
            },
            bindings: BindingList::new(input_device, output_device),
            released: false,
        })
    }

    pub fn input_host(&self) -> &[f32] {
        self.input.host.as_slice()
    }

    pub fn input_host_mut(&mut self) -> &mut [f32] {
        self.input.host.as_mut_slice()
    }

    pub fn output_host(&self) -> &[f32] {
        self.output.host.as_slice()
    }

    pub fn output_host_mut(&mut self) -> &mut [f32] {
        self.output.host.as_mut_slice()
    }

    pub fn input_device(&self) -> DeviceBuffer {
        self.input.device
    }

    pub fn output_device(&self) -> DeviceBuffer {
        self.output.device
    }

    pub fn bindings(&self) -> &BindingList {
        &self.bindings
    }

    pub fn input_len(&self) -> usize {
        self.input.device.len
    }

    pub fn output_len(&self) -> usize {
        self.output.device.len
    }

    /// Return the device allocations to the engine. Host memory is freed by
    /// its own drop. Safe to call more than once.
    pub fn release(&mut self, engine: &dyn ExecutionEngine) {
        if self.released {
            return;
        }
        engine.free_device(self.input.device);
        engine.free_device(self.output.device);
        self.released = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MockEngine;

    #[test]
    fn buffers_are_sized_for_the_maximum_shape() {
        let engine = MockEngine::new(0, 19);
        let max = ShapeDescriptor::new(1, 3, 640, 640).unwrap();
        let buffers = IoBuffers::allocate(&engine, &max, 19).unwrap();

        assert_eq!(buffers.input_len(), 3 * 640 * 640);
        assert_eq!(buffers.output_len(), 19 * 640 * 640);
        assert_eq!(buffers.input_host().len(), buffers.input_len());
        assert_eq!(buffers.output_host().len(), buffers.output_len());
    }

    #[test]
    fn bindings_follow_the_fixed_order() {
        let engine = MockEngine::new(0, 4);
        let max = ShapeDescriptor::new(1, 3, 64, 64).unwrap();
        let buffers = IoBuffers::allocate(&engine, &max, 4).unwrap();

        assert_eq!(buffers.bindings().input(), buffers.input_device().ptr);
        assert_eq!(buffers.bindings().output(), buffers.output_device().ptr);
        assert_eq!(buffers.bindings().as_slice().len(), 2);
    }

    #[test]
    fn release_frees_device_memory_once() {
        let engine = MockEngine::new(0, 4);
        let max = ShapeDescriptor::new(1, 3, 8, 8).unwrap();
        let mut buffers = IoBuffers::allocate(&engine, &max, 4).unwrap();
        let input = buffers.input_device();

        buffers.release(&engine);
        buffers.release(&engine);
        assert!(engine.copy_to_host(input, &mut [0.0; 4], 4).is_err());
    }
}
