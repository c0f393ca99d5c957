//! Image-to-tensor preprocessing for the segmentation pipeline.
//!
//! The canonical transform chain is letterbox resize, intensity scale to
//! [0, 1], then per-channel normalization. The float output is written
//! planar (CHW) straight into the caller's pinned host buffer so the hot
//! path never touches an intermediate float image.

pub mod letterbox;
pub mod normalize;

pub use letterbox::{Letterbox, LetterboxInfo};
pub use normalize::{IntensityScale, Normalize};

pub const DEFAULT_TARGET_SIZE: (u32, u32) = (640, 640);
pub const DEFAULT_STRIDE: u32 = 32;
pub const LETTERBOX_FILL: u8 = 114;
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Shape and placement of one preprocessed frame.
///
/// `width`/`height` are the padded dimensions actually produced, which vary
/// per call (stride-rounded, at most the target canvas).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformInfo {
    pub width: u32,
    pub height: u32,
    pub scale: f32,
    pub pad_x: u32,
    pub pad_y: u32,
}

/// The composed preprocessing chain. Scratch buffers are owned here and
/// reused across calls.
pub struct TransformPipeline {
    letterbox: Letterbox,
    normalize: Normalize,
    letterboxed: Vec<u8>,
}

impl TransformPipeline {
    pub fn new(target: (u32, u32), stride: u32, mean: [f32; 3], std: [f32; 3]) -> Self {
        Self {
            letterbox: Letterbox::new(target, stride, LETTERBOX_FILL),
            normalize: Normalize::new(mean, std),
            letterboxed: Vec::with_capacity((target.0 * target.1 * 3) as usize),
        }
    }

    pub fn target_size(&self) -> (u32, u32) {
        self.letterbox.target()
    }

    /// Run the full chain on an RGB frame, writing the planar f32 tensor
    /// into `out`. Returns the padded shape used for this frame.
    ///
    /// `out` must hold at least `3 * padded_width * padded_height` floats;
    /// the caller sizes it at the maximum shape.
    pub fn apply(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        out: &mut [f32],
    ) -> anyhow::Result<TransformInfo> {
        let expected = width as usize * height as usize * 3;
        if pixels.len() != expected {
            anyhow::bail!(
                "buffer size mismatch: expected {} bytes for {}x{} RGB, got {}",
                expected,
                width,
                height,
                pixels.len()
            );
        }

        let info = self
            .letterbox
            .apply(pixels, width, height, &mut self.letterboxed)?;

        tracing::trace!(
            width,
            height,
            padded_width = info.width,
            padded_height = info.height,
            scale = info.scale,
            "letterboxed frame"
        );

        let count = info.width as usize * info.height as usize * 3;
        if out.len() < count {
            anyhow::bail!(
                "host buffer too small: need {} floats, have {}",
                count,
                out.len()
            );
        }

        self.normalize
            .write_planar(&self.letterboxed, info.width, info.height, &mut out[..count])?;

        Ok(TransformInfo {
            width: info.width,
            height: info.height,
            scale: info.scale,
            pad_x: info.pad_x,
            pad_y: info.pad_y,
        })
    }
}
