use fast_image_resize::{
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};

/// Result of one letterbox pass.
///
/// `width`/`height` are the padded output dimensions (stride multiples);
/// `pad_x`/`pad_y` are the leading (left/top) pad in pixels. The trailing
/// edge absorbs the odd pixel when padding is asymmetric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxInfo {
    pub width: u32,
    pub height: u32,
    pub scale: f32,
    pub pad_x: u32,
    pub pad_y: u32,
}

/// Aspect-ratio-preserving resize with minimal stride-aligned padding.
///
/// The image is scaled to fit the target canvas, then each dimension is
/// padded up to the next stride multiple with the fill color. Output is
/// therefore at most the target size but usually smaller along one axis.
pub struct Letterbox {
    target: (u32, u32),
    stride: u32,
    fill: u8,
    resizer: Resizer,
    resized: Image<'static>,
}

impl Letterbox {
    pub fn new(target: (u32, u32), stride: u32, fill: u8) -> Self {
        Self {
            target,
            stride,
            fill,
            resizer: Resizer::new(),
            resized: Image::new(0, 0, PixelType::U8x3),
        }
    }

    pub fn target(&self) -> (u32, u32) {
        self.target
    }

    /// Letterbox `pixels` (RGB, HWC) into `out`, reusing its allocation.
    pub fn apply(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        out: &mut Vec<u8>,
    ) -> anyhow::Result<LetterboxInfo> {
        if width == 0 || height == 0 {
            anyhow::bail!("cannot letterbox a {}x{} image", width, height);
        }
        if self.stride == 0 {
            anyhow::bail!("stride must be non-zero");
        }

        let scale =
            (self.target.0 as f32 / width as f32).min(self.target.1 as f32 / height as f32);
        let new_width = ((width as f32 * scale).round() as u32).max(1);
        let new_height = ((height as f32 * scale).round() as u32).max(1);

        let padded_width = new_width.div_ceil(self.stride) * self.stride;
        let padded_height = new_height.div_ceil(self.stride) * self.stride;

        // Even split, extra pixel on the trailing edge.
        let pad_x = (padded_width - new_width) / 2;
        let pad_y = (padded_height - new_height) / 2;

        let src = ImageRef::new(width, height, pixels, PixelType::U8x3)?;
        if self.resized.width() != new_width || self.resized.height() != new_height {
            self.resized = Image::new(new_width, new_height, PixelType::U8x3);
        }
        self.resizer.resize(
            &src,
            &mut self.resized,
            &ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear)),
        )?;

        out.clear();
        out.resize((padded_width * padded_height * 3) as usize, self.fill);

        let resized_data = self.resized.buffer();
        let dst_stride = (padded_width * 3) as usize;
        let row_bytes = (new_width * 3) as usize;

        for y in 0..new_height {
            let src_row = (y * new_width * 3) as usize;
            let dst_row = (y + pad_y) as usize * dst_stride + (pad_x * 3) as usize;
            out[dst_row..dst_row + row_bytes]
                .copy_from_slice(&resized_data[src_row..src_row + row_bytes]);
        }

        Ok(LetterboxInfo {
            width: padded_width,
            height: padded_height,
            scale,
            pad_x,
            pad_y,
        })
    }
}
