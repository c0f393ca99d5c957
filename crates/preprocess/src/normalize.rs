/// Intensity scaling, mapping [0, 255] byte values into [0, 1].
#[derive(Debug, Clone, Copy)]
pub struct IntensityScale {
    divisor: f32,
}

impl IntensityScale {
    pub fn new(divisor: f32) -> Self {
        Self { divisor }
    }

    #[inline]
    pub fn apply(&self, value: u8) -> f32 {
        value as f32 / self.divisor
    }
}

impl Default for IntensityScale {
    fn default() -> Self {
        Self::new(255.0)
    }
}

/// Per-channel mean/std normalization, fused with the intensity scale and
/// the HWC -> CHW transpose so the planar tensor is produced in one pass.
#[derive(Debug, Clone, Copy)]
pub struct Normalize {
    mean: [f32; 3],
    std: [f32; 3],
    scale: IntensityScale,
}

impl Normalize {
    pub fn new(mean: [f32; 3], std: [f32; 3]) -> Self {
        Self {
            mean,
            std,
            scale: IntensityScale::default(),
        }
    }

    /// Write `(v/255 - mean) / std` for each channel of an interleaved RGB
    /// buffer into `out` as three contiguous planes.
    pub fn write_planar(
        &self,
        rgb: &[u8],
        width: u32,
        height: u32,
        out: &mut [f32],
    ) -> anyhow::Result<()> {
        let spatial = width as usize * height as usize;
        if rgb.len() != spatial * 3 {
            anyhow::bail!(
                "rgb buffer size mismatch: expected {} bytes, got {}",
                spatial * 3,
                rgb.len()
            );
        }
        if out.len() < spatial * 3 {
            anyhow::bail!(
                "output buffer too small: need {} floats, have {}",
                spatial * 3,
                out.len()
            );
        }

        for (i, px) in rgb.chunks_exact(3).enumerate() {
            let r = self.scale.apply(px[0]);
            let g = self.scale.apply(px[1]);
            let b = self.scale.apply(px[2]);

            out[i] = (r - self.mean[0]) / self.std[0];
            out[i + spatial] = (g - self.mean[1]) / self.std[1];
            out[i + 2 * spatial] = (b - self.mean[2]) / self.std[2];
        }

        Ok(())
    }
}
