use std::fmt;

use crate::error::{PipelineError, Result};

/// Immutable NCHW tensor shape.
///
/// Used both for sizing the fixed input/output buffers (at the configured
/// maximum) and for describing the actual per-call shape handed to the
/// execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeDescriptor {
    num: usize,
    channels: usize,
    height: usize,
    width: usize,
}

impl ShapeDescriptor {
    pub fn new(num: usize, channels: usize, height: usize, width: usize) -> Result<Self> {
        if num == 0 || channels == 0 || height == 0 || width == 0 {
            return Err(PipelineError::InvalidShape {
                num,
                channels,
                height,
                width,
            });
        }
        Ok(Self {
            num,
            channels,
            height,
            width,
        })
    }

    pub fn num(&self) -> usize {
        self.num
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Total element count.
    pub fn count(&self) -> usize {
        self.num * self.channels * self.height * self.width
    }

    /// Same batch/height/width with a different channel count. Used to
    /// derive the output shape (channels = segmentation classes) from an
    /// input shape.
    pub fn with_channels(&self, channels: usize) -> Result<Self> {
        Self::new(self.num, channels, self.height, self.width)
    }
}

impl fmt::Display for ShapeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}x{}x{}",
            self.num, self.channels, self.height, self.width
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_multiplies_all_dimensions() {
        let shape = ShapeDescriptor::new(1, 3, 640, 640).unwrap();
        assert_eq!(shape.count(), 3 * 640 * 640);
    }

    #[test]
    fn zero_dimension_is_rejected() {
        for dims in [(0, 3, 640, 640), (1, 0, 640, 640), (1, 3, 0, 640), (1, 3, 640, 0)] {
            let err = ShapeDescriptor::new(dims.0, dims.1, dims.2, dims.3).unwrap_err();
            assert!(matches!(err, PipelineError::InvalidShape { .. }));
            assert!(err.is_startup());
        }
    }

    #[test]
    fn with_channels_keeps_spatial_dims() {
        let input = ShapeDescriptor::new(1, 3, 480, 640).unwrap();
        let output = input.with_channels(19).unwrap();
        assert_eq!(output.channels(), 19);
        assert_eq!(output.height(), 480);
        assert_eq!(output.width(), 640);
        assert_eq!(output.count(), 19 * 480 * 640);
    }

    #[test]
    fn display_is_nchw() {
        let shape = ShapeDescriptor::new(1, 19, 448, 640).unwrap();
        assert_eq!(shape.to_string(), "1x19x448x640");
    }
}
