use std::path::PathBuf;
use std::str::FromStr;

use common::Environment;
use preprocess::{DEFAULT_STRIDE, IMAGENET_MEAN, IMAGENET_STD};

use crate::error::{PipelineError, Result};
use crate::postprocessing::ReductionStrategy;
use crate::shape::ShapeDescriptor;

/// Everything a pipeline instance needs to start, resolved once from the
/// environment.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub environment: Environment,
    pub device_index: u32,
    pub model_path: PathBuf,
    pub cache_path: PathBuf,
    pub reduced_precision: bool,
    /// Maximum input shape; the optimization profile and the fixed
    /// buffers are both sized from it.
    pub max_shape: ShapeDescriptor,
    pub num_classes: usize,
    pub mean: [f32; 3],
    pub std: [f32; 3],
    pub stride: u32,
    pub reduction: ReductionStrategy,
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self> {
        let width: usize = env_parse("INPUT_WIDTH", 640)?;
        let height: usize = env_parse("INPUT_HEIGHT", 640)?;

        let stride: u32 = env_parse("STRIDE", DEFAULT_STRIDE)?;
        if stride == 0 {
            return Err(PipelineError::Config("STRIDE must be non-zero".into()));
        }

        Ok(Self {
            environment: Environment::from_env(),
            device_index: env_parse("DEVICE_INDEX", 0)?,
            model_path: std::env::var("MODEL_PATH")
                .map(PathBuf::from)
                .map_err(|_| PipelineError::Config("MODEL_PATH is not set".into()))?,
            cache_path: std::env::var("ENGINE_CACHE_PATH")
                .map(PathBuf::from)
                .map_err(|_| PipelineError::Config("ENGINE_CACHE_PATH is not set".into()))?,
            reduced_precision: env_parse("REDUCED_PRECISION", false)?,
            max_shape: ShapeDescriptor::new(1, 3, height, width)?,
            num_classes: env_parse("NUM_CLASSES", 19)?,
            mean: env_triple("NORM_MEAN", IMAGENET_MEAN)?,
            std: env_triple("NORM_STD", IMAGENET_STD)?,
            stride,
            reduction: env_parse("REDUCTION_STRATEGY", ReductionStrategy::default())?,
        })
    }
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| PipelineError::Config(format!("invalid {key}={raw:?}: {e}"))),
        Err(_) => Ok(default),
    }
}

/// Parse a comma-separated float triple, e.g. `NORM_MEAN=0.485,0.456,0.406`.
fn env_triple(key: &str, default: [f32; 3]) -> Result<[f32; 3]> {
    let Ok(raw) = std::env::var(key) else {
        return Ok(default);
    };
    let parts: Vec<f32> = raw
        .split(',')
        .map(|part| {
            part.trim()
                .parse()
                .map_err(|e| PipelineError::Config(format!("invalid {key}={raw:?}: {e}")))
        })
        .collect::<Result<_>>()?;
    match parts.as_slice() {
        [r, g, b] => Ok([*r, *g, *b]),
        _ => Err(PipelineError::Config(format!(
            "invalid {key}={raw:?}: expected three comma-separated values"
        ))),
    }
}
