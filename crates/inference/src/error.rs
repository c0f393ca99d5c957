use std::path::PathBuf;
use thiserror::Error;

/// Pipeline failure taxonomy.
///
/// Startup variants mean the pipeline could not be constructed and the
/// embedding program should treat the instance as unusable; per-call
/// variants surface from `infer` and leave recovery to the caller
/// (rebuild the instance, there is no partial-result contract).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("model description not found at {path:?}")]
    ModelMissing { path: PathBuf },

    #[error("failed to read model description {path:?}")]
    ModelRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("engine build failed")]
    Build(#[source] anyhow::Error),

    #[error("failed to load engine artifact from {path:?}")]
    ArtifactLoad {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to persist engine artifact to {path:?}")]
    ArtifactPersist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("device allocation failed")]
    Allocation(#[source] anyhow::Error),

    #[error("invalid tensor shape {num}x{channels}x{height}x{width}: all dimensions must be non-zero")]
    InvalidShape {
        num: usize,
        channels: usize,
        height: usize,
        width: usize,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("preprocessing failed")]
    Preprocess(#[source] anyhow::Error),

    #[error("host/device transfer failed")]
    Transfer(#[source] anyhow::Error),

    #[error("device execution failed")]
    Execution(#[source] anyhow::Error),
}

impl PipelineError {
    /// True for failures that can only happen while constructing a
    /// pipeline instance.
    pub fn is_startup(&self) -> bool {
        matches!(
            self,
            PipelineError::ModelMissing { .. }
                | PipelineError::ModelRead { .. }
                | PipelineError::Build(_)
                | PipelineError::ArtifactLoad { .. }
                | PipelineError::ArtifactPersist { .. }
                | PipelineError::Allocation(_)
                | PipelineError::InvalidShape { .. }
                | PipelineError::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_and_per_call_variants_are_distinguished() {
        let startup = PipelineError::ModelMissing {
            path: "/tmp/model.onnx".into(),
        };
        assert!(startup.is_startup());

        let per_call = PipelineError::Execution(anyhow::anyhow!("enqueue failed"));
        assert!(!per_call.is_startup());
    }
}
