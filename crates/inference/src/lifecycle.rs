//! Compiled-graph lifecycle: load a cached artifact when it still matches
//! the model and build configuration, otherwise build, persist, and load.
//!
//! Cache files carry a magic header and a fingerprint of everything that
//! influences the build (model bytes, engine, precision, shape profile). A
//! missing, corrupt, or mismatching cache is never an error; it just means
//! a rebuild.

use std::fs;
use std::hash::{Hash, Hasher};
use std::io;
use std::path::Path;

use crate::config::PipelineConfig;
use crate::engine::{BuildOptions, ExecutionContext, ExecutionEngine, OptimizationProfile};
use crate::error::{PipelineError, Result};
use crate::shape::ShapeDescriptor;

const CACHE_MAGIC: &[u8; 8] = b"SEGENG01";

/// Build or restore the execution context for `config`.
///
/// The model description is read on every startup, cache hit or not, so the
/// fingerprint always reflects the file on disk.
pub fn load_or_build(
    engine: &dyn ExecutionEngine,
    config: &PipelineConfig,
) -> Result<Box<dyn ExecutionContext>> {
    let model = fs::read(&config.model_path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            PipelineError::ModelMissing {
                path: config.model_path.clone(),
            }
        } else {
            PipelineError::ModelRead {
                path: config.model_path.clone(),
                source,
            }
        }
    })?;

    let profile = OptimizationProfile {
        min: ShapeDescriptor::new(1, config.max_shape.channels(), 1, 1)?,
        opt: config.max_shape,
        max: config.max_shape,
    };

    let reduced_precision = config.reduced_precision && engine.supports_reduced_precision();
    if config.reduced_precision && !reduced_precision {
        tracing::warn!(
            engine = engine.name(),
            "reduced precision requested but not supported, building at full precision"
        );
    }
    tracing::info!(
        engine = engine.name(),
        max_shape = %config.max_shape,
        reduced_precision,
        "preparing execution graph"
    );

    let expected = fingerprint(&model, engine.name(), reduced_precision, &profile);

    if let Some(artifact) = read_cached(&config.cache_path, expected) {
        match engine.load(&artifact) {
            Ok(context) => {
                tracing::info!(cache = %config.cache_path.display(), "loaded cached engine artifact");
                return Ok(context);
            }
            Err(source) => {
                // Treat an unloadable cached blob like any other corrupt
                // cache and fall through to a rebuild.
                tracing::warn!(
                    cache = %config.cache_path.display(),
                    error = %source,
                    "cached artifact failed to load, rebuilding"
                );
            }
        }
    }

    let options = BuildOptions {
        reduced_precision,
        ..BuildOptions::default()
    };
    let artifact = engine
        .build(&model, &profile, &options)
        .map_err(PipelineError::Build)?;

    persist(&config.cache_path, expected, &artifact).map_err(|source| {
        PipelineError::ArtifactPersist {
            path: config.cache_path.clone(),
            source,
        }
    })?;
    tracing::info!(cache = %config.cache_path.display(), "built and persisted engine artifact");

    engine
        .load(&artifact)
        .map_err(|source| PipelineError::ArtifactLoad {
            path: config.cache_path.clone(),
            source,
        })
}

fn fingerprint(
    model: &[u8],
    engine_name: &str,
    reduced_precision: bool,
    profile: &OptimizationProfile,
) -> u64 {
    let mut hasher = std::hash::DefaultHasher::new();
    model.hash(&mut hasher);
    engine_name.hash(&mut hasher);
    reduced_precision.hash(&mut hasher);
    for shape in [&profile.min, &profile.opt, &profile.max] {
        shape.hash(&mut hasher);
    }
    hasher.finish()
}

fn read_cached(path: &Path, expected: u64) -> Option<Vec<u8>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(source) => {
            if source.kind() != io::ErrorKind::NotFound {
                tracing::warn!(cache = %path.display(), error = %source, "cache unreadable");
            }
            return None;
        }
    };

    if bytes.len() < CACHE_MAGIC.len() + 8 || &bytes[..CACHE_MAGIC.len()] != CACHE_MAGIC {
        tracing::warn!(cache = %path.display(), "cache header corrupt, rebuilding");
        return None;
    }
    let stored = u64::from_le_bytes(bytes[8..16].try_into().ok()?);
    if stored != expected {
        tracing::info!(cache = %path.display(), "cache fingerprint stale, rebuilding");
        return None;
    }
    Some(bytes[16..].to_vec())
}

fn persist(path: &Path, fingerprint: u64, artifact: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut bytes = Vec::with_capacity(16 + artifact.len());
    bytes.extend_from_slice(CACHE_MAGIC);
    bytes.extend_from_slice(&fingerprint.to_le_bytes());
    bytes.extend_from_slice(artifact);
    fs::write(path, bytes)
}
