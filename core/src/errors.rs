//! Error taxonomy of the classification pipeline.
//!
//! Startup failures (`ModelLoad`, `LabelMapLoad`, `Config`) must keep a `Classifier` from
//! entering service. Per-request failures (`Decode`, `UnsupportedMode`, `Inference`) are
//! reported to the caller for that request only. `LabelResolution` is detected per request but
//! means the model and the class index were not built for each other.

use std::path::PathBuf;

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T> = std::result::Result<T, ClassifyError>;

#[derive(Error, Debug)]
pub enum ClassifyError {
    /// The input could not be opened or decoded as a raster image.
    #[error("cannot decode image {origin}")]
    Decode {
        origin: String,
        #[source]
        source: image::ImageError,
    },

    /// The decoded image uses a color type that cannot be coerced to three channels.
    #[error("unsupported color mode {mode:?}: cannot coerce to 3 channels")]
    UnsupportedMode { mode: image::ColorType },

    #[error("cannot load model from {}", path.display())]
    ModelLoad {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("cannot load class index from {origin}")]
    LabelMapLoad {
        origin: String,
        #[source]
        source: BoxError,
    },

    #[error("forward pass failed")]
    Inference(#[source] BoxError),

    /// The arg-max index has no label. Model and class index disagree.
    #[error("model selected class {index} but the class index only knows {known} labels")]
    LabelResolution { index: usize, known: usize },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ClassifyError {
    pub(crate) fn model_load(path: impl Into<PathBuf>, source: impl Into<BoxError>) -> Self {
        ClassifyError::ModelLoad { path: path.into(), source: source.into() }
    }

    pub(crate) fn label_map_load(origin: impl ToString, source: impl Into<BoxError>) -> Self {
        ClassifyError::LabelMapLoad { origin: origin.to_string(), source: source.into() }
    }

    pub(crate) fn inference(source: impl Into<BoxError>) -> Self {
        ClassifyError::Inference(source.into())
    }

    /// Fatal errors denote a broken deployment (artifacts, configuration, or a model and class
    /// index that do not belong together). Callers should stop serving instead of reporting
    /// them for a single request.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ClassifyError::ModelLoad { .. }
                | ClassifyError::LabelMapLoad { .. }
                | ClassifyError::LabelResolution { .. }
                | ClassifyError::Config(_)
        )
    }
}
