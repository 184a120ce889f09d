//! Model backends producing one score per class.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, bail, ensure};
use serde::Deserialize;
use tract_core::internal::DimLike;
use tract_core::prelude::*;

use crate::errors::{ClassifyError, Result};
use crate::preprocess::TargetSize;

/// A forward pass from an input tensor to per-class scores.
///
/// Implementations are immutable once built: `scores` takes `&self` and the same input must
/// always produce the same scores.
pub trait ScoreModel: fmt::Debug + Send + Sync {
    /// Number of classes, when it is known before running the model.
    fn output_classes(&self) -> Option<usize>;

    fn scores(&self, input: Tensor) -> TractResult<Vec<f32>>;
}

/// Serialization of a model artifact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    Onnx,
    Nnef,
    Tf,
}

impl ModelFormat {
    /// Guess the format from the artifact path, the same way the tract command line does.
    pub fn guess(path: &Path) -> Result<ModelFormat> {
        let name = path.to_string_lossy();
        let extension = path.extension().map(|e| e.to_string_lossy().to_ascii_lowercase());
        match extension.as_deref() {
            Some("onnx") => Ok(ModelFormat::Onnx),
            Some("pb") => Ok(ModelFormat::Tf),
            Some("nnef") | Some("tar") | Some("tgz") => Ok(ModelFormat::Nnef),
            Some("gz") if name.ends_with(".tar.gz") => Ok(ModelFormat::Nnef),
            Some("h5") | Some("keras") => Err(ClassifyError::model_load(
                path,
                "Keras archives can not be loaded directly, export the model to ONNX \
                 (tf2onnx) or to a frozen TensorFlow graph first",
            )),
            _ if path.is_dir() => Ok(ModelFormat::Nnef),
            _ => Err(ClassifyError::model_load(
                path,
                "can not guess the model format from the path, \
                 use .onnx, .pb, .nnef, .tgz or a directory",
            )),
        }
    }
}

impl FromStr for ModelFormat {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<ModelFormat, String> {
        match &*s.to_ascii_lowercase() {
            "onnx" => Ok(ModelFormat::Onnx),
            "nnef" => Ok(ModelFormat::Nnef),
            "tf" | "tensorflow" => Ok(ModelFormat::Tf),
            _ => Err(format!("unknown model format {s:?} (expected onnx, nnef or tf)")),
        }
    }
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ModelFormat::Onnx => "onnx",
            ModelFormat::Nnef => "nnef",
            ModelFormat::Tf => "tf",
        };
        f.write_str(name)
    }
}

/// A model optimized and planned by tract.
#[derive(Debug)]
pub struct TractModel {
    plan: TypedRunnableModel<TypedModel>,
    classes: Option<usize>,
}

impl TractModel {
    /// Loads the artifact at `path`, pins its input to `f32 (1, height, width, 3)` and turns it
    /// into a runnable plan.
    pub fn load(
        path: impl AsRef<Path>,
        format: Option<ModelFormat>,
        input_size: TargetSize,
    ) -> Result<TractModel> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ClassifyError::model_load(path, "no such file or directory"));
        }
        let format = match format {
            Some(format) => format,
            None => ModelFormat::guess(path)?,
        };
        log::info!("Loading {format} model from {}", path.display());
        let model = load_typed(path, format, input_size)
            .map_err(|e| ClassifyError::model_load(path, e))?;
        TractModel::from_typed(model).map_err(|e| ClassifyError::model_load(path, e))
    }

    /// Optimizes an already built typed model. Its input facts must be fully determined.
    pub fn from_typed(model: TypedModel) -> TractResult<TractModel> {
        let model = model.into_optimized()?;
        let classes = output_classes(&model)?;
        log::debug!("Model input: {:?}, classes: {:?}", model.input_fact(0)?, classes);
        let plan = model.into_runnable()?;
        Ok(TractModel { plan, classes })
    }
}

fn load_typed(path: &Path, format: ModelFormat, input_size: TargetSize) -> TractResult<TypedModel> {
    match format {
        ModelFormat::Onnx => load_onnx(path, input_size),
        ModelFormat::Nnef => tract_nnef::nnef().with_tract_core().model_for_path(path),
        ModelFormat::Tf => load_tf(path, input_size),
    }
}

#[cfg(feature = "onnx")]
fn load_onnx(path: &Path, input_size: TargetSize) -> TractResult<TypedModel> {
    use tract_onnx::prelude::*;
    tract_onnx::onnx()
        .model_for_path(path)?
        .with_input_fact(0, f32::fact(input_size.input_shape()).into())?
        .into_typed()
}

#[cfg(not(feature = "onnx"))]
fn load_onnx(_path: &Path, _input_size: TargetSize) -> TractResult<TypedModel> {
    bail!("built without ONNX support (enable the `onnx` feature)")
}

#[cfg(feature = "tf")]
fn load_tf(path: &Path, input_size: TargetSize) -> TractResult<TypedModel> {
    use tract_tensorflow::prelude::*;
    tract_tensorflow::tensorflow()
        .model_for_path(path)?
        .with_input_fact(0, f32::fact(input_size.input_shape()).into())?
        .into_typed()
}

#[cfg(not(feature = "tf"))]
fn load_tf(_path: &Path, _input_size: TargetSize) -> TractResult<TypedModel> {
    bail!("built without TensorFlow support (enable the `tf` feature)")
}

/// Class count read from the last axis of the first output, when it is concrete.
fn output_classes(model: &TypedModel) -> TractResult<Option<usize>> {
    let fact = model.output_fact(0)?;
    Ok(fact.shape.iter().last().and_then(|d| d.to_usize().ok()))
}

/// Flattens a score tensor. Every axis but the last must be 1, so `(N)`, `(1, N)` and
/// `(1, 1, 1, N)` are all accepted.
fn flatten_scores(output: &Tensor) -> TractResult<Vec<f32>> {
    let shape = output.shape();
    let Some((_, outer)) = shape.split_last() else {
        bail!("model output is a scalar, expected one score per class")
    };
    ensure!(
        outer.iter().all(|&d| d == 1),
        "model output has shape {:?}, expected a single batch of class scores",
        shape
    );
    let scores = output.cast_to::<f32>()?;
    Ok(scores.as_slice::<f32>()?.to_vec())
}

impl ScoreModel for TractModel {
    fn output_classes(&self) -> Option<usize> {
        self.classes
    }

    fn scores(&self, input: Tensor) -> TractResult<Vec<f32>> {
        let outputs = self.plan.run(tvec!(input.into()))?;
        let output = outputs.first().context("model produced no output")?;
        flatten_scores(output)
    }
}

/// A model that ignores its input and always returns the same scores.
///
/// Handy for wiring checks and tests of everything around the forward pass.
#[derive(Clone, Debug, PartialEq)]
pub struct FixedScores {
    scores: Vec<f32>,
    declared_classes: Option<usize>,
}

impl FixedScores {
    pub fn new(scores: impl Into<Vec<f32>>) -> FixedScores {
        FixedScores { scores: scores.into(), declared_classes: None }
    }

    /// Advertise a class count up front, as a model with a static output shape does.
    pub fn declaring_classes(self, classes: usize) -> FixedScores {
        FixedScores { declared_classes: Some(classes), ..self }
    }
}

impl ScoreModel for FixedScores {
    fn output_classes(&self) -> Option<usize> {
        self.declared_classes
    }

    fn scores(&self, input: Tensor) -> TractResult<Vec<f32>> {
        ensure!(input.rank() == 4, "expected a rank 4 input, got {:?}", input.shape());
        Ok(self.scores.clone())
    }
}
