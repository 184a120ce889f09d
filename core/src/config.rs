use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::errors::{ClassifyError, Result};
use crate::model::ModelFormat;
use crate::preprocess::{Filter, PreprocessOptions, TargetSize};

pub const DEFAULT_MODEL_PATH: &str = "trained_model/plant_disease_prediction_model.onnx";
pub const DEFAULT_CLASS_INDEX_PATH: &str = "class_indices.json";

/// Where the artifacts live and how images are prepared for the model.
///
/// Deserialized from JSON. Every field is optional:
///
/// ```json
/// {
///   "model": "trained_model/plant_disease_prediction_model.onnx",
///   "format": "onnx",
///   "class_index": "class_indices.json",
///   "target_size": { "height": 224, "width": 224 },
///   "filter": "catmullrom"
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub model: PathBuf,
    pub format: Option<ModelFormat>,
    pub class_index: PathBuf,
    pub target_size: TargetSize,
    pub filter: Filter,
}

impl Default for ClassifierConfig {
    fn default() -> ClassifierConfig {
        ClassifierConfig {
            model: PathBuf::from(DEFAULT_MODEL_PATH),
            format: None,
            class_index: PathBuf::from(DEFAULT_CLASS_INDEX_PATH),
            target_size: TargetSize::default(),
            filter: Filter::default(),
        }
    }
}

impl ClassifierConfig {
    /// Reads a JSON config file. Relative artifact paths are taken relative to the file.
    pub fn load(path: impl AsRef<Path>) -> Result<ClassifierConfig> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|e| ClassifyError::Config(format!("reading {}: {e}", path.display())))?;
        let mut config = ClassifierConfig::from_json_str(&json)
            .map_err(|e| ClassifyError::Config(format!("{}: {e}", path.display())))?;
        if let Some(dir) = path.parent() {
            config.rebase(dir);
        }
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> std::result::Result<ClassifierConfig, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Makes relative artifact paths relative to `dir`.
    pub fn rebase(&mut self, dir: &Path) {
        for path in [&mut self.model, &mut self.class_index] {
            if path.is_relative() {
                *path = dir.join(&*path);
            }
        }
    }

    pub fn preprocess_options(&self) -> PreprocessOptions {
        PreprocessOptions { target_size: self.target_size, filter: self.filter }
    }
}
