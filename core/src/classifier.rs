use std::path::Path;

use image::DynamicImage;
use serde::Serialize;

use crate::class_index::ClassIndex;
use crate::config::ClassifierConfig;
use crate::errors::{ClassifyError, Result};
use crate::model::{ModelFormat, ScoreModel, TractModel};
use crate::preprocess::{self, PreprocessOptions};

/// Outcome of one classification.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Prediction {
    pub index: usize,
    pub label: String,
    pub score: f32,
}

/// Index and value of the highest score. The lowest index wins ties and NaN never wins.
pub fn arg_max(scores: &[f32]) -> Option<(usize, f32)> {
    scores.iter().copied().enumerate().filter(|(_, s)| !s.is_nan()).fold(None, |best, (ix, s)| {
        match best {
            Some((_, top)) if s <= top => best,
            _ => Some((ix, s)),
        }
    })
}

/// A loaded model paired with its class index.
///
/// Both are immutable once the classifier is built; a classifier can be shared between
/// threads and every call is independent of the previous ones.
#[derive(Debug)]
pub struct Classifier {
    model: Box<dyn ScoreModel>,
    class_index: ClassIndex,
    options: PreprocessOptions,
}

impl Classifier {
    /// Loads the model and the class index with default preprocessing (224x224).
    pub fn load(
        model_path: impl AsRef<Path>,
        class_index_path: impl AsRef<Path>,
    ) -> Result<Classifier> {
        Classifier::load_with(model_path, None, class_index_path, PreprocessOptions::default())
    }

    pub fn load_with(
        model_path: impl AsRef<Path>,
        format: Option<ModelFormat>,
        class_index_path: impl AsRef<Path>,
        options: PreprocessOptions,
    ) -> Result<Classifier> {
        options.validate()?;
        let class_index = ClassIndex::load(class_index_path)?;
        let model = TractModel::load(model_path, format, options.target_size)?;
        Classifier::new(model, class_index, options)
    }

    pub fn from_config(config: &ClassifierConfig) -> Result<Classifier> {
        Classifier::load_with(
            &config.model,
            config.format,
            &config.class_index,
            config.preprocess_options(),
        )
    }

    /// Pairs an already loaded model with a class index. When the model knows its class count,
    /// the index must cover exactly those classes.
    pub fn new(
        model: impl ScoreModel + 'static,
        class_index: ClassIndex,
        options: PreprocessOptions,
    ) -> Result<Classifier> {
        options.validate()?;
        match model.output_classes() {
            Some(classes) => class_index.check_complete(classes)?,
            None => log::debug!(
                "Model class count is not static, {} labels will be checked per request",
                class_index.len()
            ),
        }
        Ok(Classifier { model: Box::new(model), class_index, options })
    }

    pub fn class_index(&self) -> &ClassIndex {
        &self.class_index
    }

    pub fn options(&self) -> &PreprocessOptions {
        &self.options
    }

    /// Classifies a decoded image and returns its label.
    pub fn classify(&self, image: &DynamicImage) -> Result<String> {
        Ok(self.predict(image)?.label)
    }

    pub fn classify_path(&self, path: impl AsRef<Path>) -> Result<String> {
        self.classify(&preprocess::decode_path(path)?)
    }

    pub fn classify_bytes(&self, bytes: &[u8]) -> Result<String> {
        self.classify(&preprocess::decode_bytes(bytes)?)
    }

    pub fn predict(&self, image: &DynamicImage) -> Result<Prediction> {
        let input = preprocess::preprocess(image, &self.options)?;
        let scores = self.model.scores(input).map_err(ClassifyError::inference)?;
        log::debug!("Scores: {scores:?}");
        self.resolve(&scores)
    }

    pub fn predict_path(&self, path: impl AsRef<Path>) -> Result<Prediction> {
        self.predict(&preprocess::decode_path(path)?)
    }

    fn resolve(&self, scores: &[f32]) -> Result<Prediction> {
        let (index, score) = arg_max(scores).ok_or_else(|| {
            ClassifyError::inference(format!("no usable score among {} outputs", scores.len()))
        })?;
        let label = self.class_index.label(index).ok_or(ClassifyError::LabelResolution {
            index,
            known: self.class_index.len(),
        })?;
        Ok(Prediction { index, label: label.to_string(), score })
    }
}
