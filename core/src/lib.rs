//! # plantdoc-core
//!
//! Plant leaf disease classification on top of tract.
//!
//! A [`Classifier`] pairs a pre-trained convolutional model with the class index it was
//! trained with. Images are resized to the model input size, scaled to `[0, 1]` and run
//! through the model; the best scoring class is mapped back to its label.
//!
//! ```no_run
//! # fn main() -> plantdoc_core::Result<()> {
//! use plantdoc_core::Classifier;
//!
//! let classifier = Classifier::load(
//!     "trained_model/plant_disease_prediction_model.onnx",
//!     "class_indices.json",
//! )?;
//! let label = classifier.classify_path("leaf.jpg")?;
//! println!("{label}");
//! # Ok(())
//! # }
//! ```

pub mod class_index;
pub mod classifier;
pub mod config;
pub mod errors;
pub mod model;
pub mod preprocess;

pub use class_index::ClassIndex;
pub use classifier::{Classifier, Prediction, arg_max};
pub use config::ClassifierConfig;
pub use errors::{ClassifyError, Result};
pub use model::{FixedScores, ModelFormat, ScoreModel, TractModel};
pub use preprocess::{Filter, PreprocessOptions, TargetSize, preprocess};

pub use tract_core;

#[cfg(test)]
#[allow(dead_code)]
fn setup_test_logger() {
    let _ = env_logger::Builder::from_env("PLANTDOC_LOG").try_init();
}
