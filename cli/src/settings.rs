use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use plantdoc_core::{ClassifierConfig, TargetSize};
use serde::Deserialize;

use crate::CliArgs;

/// Everything the command line needs: the classifier configuration plus the disease catalogue.
///
/// Built-in defaults, then the config file, then command line flags.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(flatten)]
    pub classifier: ClassifierConfig,
    pub catalogue: Option<PathBuf>,
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> Result<Settings> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Reading config file {}", path.display()))?;
        let mut settings: Settings = serde_json::from_str(&json)
            .with_context(|| format!("Parsing config file {}", path.display()))?;
        if let Some(dir) = path.parent() {
            settings.classifier.rebase(dir);
            if let Some(catalogue) = settings.catalogue.as_mut().filter(|p| p.is_relative()) {
                *catalogue = dir.join(&*catalogue);
            }
        }
        Ok(settings)
    }

    pub fn from_args(args: &CliArgs) -> Result<Settings> {
        let mut settings = match &args.config {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };
        settings.apply(args);
        Ok(settings)
    }

    fn apply(&mut self, args: &CliArgs) {
        let classifier = &mut self.classifier;
        if let Some(model) = &args.model {
            classifier.model = model.clone();
        }
        if let Some(format) = args.format {
            classifier.format = Some(format);
        }
        if let Some(class_index) = &args.class_index {
            classifier.class_index = class_index.clone();
        }
        if let Some(side) = args.size {
            classifier.target_size = TargetSize::square(side);
        }
        if let Some(height) = args.height {
            classifier.target_size.height = height;
        }
        if let Some(width) = args.width {
            classifier.target_size.width = width;
        }
        if let Some(filter) = args.filter {
            classifier.filter = filter;
        }
        if let Some(catalogue) = &args.catalogue {
            self.catalogue = Some(catalogue.clone());
        }
    }
}
