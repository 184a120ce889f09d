use std::path::PathBuf;

use anyhow::{Context, Result};
use plantdoc_core::{Classifier, ClassifyError, Filter, ModelFormat, Prediction};
use serde::Serialize;
use structopt::StructOpt;

mod catalogue;
mod settings;

use catalogue::{Catalogue, DiseaseInfo};
use settings::Settings;

fn main() {
    let cli_args = CliArgs::from_args();

    let level = match cli_args.verbosity {
        0 => "plantdoc=warn,plantdoc_core=warn",
        1 => "plantdoc=info,plantdoc_core=info",
        2 => "plantdoc=debug,plantdoc_core=debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli_args.run() {
        Ok(0) => (),
        Ok(failed) => {
            log::warn!("{failed} image(s) could not be classified");
            std::process::exit(2)
        }
        Err(e) => {
            log::error!("{e:?}");
            std::process::exit(1)
        }
    }
}

/// Classify pictures of plant leaves into disease categories.
#[derive(Debug, StructOpt)]
#[structopt(name = "plantdoc", about = "Plant leaf disease classifier")]
pub struct CliArgs {
    /// Verbosity, repeat for more (-v, -vv, -vvv)
    #[structopt(short = "v", parse(from_occurrences))]
    pub verbosity: usize,

    /// JSON config file. Relative paths inside are taken relative to it
    #[structopt(long, parse(from_os_str))]
    pub config: Option<PathBuf>,

    /// Model artifact (.onnx, .pb, NNEF directory or archive)
    #[structopt(long, parse(from_os_str))]
    pub model: Option<PathBuf>,

    /// Model format (onnx, nnef or tf) instead of guessing from the path
    #[structopt(long)]
    pub format: Option<ModelFormat>,

    /// Class index JSON file mapping class indices to labels
    #[structopt(long = "classes", parse(from_os_str))]
    pub class_index: Option<PathBuf>,

    /// Disease catalogue JSON file with a description for each label
    #[structopt(long, parse(from_os_str))]
    pub catalogue: Option<PathBuf>,

    /// Square model input size, in pixels
    #[structopt(long)]
    pub size: Option<u32>,

    /// Model input height, in pixels
    #[structopt(long)]
    pub height: Option<u32>,

    /// Model input width, in pixels
    #[structopt(long)]
    pub width: Option<u32>,

    /// Resize filter (nearest, triangle, catmullrom, gaussian, lanczos3)
    #[structopt(long)]
    pub filter: Option<Filter>,

    /// One JSON object per image instead of text
    #[structopt(long)]
    pub json: bool,

    /// Images to classify
    #[structopt(parse(from_os_str), required = true)]
    pub images: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    image: String,
    #[serde(flatten)]
    prediction: &'a Prediction,
    #[serde(skip_serializing_if = "Option::is_none")]
    info: Option<&'a DiseaseInfo>,
}

#[derive(Debug, Serialize)]
struct Failure {
    image: String,
    error: String,
}

impl CliArgs {
    /// Classifies every image and returns how many of them failed.
    pub fn run(&self) -> Result<usize> {
        let settings = Settings::from_args(self)?;
        log::debug!("{settings:?}");

        let classifier = Classifier::from_config(&settings.classifier)
            .context("Classifier could not be started")?;
        let catalogue = match &settings.catalogue {
            Some(path) => Catalogue::load(path)?,
            None => Catalogue::default(),
        };
        if !catalogue.is_empty() {
            let missing = catalogue.missing(classifier.class_index().iter().map(|(_, l)| l));
            if !missing.is_empty() {
                log::warn!("No catalogue record for {missing:?}");
            }
        }
        self.classify_all(&classifier, &catalogue)
    }

    /// Decode, mode and inference failures are reported and skipped. Fatal errors abort.
    fn classify_all(&self, classifier: &Classifier, catalogue: &Catalogue) -> Result<usize> {
        let mut failed = 0;
        for image in &self.images {
            let name = image.display().to_string();
            match classifier.predict_path(image) {
                Ok(prediction) => {
                    let info = catalogue.lookup(&prediction.label);
                    self.report(Report { image: name, prediction: &prediction, info })?;
                }
                Err(e) if e.is_fatal() => {
                    return Err(e).with_context(|| format!("Classifying {name}"));
                }
                Err(e) => {
                    failed += 1;
                    self.failure(name, e)?;
                }
            }
        }
        Ok(failed)
    }

    fn report(&self, report: Report<'_>) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(&report)?);
            return Ok(());
        }
        let Report { image, prediction, info } = report;
        println!(
            "{image}: {} (class {}, score {:.3})",
            prediction.label, prediction.index, prediction.score
        );
        if let Some(info) = info {
            println!("  {}", info.title);
            println!("  {}", info.description);
            if !info.remedies.is_empty() {
                let remedies: Vec<String> = info
                    .remedies
                    .iter()
                    .enumerate()
                    .map(|(i, remedy)| format!("{}. {remedy}", i + 1))
                    .collect();
                println!("  Remedies: {}", remedies.join("  "));
            }
        }
        Ok(())
    }

    fn failure(&self, image: String, e: ClassifyError) -> Result<()> {
        let error = format!("{:#}", anyhow::Error::from(e));
        log::warn!("{image}: {error}");
        if self.json {
            println!("{}", serde_json::to_string(&Failure { image, error })?);
        } else {
            println!("{image}: failed to classify ({error})");
        }
        Ok(())
    }
}
