//! Descriptive records for the labels a model can emit.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DiseaseInfo {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub remedies: Vec<String>,
}

/// Label to record mapping, loaded from a JSON object keyed by label.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Catalogue {
    entries: HashMap<String, DiseaseInfo>,
}

impl Catalogue {
    pub fn load(path: impl AsRef<Path>) -> Result<Catalogue> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Reading disease catalogue {}", path.display()))?;
        let catalogue = Catalogue::from_json_str(&json)
            .with_context(|| format!("Parsing disease catalogue {}", path.display()))?;
        log::info!("Loaded {} disease records from {}", catalogue.len(), path.display());
        Ok(catalogue)
    }

    pub fn from_json_str(json: &str) -> Result<Catalogue> {
        let entries: HashMap<String, DiseaseInfo> = serde_json::from_str(json)?;
        Ok(Catalogue { entries })
    }

    pub fn lookup(&self, label: &str) -> Option<&DiseaseInfo> {
        self.entries.get(label)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Labels of `labels` without a record.
    pub fn missing<'a>(&self, labels: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
        labels.into_iter().filter(|label| !self.entries.contains_key(*label)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCAB: &str = r#"{
        "Apple___Apple_scab": {
            "title": "Apple scab",
            "description": "Fungal disease caused by Venturia inaequalis.",
            "remedies": ["Captan", "Mancozeb"]
        },
        "Apple___healthy": {
            "title": "Healthy apple",
            "description": "No disease detected."
        }
    }"#;

    #[test]
    fn lookup() -> Result<()> {
        let catalogue = Catalogue::from_json_str(SCAB)?;
        assert_eq!(catalogue.len(), 2);
        let scab = catalogue.lookup("Apple___Apple_scab").context("missing scab")?;
        assert_eq!(scab.title, "Apple scab");
        assert_eq!(scab.remedies, vec!["Captan", "Mancozeb"]);
        let healthy = catalogue.lookup("Apple___healthy").context("missing healthy")?;
        assert!(healthy.remedies.is_empty());
        assert!(catalogue.lookup("Apple___Black_rot").is_none());
        Ok(())
    }

    #[test]
    fn missing_labels() -> Result<()> {
        let catalogue = Catalogue::from_json_str(SCAB)?;
        let labels = ["Apple___Apple_scab", "Apple___Black_rot", "Apple___healthy"];
        assert_eq!(catalogue.missing(labels), vec!["Apple___Black_rot"]);
        Ok(())
    }

    #[test]
    fn reject_malformed() {
        assert!(Catalogue::from_json_str(r#"{"x": {"title": "t"}}"#).is_err());
        let unknown_field = r#"{"x": {"title": "t", "description": "d", "cure": 1}}"#;
        assert!(Catalogue::from_json_str(unknown_field).is_err());
        assert!(Catalogue::from_json_str("[]").is_err());
    }

    #[test]
    fn shipped_catalogue_covers_shipped_labels() -> Result<()> {
        let assets = Path::new(env!("CARGO_MANIFEST_DIR")).join("../assets");
        let catalogue = Catalogue::load(assets.join("disease_catalogue.json"))?;
        let index = plantdoc_core::ClassIndex::load(assets.join("class_indices.json"))?;
        assert_eq!(index.len(), 38);
        let missing = catalogue.missing(index.iter().map(|(_, label)| label));
        assert!(missing.is_empty(), "no record for {missing:?}");
        Ok(())
    }
}
