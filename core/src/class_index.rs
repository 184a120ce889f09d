use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};

use crate::errors::{ClassifyError, Result};

/// Immutable mapping from class index to label.
///
/// On disk this is a JSON object whose keys are the decimal indices, as written by the Keras
/// training scripts: `{"0": "Apple___Apple_scab", "1": "Apple___Black_rot", ...}`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassIndex {
    origin: String,
    labels: BTreeMap<usize, String>,
}

impl ClassIndex {
    pub fn load(path: impl AsRef<Path>) -> Result<ClassIndex> {
        let path = path.as_ref();
        let origin = path.display().to_string();
        let json =
            fs::read_to_string(path).map_err(|e| ClassifyError::label_map_load(&origin, e))?;
        let index = ClassIndex::parse(origin, &json)?;
        log::info!("Loaded {} class labels from {}", index.len(), index.origin);
        Ok(index)
    }

    pub fn from_json_str(json: &str) -> Result<ClassIndex> {
        ClassIndex::parse("<inline json>".to_string(), json)
    }

    /// Contiguous index: `labels[i]` is the label of class `i`.
    pub fn from_labels<S: Into<String>>(labels: impl IntoIterator<Item = S>) -> Result<ClassIndex> {
        let labels: BTreeMap<usize, String> =
            labels.into_iter().map(Into::into).enumerate().collect();
        ClassIndex::new("<labels>".to_string(), labels)
    }

    fn parse(origin: String, json: &str) -> Result<ClassIndex> {
        let RawEntries(raw) =
            serde_json::from_str(json).map_err(|e| ClassifyError::label_map_load(&origin, e))?;
        let mut labels = BTreeMap::new();
        for (key, label) in raw {
            let index = key
                .parse::<usize>()
                .ok()
                .filter(|ix| ix.to_string() == key)
                .ok_or_else(|| {
                    ClassifyError::label_map_load(
                        &origin,
                        format!("key {key:?} is not a non-negative integer index"),
                    )
                })?;
            if labels.insert(index, label).is_some() {
                return Err(ClassifyError::label_map_load(
                    &origin,
                    format!("duplicate index {index}"),
                ));
            }
        }
        ClassIndex::new(origin, labels)
    }

    fn new(origin: String, labels: BTreeMap<usize, String>) -> Result<ClassIndex> {
        if labels.is_empty() {
            return Err(ClassifyError::label_map_load(&origin, "no class labels"));
        }
        if let Some((ix, _)) = labels.iter().find(|(_, label)| label.trim().is_empty()) {
            return Err(ClassifyError::label_map_load(&origin, format!("empty label for {ix}")));
        }
        Ok(ClassIndex { origin, labels })
    }

    /// Where the index was loaded from, for diagnostics.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(&index).map(|s| &**s)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.labels.iter().map(|(ix, label)| (*ix, &**label))
    }

    /// Checks that the index holds exactly the classes `0..classes`.
    pub fn check_complete(&self, classes: usize) -> Result<()> {
        if let Some(missing) = (0..classes).find(|ix| !self.labels.contains_key(ix)) {
            return Err(ClassifyError::label_map_load(
                &self.origin,
                format!("model emits {classes} classes but no label is given for class {missing}"),
            ));
        }
        if let Some(extra) = self.labels.keys().find(|ix| **ix >= classes) {
            return Err(ClassifyError::label_map_load(
                &self.origin,
                format!("model emits {classes} classes but a label is given for class {extra}"),
            ));
        }
        Ok(())
    }
}

/// Object entries in document order. Unlike a map target, repeated keys are all kept.
struct RawEntries(Vec<(String, String)>);

impl<'de> Deserialize<'de> for RawEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = RawEntries;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping class indices to labels")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<RawEntries, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, String>()? {
                    entries.push(entry);
                }
                Ok(RawEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}
