//! Canonical variable names and their per-source on-disk names

use crate::errors::{OceanClimoError, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Mapping from canonical variable name (e.g. `nitrate`) to the name a
/// source stores it under (e.g. `NO3`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableDictionary {
    entries: BTreeMap<String, String>,
}

impl VariableDictionary {
    /// Build a dictionary from `(canonical, on_disk)` pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Biogeochemical tracers as written by the ocean model
    #[must_use]
    pub fn model_defaults() -> Self {
        Self::from_pairs([
            ("nitrate", "NO3"),
            ("phosphate", "PO4"),
            ("oxygen", "O2"),
            ("silicate", "SiO3"),
            ("dic", "DIC"),
            ("alkalinity", "ALK"),
            ("iron", "Fe"),
        ])
    }

    /// Tracers available from the reanalysis, named as after loading
    #[must_use]
    pub fn reanalysis_defaults() -> Self {
        Self::from_pairs([
            ("nitrate", "NO3"),
            ("phosphate", "PO4"),
            ("oxygen", "O2"),
            ("silicate", "SiO3"),
        ])
    }

    /// Load a dictionary cached next to a climatology store
    ///
    /// # Errors
    ///
    /// Returns [`OceanClimoError::DictionaryNotFound`] if `path` does not exist.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(OceanClimoError::DictionaryNotFound {
                path: path.to_path_buf(),
            });
        }
        debug!("Getting cached variable dictionary from {}", path.display());
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the dictionary as pretty, key-sorted JSON
    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// On-disk name of `canonical` for the source called `source_name`
    ///
    /// # Errors
    ///
    /// Unknown canonical names are fatal: [`OceanClimoError::VariableNotInDictionary`].
    pub fn lookup(&self, source_name: &str, canonical: &str) -> Result<&str> {
        self.entries
            .get(canonical)
            .map(String::as_str)
            .ok_or_else(|| OceanClimoError::VariableNotInDictionary {
                source_name: source_name.to_string(),
                variable: canonical.to_string(),
            })
    }

    #[must_use]
    pub fn get(&self, canonical: &str) -> Option<&str> {
        self.entries.get(canonical).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, canonical: &str) -> bool {
        self.entries.contains_key(canonical)
    }

    /// Every on-disk name, in canonical-key order
    pub fn on_disk_names(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
