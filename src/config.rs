//! Dataset registry
//!
//! Loaded once at startup from a JSON file and handed to the fetcher and
//! the HTTP layer as an explicit value.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

/// How a dataset's entities are projected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    Features,
    FeatureCollections,
    Unsupported,
}

/// One dataset exposed by the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    /// Local name used in request paths
    pub name: String,
    /// Projection type, kept as written in the config
    #[serde(rename = "type")]
    pub kind: String,
    /// Name of the dataset on the datahub
    pub remote_name: String,
    #[serde(default)]
    pub strip_property_urls: bool,
}

impl Dataset {
    pub fn projection(&self) -> DatasetKind {
        match self.kind.as_str() {
            "features" => DatasetKind::Features,
            "featureCollections" => DatasetKind::FeatureCollections,
            _ => DatasetKind::Unsupported,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    uda: String,
    #[serde(default)]
    datasets: Vec<Dataset>,
}

/// Upstream datahub location plus the dataset table
#[derive(Debug, Clone)]
pub struct Config {
    pub datahub_url: Url,
    pub datasets: Vec<Dataset>,
}

impl Config {
    pub fn new(datahub_url: Url, datasets: Vec<Dataset>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for dataset in &datasets {
            if !seen.insert(dataset.name.as_str()) {
                return Err(ConfigError::DuplicateDataset(dataset.name.clone()));
            }
        }
        Ok(Self {
            datahub_url,
            datasets,
        })
    }

    /// Parse a config document
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(content)?;
        let datahub_url = Url::parse(&raw.uda).map_err(|source| ConfigError::InvalidUrl {
            url: raw.uda.clone(),
            source,
        })?;
        Self::new(datahub_url, raw.datasets)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn dataset(&self, name: &str) -> Option<&Dataset> {
        self.datasets.iter().find(|ds| ds.name == name)
    }
}
