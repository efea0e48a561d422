use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use conefor_driver::{ConeforOptions, ConnectionType, ConnectivityIndex};
use conefor_inputs::{
    ConnectionMethod, Crs, FeatureSource, LayerProcessingParameters, OutputFile, ProcessError,
    io,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSerError(#[from] toml::ser::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    ProcessError(#[from] ProcessError),
    #[error("Missing 'output_dir' and no previous output directory in the settings")]
    MissingOutputDir,
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

/// One layer to process
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct LayerConfig {
    /// GeoJSON file holding points or polygons
    pub path: PathBuf,
    /// CRS of the coordinates in `path`
    #[serde(default = "Crs::wgs84")]
    pub crs: Crs,
    /// Encoding label for the text outputs, e.g. `"latin1"`
    #[serde(default)]
    pub encoding: Option<String>,
    /// Feature ordinals (0-based, file order) to restrict processing to
    #[serde(default)]
    pub selection: Vec<u64>,
    #[serde(default)]
    pub id_field: Option<String>,
    #[serde(default)]
    pub attribute_field: Option<String>,
    #[serde(default)]
    pub connection_method: ConnectionMethod,
    #[serde(default)]
    pub distance_threshold: Option<f64>,
    #[serde(default)]
    pub attribute_file: Option<String>,
    #[serde(default)]
    pub area_file: Option<String>,
    /// Connection file for `connection_method`
    #[serde(default)]
    pub connection_file: Option<String>,
    /// Distance-line layer for `connection_method`
    #[serde(default)]
    pub vector_file: Option<String>,
}

impl LayerConfig {
    pub fn load(&self) -> Result<Arc<dyn FeatureSource>, ConfigError> {
        let mut layer = io::load_layer(&self.path, self.crs.clone())?;
        if let Some(encoding) = &self.encoding {
            layer = layer.with_encoding(encoding.clone());
        }
        if !self.selection.is_empty() {
            layer = layer.with_selection(self.selection.iter().copied());
        }
        Ok(Arc::new(layer))
    }

    pub fn parameters(&self) -> Result<LayerProcessingParameters, ConfigError> {
        let mut builder = LayerProcessingParameters::builder(self.load()?)
            .connection_method(self.connection_method);

        if let Some(field) = &self.id_field {
            builder = builder.id_field(field.clone());
        }
        if let Some(field) = &self.attribute_field {
            builder = builder.attribute_field(field.clone());
        }
        if let Some(threshold) = self.distance_threshold {
            builder = builder.distance_threshold(threshold);
        }
        if let Some(stem) = &self.attribute_file {
            builder = builder.attribute_file(stem.clone());
        }
        if let Some(stem) = &self.area_file {
            builder = builder.area_file(stem.clone());
        }
        if let Some(stem) = &self.connection_file {
            builder = builder.connection_file(stem.clone());
        }
        if let Some(stem) = &self.vector_file {
            builder = builder.vector_file(stem.clone());
        }

        Ok(builder.build()?)
    }
}

/// Conefor settings applied to every node/connection pair of a run
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ConeforConfig {
    /// Conefor executable; searched on `PATH` when unset
    #[serde(default)]
    pub executable: Option<PathBuf>,
    pub indices: Vec<ConnectivityIndex>,
    #[serde(default)]
    pub connection_type: ConnectionType,
    #[serde(default)]
    pub all_pairs_connected: bool,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub probability: Option<f64>,
    #[serde(default)]
    pub write_components: bool,
    #[serde(default)]
    pub write_links: bool,
    #[serde(default)]
    pub write_probabilities: bool,
    #[serde(default)]
    pub only_overall: bool,
    #[serde(default)]
    pub no_removals: bool,
    #[serde(default)]
    pub prefix: Option<String>,
}

impl ConeforConfig {
    pub fn options(&self, node_file: &Path, connection_file: &Path) -> ConeforOptions {
        let mut options = ConeforOptions::new(node_file, connection_file)
            .with_indices(self.indices.iter().copied())
            .with_connection_type(self.connection_type);
        options.all_pairs_connected = self.all_pairs_connected;
        options.threshold = self.threshold;
        options.probability = self.probability;
        options.write_components = self.write_components;
        options.write_links = self.write_links;
        options.write_probabilities = self.write_probabilities;
        options.only_overall = self.only_overall;
        options.no_removals = self.no_removals;
        options.prefix = self.prefix.clone();
        options
    }
}

/// A processing project: layers to turn into Conefor inputs
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ProjectConfig {
    /// Where outputs go; the last directory used is remembered when unset
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Restrict processing to each layer's selection; the saved setting applies when unset
    #[serde(default)]
    pub use_selected: Option<bool>,
    /// CRS distances are measured in; each layer's own CRS when unset
    #[serde(default)]
    pub project_crs: Option<Crs>,
    pub layers: Vec<LayerConfig>,
    #[serde(default)]
    pub conefor: Option<ConeforConfig>,
}

impl ProjectConfig {
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load from a file, picking the format from its extension
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(ConfigError::UnsupportedFileFormat),
        }
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// JSON schema of the project file
    pub fn json_schema() -> Result<String, ConfigError> {
        let schema = schemars::schema_for!(ProjectConfig);
        Ok(serde_json::to_string_pretty(&schema)?)
    }

    pub fn resolve_output_dir(&self, fallback: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
        self.output_dir
            .clone()
            .or(fallback)
            .ok_or(ConfigError::MissingOutputDir)
    }

    /// Build and validate the parameters of every layer
    pub fn parameters(&self) -> Result<Vec<LayerProcessingParameters>, ConfigError> {
        self.layers.iter().map(LayerConfig::parameters).collect()
    }
}

/// Node and connection files to hand to Conefor together: every node file
/// of a layer with every connection file of the same layer.
pub fn conefor_pairs(files: &[OutputFile]) -> Vec<(PathBuf, PathBuf)> {
    let mut pairs = Vec::new();
    for node in files.iter().filter(|f| f.kind.is_node_file()) {
        for connection in files
            .iter()
            .filter(|f| f.kind.is_connection_file() && f.layer == node.layer)
        {
            pairs.push((node.path.clone(), connection.path.clone()));
        }
    }
    pairs
}
