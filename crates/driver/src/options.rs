use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{
    DriverError,
    index::{ConnectivityIndex, IndexKind, expand},
};

/// What the values of the connection file mean
#[derive(
    Debug, Clone, Copy, Default,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString,
    PartialEq, Eq
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionType {
    /// Distances between nodes
    #[default]
    Dist,
    /// Direct dispersal probabilities
    Prob,
}

/// One Conefor invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConeforOptions {
    pub node_file: PathBuf,
    pub connection_file: PathBuf,
    #[serde(default)]
    pub connection_type: ConnectionType,
    /// Every pair of nodes has a line in the connection file
    #[serde(default)]
    pub all_pairs_connected: bool,
    /// Distance under which two nodes are linked (binary indices) or which
    /// maps to `probability` (probability indices on distances)
    #[serde(default)]
    pub threshold: Option<f64>,
    /// Dispersal probability at `threshold`
    #[serde(default)]
    pub probability: Option<f64>,
    pub indices: Vec<ConnectivityIndex>,
    #[serde(default)]
    pub write_components: bool,
    #[serde(default)]
    pub write_links: bool,
    #[serde(default)]
    pub write_probabilities: bool,
    /// Only compute overall landscape values, no per-node importances
    #[serde(default)]
    pub only_overall: bool,
    #[serde(default)]
    pub no_removals: bool,
    /// Prefix for the result file names
    #[serde(default)]
    pub prefix: Option<String>,
}

impl ConeforOptions {
    pub fn new(node_file: impl Into<PathBuf>, connection_file: impl Into<PathBuf>) -> Self {
        Self {
            node_file: node_file.into(),
            connection_file: connection_file.into(),
            connection_type: ConnectionType::default(),
            all_pairs_connected: false,
            threshold: None,
            probability: None,
            indices: Vec::new(),
            write_components: false,
            write_links: false,
            write_probabilities: false,
            only_overall: false,
            no_removals: false,
            prefix: None,
        }
    }

    pub fn with_indices(mut self, indices: impl IntoIterator<Item = ConnectivityIndex>) -> Self {
        self.indices = indices.into_iter().collect();
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_probability(mut self, probability: f64) -> Self {
        self.probability = Some(probability);
        self
    }

    pub fn with_connection_type(mut self, connection_type: ConnectionType) -> Self {
        self.connection_type = connection_type;
        self
    }

    fn wants(&self, kind: IndexKind) -> bool {
        self.indices.iter().any(|index| index.kind() == kind)
    }

    pub fn validate(&self) -> Result<(), DriverError> {
        let invalid = |reason: String| Err(DriverError::InvalidOptions(reason));

        if self.indices.is_empty() {
            return invalid("no connectivity index requested".to_string());
        }
        for file in [&self.node_file, &self.connection_file] {
            if file_stem(file).is_none() {
                return invalid(format!("'{}' is not a file name", file.display()));
            }
        }

        if let Some(threshold) = self.threshold {
            if !threshold.is_finite() || threshold <= 0.0 {
                return invalid(format!("threshold must be positive, got {}", threshold));
            }
        }

        if self.wants(IndexKind::Binary) && self.threshold.is_none() {
            return invalid("binary indices need a threshold".to_string());
        }

        if self.wants(IndexKind::Probability) && self.connection_type == ConnectionType::Dist {
            if self.threshold.is_none() {
                return invalid("probability indices on distances need a threshold".to_string());
            }
            match self.probability {
                Some(p) if p > 0.0 && p <= 1.0 => {}
                Some(p) => return invalid(format!("probability must be in (0, 1], got {}", p)),
                None => {
                    return invalid(
                        "probability indices on distances need a probability".to_string(),
                    );
                }
            }
        }

        Ok(())
    }

    /// Command line for Conefor. Files are passed by stem since Conefor
    /// resolves them in its own directory.
    pub fn arguments(&self) -> Vec<String> {
        let mut args = Vec::new();

        args.push("-nodeFile".to_string());
        args.push(file_stem(&self.node_file).unwrap_or_default());
        args.push("-conFile".to_string());
        args.push(file_stem(&self.connection_file).unwrap_or_default());

        args.push("-t".to_string());
        args.push(self.connection_type.to_string());
        args.push(if self.all_pairs_connected { "all" } else { "notall" }.to_string());

        if let (true, Some(threshold)) = (self.wants(IndexKind::Binary), self.threshold) {
            args.push("-confAdj".to_string());
            args.push(threshold.to_string());
        }
        if self.wants(IndexKind::Probability) && self.connection_type == ConnectionType::Dist {
            if let (Some(threshold), Some(probability)) = (self.threshold, self.probability) {
                args.push("-confProb".to_string());
                args.push(threshold.to_string());
                args.push(probability.to_string());
            }
        }

        args.extend(expand(&self.indices).into_iter().map(|index| index.flag().to_string()));

        let switches = [
            (self.only_overall, "-onlyoverall"),
            (self.no_removals, "-noremovals"),
            (self.write_components, "-wcomp"),
            (self.write_links, "-wlinks"),
            (self.write_probabilities, "-wprob"),
        ];
        args.extend(switches.iter().filter(|(on, _)| *on).map(|(_, flag)| flag.to_string()));

        if let Some(prefix) = &self.prefix {
            args.push("-prefix".to_string());
            args.push(prefix.clone());
        }

        args
    }
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::ConnectivityIndex::*;

    #[test]
    fn test_binary_arguments() {
        let options = ConeforOptions::new("/data/nodes.txt", "/data/distances.txt")
            .with_indices([BC, NC])
            .with_threshold(1500.0);

        options.validate().unwrap();
        assert_eq!(
            options.arguments(),
            vec![
                "-nodeFile", "nodes", "-conFile", "distances", "-t", "dist", "notall",
                "-confAdj", "1500", "-NC", "-IIC", "-BC",
            ]
        );
    }

    #[test]
    fn test_probability_arguments_with_switches() {
        let mut options = ConeforOptions::new("nodes.txt", "links.txt")
            .with_indices([PC])
            .with_threshold(1000.0)
            .with_probability(0.5);
        options.all_pairs_connected = true;
        options.only_overall = true;
        options.write_links = true;
        options.prefix = Some("run1".to_string());

        options.validate().unwrap();
        assert_eq!(
            options.arguments(),
            vec![
                "-nodeFile", "nodes", "-conFile", "links", "-t", "dist", "all",
                "-confProb", "1000", "0.5", "-PC", "-onlyoverall", "-wlinks", "-prefix", "run1",
            ]
        );
    }

    #[test]
    fn test_probability_connections_need_nothing_else() {
        let options = ConeforOptions::new("nodes.txt", "probs.txt")
            .with_connection_type(ConnectionType::Prob)
            .with_indices([PC, F]);
        options.validate().unwrap();
        assert!(!options.arguments().iter().any(|a| a.starts_with("-conf")));
    }

    #[test]
    fn test_validation_failures() {
        let base = ConeforOptions::new("nodes.txt", "distances.txt");
        assert!(base.validate().is_err());

        let no_threshold = base.clone().with_indices([IIC]);
        assert!(matches!(no_threshold.validate(), Err(DriverError::InvalidOptions(_))));

        let no_probability = base.clone().with_indices([PC]).with_threshold(100.0);
        assert!(no_probability.validate().is_err());

        let bad_probability = base
            .clone()
            .with_indices([PC])
            .with_threshold(100.0)
            .with_probability(1.5);
        assert!(bad_probability.validate().is_err());

        let negative = base.with_indices([NC]).with_threshold(-3.0);
        assert!(negative.validate().is_err());
    }
}
