use std::sync::Arc;

use crate::{
    error::Result,
    processor::{LayerProcessingParameters, OutputTargets},
    traits::FeatureSource,
    types::ConnectionMethod,
};

/// Builder for [`LayerProcessingParameters`] with a fluent API
pub struct ParametersBuilder {
    layer: Arc<dyn FeatureSource>,
    id_field: Option<String>,
    attribute_field: Option<String>,
    connection_method: ConnectionMethod,
    distance_threshold: Option<f64>,
    targets: OutputTargets,
    connection_file: Option<String>,
    vector_file: Option<String>,
}

impl ParametersBuilder {
    pub fn new(layer: Arc<dyn FeatureSource>) -> Self {
        Self {
            layer,
            id_field: None,
            attribute_field: None,
            connection_method: ConnectionMethod::default(),
            distance_threshold: None,
            targets: OutputTargets::default(),
            connection_file: None,
            vector_file: None,
        }
    }

    /// Field holding unique node ids; ids are generated when unset
    pub fn id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = Some(field.into());
        self
    }

    /// Field holding node weights; polygon areas are used when unset
    pub fn attribute_field(mut self, field: impl Into<String>) -> Self {
        self.attribute_field = Some(field.into());
        self
    }

    pub fn connection_method(mut self, method: ConnectionMethod) -> Self {
        self.connection_method = method;
        self
    }

    /// Drop links longer than `threshold`
    pub fn distance_threshold(mut self, threshold: f64) -> Self {
        self.distance_threshold = Some(threshold);
        self
    }

    pub fn attribute_file(mut self, stem: impl Into<String>) -> Self {
        self.targets.attribute_file = Some(stem.into());
        self
    }

    pub fn area_file(mut self, stem: impl Into<String>) -> Self {
        self.targets.area_file = Some(stem.into());
        self
    }

    /// Connection file for the selected connection method
    pub fn connection_file(mut self, stem: impl Into<String>) -> Self {
        self.connection_file = Some(stem.into());
        self
    }

    /// Distance-line layer for the selected connection method
    pub fn vector_file(mut self, stem: impl Into<String>) -> Self {
        self.vector_file = Some(stem.into());
        self
    }

    /// Set every target at once; routed files still apply on top
    pub fn targets(mut self, targets: OutputTargets) -> Self {
        self.targets = targets;
        self
    }

    /// Route method-dependent files and validate against the layer
    pub fn build(self) -> Result<LayerProcessingParameters> {
        let mut targets = self.targets;
        match self.connection_method {
            ConnectionMethod::CentroidDistance => {
                targets.centroid_file = self.connection_file.or(targets.centroid_file);
                targets.centroid_vector = self.vector_file.or(targets.centroid_vector);
            }
            ConnectionMethod::EdgeDistance => {
                targets.edge_file = self.connection_file.or(targets.edge_file);
                targets.edge_vector = self.vector_file.or(targets.edge_vector);
            }
        }

        let params = LayerProcessingParameters {
            layer: self.layer,
            id_field: self.id_field,
            attribute_field: self.attribute_field,
            connection_method: self.connection_method,
            distance_threshold: self.distance_threshold,
            targets,
        };
        params.validate()?;
        Ok(params)
    }
}
