//! Feature access for vector layers: iteration with selection handling,
//! numeric attribute extraction and id-field discovery.

use std::collections::{HashMap, HashSet};

use geo_types::Geometry;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    crs::Crs,
    error::{ProcessError, Result},
    traits::FeatureSource,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GeometryKind {
    Point,
    Polygon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    Integer,
    Real,
    Text,
}

impl FieldType {
    pub fn is_numeric(self) -> bool {
        matches!(self, FieldType::Integer | FieldType::Real)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
}

/// Attribute value; `Null` is the layer's null sentinel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Integer(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Real(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

/// A geographic feature with geometry and attributes
#[derive(Debug, Clone)]
pub struct Feature {
    /// Host feature id, used by selections and id filters
    pub fid: u64,
    pub geometry: Option<Geometry<f64>>,
    pub attributes: HashMap<String, AttributeValue>,
}

impl Feature {
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }
}

/// Features of `layer` to process.
///
/// With `use_selected` and a non-empty selection only selected features are
/// returned. An empty selection falls back to every feature; callers pass
/// `use_selected` without checking the selection first.
pub fn get_features<'a>(
    layer: &'a dyn FeatureSource,
    use_selected: bool,
    filter_id: Option<u64>,
) -> Vec<&'a Feature> {
    let selection: HashSet<u64> = layer.selected().iter().copied().collect();
    let restrict = use_selected && !selection.is_empty();

    layer
        .features()
        .iter()
        .filter(|feature| !restrict || selection.contains(&feature.fid))
        .filter(|feature| filter_id.is_none_or(|id| feature.fid == id))
        .collect()
}

pub fn fields_of(layer: &dyn FeatureSource) -> Vec<String> {
    layer.fields().iter().map(|field| field.name.clone()).collect()
}

pub fn geometry_of(feature: &Feature) -> Option<&Geometry<f64>> {
    feature.geometry.as_ref()
}

/// Numeric coercion applied to attribute values
pub trait Numeric: Sized {
    fn coerce(field: &str, value: &AttributeValue) -> Result<Option<Self>>;
}

impl Numeric for i64 {
    fn coerce(field: &str, value: &AttributeValue) -> Result<Option<Self>> {
        match value {
            AttributeValue::Null => Ok(None),
            AttributeValue::Integer(v) => Ok(Some(*v)),
            // Ids are whole numbers
            AttributeValue::Real(v) if v.is_finite() && v.fract() == 0.0 => Ok(Some(*v as i64)),
            AttributeValue::Text(text) => match text.trim().parse::<i64>() {
                Ok(v) => Ok(Some(v)),
                Err(_) => Err(non_numeric(field, text)),
            },
            AttributeValue::Real(v) => Err(non_numeric(field, &v.to_string())),
        }
    }
}

impl Numeric for f64 {
    fn coerce(field: &str, value: &AttributeValue) -> Result<Option<Self>> {
        match value {
            AttributeValue::Null => Ok(None),
            AttributeValue::Integer(v) => Ok(Some(*v as f64)),
            AttributeValue::Real(v) => Ok(Some(*v)),
            AttributeValue::Text(text) => match text.trim().parse::<f64>() {
                Ok(v) => Ok(Some(v)),
                Err(_) => Err(non_numeric(field, text)),
            },
        }
    }
}

fn non_numeric(field: &str, value: &str) -> ProcessError {
    ProcessError::NonNumericAttribute {
        field: field.to_string(),
        value: value.to_string(),
    }
}

/// Read `field_name` from `feature` as a number.
///
/// Returns `None` for null values. A field missing from the layer schema is
/// an [`ProcessError::InvalidAttribute`].
pub fn get_numeric_attribute<T: Numeric>(
    layer: &dyn FeatureSource,
    feature: &Feature,
    field_name: &str,
) -> Result<Option<T>> {
    if !layer.has_field(field_name) {
        return Err(ProcessError::InvalidAttribute {
            field: field_name.to_string(),
            layer: layer.name().to_string(),
        });
    }

    match feature.attribute(field_name) {
        Some(value) => T::coerce(field_name, value),
        None => Ok(None),
    }
}

/// Integer and real fields whose values are distinct across every feature,
/// in schema order. These are the candidates for a node id field, so values
/// are compared as ids: a field holding a non-integral real is no candidate.
pub fn get_unique_numeric_fields(layer: &dyn FeatureSource) -> Vec<String> {
    let mut candidates: Vec<&str> = layer
        .fields()
        .iter()
        .filter(|field| field.field_type.is_numeric())
        .map(|field| field.name.as_str())
        .collect();
    let mut seen: HashMap<&str, HashSet<Option<i64>>> = HashMap::new();

    for feature in layer.features() {
        if candidates.is_empty() {
            break;
        }
        candidates.retain(|&field| {
            let id = match feature.attribute(field) {
                Some(value) => i64::coerce(field, value),
                None => Ok(None),
            };
            match id {
                Ok(id) => seen.entry(field).or_default().insert(id),
                Err(_) => false,
            }
        });
    }

    candidates.into_iter().map(str::to_string).collect()
}

/// In-memory layer; the GeoJSON loader produces one
#[derive(Debug, Clone)]
pub struct MemoryLayer {
    name: String,
    crs: Crs,
    encoding: String,
    kind: GeometryKind,
    fields: Vec<FieldDef>,
    features: Vec<Feature>,
    selected: Vec<u64>,
}

impl MemoryLayer {
    pub fn new(name: impl Into<String>, kind: GeometryKind, crs: Crs) -> Self {
        Self {
            name: name.into(),
            crs,
            encoding: "System".to_string(),
            kind,
            fields: Vec::new(),
            features: Vec::new(),
            selected: Vec::new(),
        }
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            field_type,
        });
        self
    }

    /// Add a feature; its fid is its position in the layer
    pub fn with_feature<I, K>(mut self, geometry: impl Into<Geometry<f64>>, attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, AttributeValue)>,
        K: Into<String>,
    {
        self.push_feature(Some(geometry.into()), attributes);
        self
    }

    pub fn push_feature<I, K>(&mut self, geometry: Option<Geometry<f64>>, attributes: I) -> u64
    where
        I: IntoIterator<Item = (K, AttributeValue)>,
        K: Into<String>,
    {
        let fid = self.features.len() as u64;
        self.features.push(Feature {
            fid,
            geometry,
            attributes: attributes.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        });
        fid
    }

    pub fn with_selection(mut self, fids: impl IntoIterator<Item = u64>) -> Self {
        self.selected = fids.into_iter().collect();
        self
    }
}

impl FeatureSource for MemoryLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn crs(&self) -> &Crs {
        &self.crs
    }

    fn encoding(&self) -> &str {
        &self.encoding
    }

    fn geometry_kind(&self) -> GeometryKind {
        self.kind
    }

    fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    fn features(&self) -> &[Feature] {
        &self.features
    }

    fn selected(&self) -> &[u64] {
        &self.selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::point;

    fn layer() -> MemoryLayer {
        let mut layer = MemoryLayer::new("patches", GeometryKind::Point, Crs::planar("local"))
            .with_field("A", FieldType::Integer)
            .with_field("B", FieldType::Integer)
            .with_field("name", FieldType::Text);
        for (a, b) in [(1, 10), (2, 20), (3, 10)] {
            layer.push_feature(
                Some(point!(x: a as f64, y: 0.0).into()),
                [
                    ("A", AttributeValue::Integer(a)),
                    ("B", AttributeValue::Integer(b)),
                    ("name", AttributeValue::from("patch")),
                ],
            );
        }
        layer
    }

    #[test]
    fn test_unique_numeric_fields() {
        assert_eq!(get_unique_numeric_fields(&layer()), vec!["A".to_string()]);
    }

    #[test]
    fn test_unique_fields_compare_values_as_ids() {
        let mut layer = MemoryLayer::new("patches", GeometryKind::Point, Crs::planar("local"))
            .with_field("whole", FieldType::Real)
            .with_field("fractional", FieldType::Real);
        for (whole, fractional) in [(1.0, 1.2), (2.0, 1.7), (3.0, 2.5)] {
            layer.push_feature(
                None,
                [
                    ("whole", AttributeValue::Real(whole)),
                    ("fractional", AttributeValue::Real(fractional)),
                ],
            );
        }

        assert_eq!(get_unique_numeric_fields(&layer), vec!["whole".to_string()]);
        let id: Option<i64> = get_numeric_attribute(&layer, &layer.features()[1], "whole").unwrap();
        assert_eq!(id, Some(2));
    }

    #[test]
    fn test_unique_fields_on_empty_layer_keeps_numeric_schema() {
        let empty = MemoryLayer::new("empty", GeometryKind::Point, Crs::planar("local"))
            .with_field("A", FieldType::Real)
            .with_field("label", FieldType::Text);
        assert_eq!(get_unique_numeric_fields(&empty), vec!["A".to_string()]);
    }

    #[test]
    fn test_selection_restricts_features() {
        let layer = layer().with_selection([0, 2]);
        let fids: Vec<u64> = get_features(&layer, true, None).iter().map(|f| f.fid).collect();
        assert_eq!(fids, vec![0, 2]);

        let all: Vec<u64> = get_features(&layer, false, None).iter().map(|f| f.fid).collect();
        assert_eq!(all, vec![0, 1, 2]);

        let filtered: Vec<u64> = get_features(&layer, true, Some(2)).iter().map(|f| f.fid).collect();
        assert_eq!(filtered, vec![2]);
    }

    #[test]
    fn test_empty_selection_falls_back_to_all_features() {
        let layer = layer();
        assert_eq!(get_features(&layer, true, None).len(), 3);
        assert_eq!(get_features(&layer, true, Some(1)).len(), 1);
    }

    #[test]
    fn test_numeric_attribute_coercion() {
        let mut layer = layer().with_field("weight", FieldType::Real);
        layer.push_feature(
            None,
            [
                ("weight", AttributeValue::Real(2.75)),
                ("A", AttributeValue::Null),
            ],
        );
        let feature = &layer.features()[3];

        let as_int: Result<Option<i64>> = get_numeric_attribute(&layer, feature, "weight");
        let as_real: Result<Option<f64>> = get_numeric_attribute(&layer, feature, "weight");
        assert!(matches!(as_int, Err(ProcessError::NonNumericAttribute { .. })));
        assert_eq!(as_real.unwrap(), Some(2.75));

        let null: Option<i64> = get_numeric_attribute(&layer, feature, "A").unwrap();
        assert_eq!(null, None);
    }

    #[test]
    fn test_missing_field_is_an_error() {
        let layer = layer();
        let feature = &layer.features()[0];
        let result: Result<Option<i64>> = get_numeric_attribute(&layer, feature, "missing");
        assert!(matches!(result, Err(ProcessError::InvalidAttribute { .. })));

        let text: Result<Option<f64>> = get_numeric_attribute(&layer, feature, "name");
        assert!(matches!(text, Err(ProcessError::NonNumericAttribute { .. })));
    }
}
