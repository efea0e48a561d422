use std::marker::PhantomData;

use geojson::{FeatureCollection, Geometry, JsonObject, JsonValue};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Maximum length of the node id attributes of a distance line
pub const NODE_FIELD_WIDTH: usize = 255;

/// Properties of a distance line feature
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, JsonSchema)]
#[schemars(description = "Properties of a line linking two nodes")]
pub struct DistanceLineProperties {
    #[serde(rename = "From_Node")]
    #[schemars(description = "Id of the node the line starts at")]
    pub from_node: String,
    #[serde(rename = "To_Node")]
    #[schemars(description = "Id of the node the line ends at")]
    pub to_node: String,
    #[schemars(description = "Distance between the two nodes")]
    pub distance: f64,
}

impl DistanceLineProperties {
    pub fn new(from_node: i64, to_node: i64, distance: f64) -> Self {
        Self {
            from_node: truncate(from_node.to_string()),
            to_node: truncate(to_node.to_string()),
            distance,
        }
    }
}

fn truncate(mut value: String) -> String {
    if value.len() > NODE_FIELD_WIDTH {
        value.truncate(NODE_FIELD_WIDTH);
    }
    value
}

/// Type alias for a distance line layer
pub type DistanceLines = TypedFeatureCollection<DistanceLineProperties>;

/// A GeoJSON Feature that is generic over its properties.
#[derive(Debug, Clone)]
pub struct TypedFeature<P> {
    pub feature: geojson::Feature,
    _properties: PhantomData<P>,
}

impl<P> TypedFeature<P>
where
    for<'de> P: Serialize + Deserialize<'de>,
{
    pub fn new(geometry: Option<Geometry>, properties: P) -> Result<Self> {
        let properties = match serde_json::to_value(properties)? {
            JsonValue::Object(object) => Some(object),
            _ => None,
        };
        let feature = geojson::Feature {
            bbox: None,
            geometry,
            id: None,
            properties,
            foreign_members: None,
        };
        Ok(Self {
            feature,
            _properties: PhantomData,
        })
    }

    /// Typed view of the properties, if they match `P`
    pub fn properties(&self) -> Option<P> {
        self.feature
            .properties
            .as_ref()
            .and_then(|p| serde_json::from_value(JsonValue::Object(p.clone())).ok())
    }
}

#[derive(Debug, Clone)]
pub struct TypedFeatureCollection<P> {
    pub features: Vec<TypedFeature<P>>,
    pub foreign_members: Option<JsonObject>,
}

impl<P> Default for TypedFeatureCollection<P> {
    fn default() -> Self {
        Self {
            features: Vec::new(),
            foreign_members: None,
        }
    }
}

impl<P> TypedFeatureCollection<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, feature: TypedFeature<P>) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn features(&self) -> &[TypedFeature<P>] {
        &self.features
    }

    /// Attach a top-level member next to `features`
    pub fn set_foreign_member(&mut self, key: &str, value: JsonValue) {
        self.foreign_members
            .get_or_insert_with(JsonObject::new)
            .insert(key.to_string(), value);
    }

    pub fn foreign_member(&self, key: &str) -> Option<&JsonValue> {
        self.foreign_members.as_ref().and_then(|m| m.get(key))
    }
}

impl<P> From<TypedFeatureCollection<P>> for FeatureCollection {
    fn from(collection: TypedFeatureCollection<P>) -> Self {
        FeatureCollection {
            bbox: None,
            features: collection.features.into_iter().map(|f| f.feature).collect(),
            foreign_members: collection.foreign_members,
        }
    }
}

impl<P> From<FeatureCollection> for TypedFeatureCollection<P> {
    fn from(collection: FeatureCollection) -> Self {
        Self {
            features: collection
                .features
                .into_iter()
                .map(|feature| TypedFeature {
                    feature,
                    _properties: PhantomData,
                })
                .collect(),
            foreign_members: collection.foreign_members,
        }
    }
}
