use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Field '{field}' does not exist in layer '{layer}'")]
    InvalidAttribute { field: String, layer: String },

    #[error("Field '{field}' holds a non-numeric value: {value}")]
    NonNumericAttribute { field: String, value: String },

    #[error("Invalid geometry for feature {feature}: {reason}")]
    InvalidFeature { feature: String, reason: String },

    #[error("Node {id} has a negative attribute value ({value}); node weights must be >= 0")]
    NegativeAttribute { id: i64, value: f64 },

    #[error("Identifier {id} is not unique in layer '{layer}'")]
    DuplicateIdentifier { id: i64, layer: String },

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Coordinate transformation error: {0}")]
    Transform(String),

    #[error("Processing cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error(transparent)]
    Common(#[from] conefor_common::CommonError),
}

impl ProcessError {
    /// Input errors that make the whole connectivity network meaningless
    pub fn is_fatal_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidAttribute { .. }
                | Self::NonNumericAttribute { .. }
                | Self::InvalidFeature { .. }
                | Self::NegativeAttribute { .. }
                | Self::DuplicateIdentifier { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ProcessError>;
