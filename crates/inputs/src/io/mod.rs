//! Reading layers and persisting Conefor inputs.

pub mod geojson;
pub mod text;
pub mod vector;

pub use self::geojson::{load_layer, parse_layer};
