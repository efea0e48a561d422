//! # Conefor Driver
//!
//! Runs the Conefor connectivity tool on generated node and connection files
//! and collects its results.
//!
//! ```rust,no_run
//! use conefor_common::EventBus;
//! use conefor_driver::{ConeforDriver, ConeforOptions, ConnectivityIndex};
//!
//! let options = ConeforOptions::new("out/nodes.txt", "out/distances.txt")
//!     .with_indices([ConnectivityIndex::IIC, ConnectivityIndex::PC])
//!     .with_threshold(1000.0)
//!     .with_probability(0.5);
//!
//! let results = ConeforDriver::find()?.run(&options, "out".as_ref(), &EventBus::new())?;
//! # Ok::<(), conefor_driver::DriverError>(())
//! ```

pub mod driver;
pub mod index;
pub mod merge;
pub mod options;

use thiserror::Error;

pub use driver::ConeforDriver;
pub use index::{ConnectivityIndex, INDEX_RULES, IndexKind, IndexRule};
pub use options::{ConeforOptions, ConnectionType};

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Failed to initialize driver: {0}")]
    Initialization(String),
    #[error("Conefor execution failed: {0}")]
    Execution(String),
    #[error("Invalid Conefor options: {0}")]
    InvalidOptions(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Common(#[from] conefor_common::CommonError),
}
