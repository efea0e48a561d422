//! # Conefor Common - Shared Types and Utilities
//!
//! Foundational pieces shared by the input generator, the Conefor driver and
//! the command line front-end.
//!
//! ## Example
//!
//! ```rust
//! use conefor_common::{CancellationToken, EventBus, Event};
//!
//! let bus = EventBus::new();
//! let events = bus.subscribe();
//! bus.progress(40);
//!
//! let token = CancellationToken::new();
//! assert!(!token.is_cancelled());
//! assert!(matches!(events.try_recv(), Ok(Event::Progress(40))));
//! ```

pub mod events;
pub mod settings;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use thiserror::Error;

// Re-exports for convenience
pub use events::{Event, EventBus, InfoSection, Outcome};
pub use settings::Settings;

/// Result type for shared operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Standard error type for shared operations
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Settings write error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

/// Cooperative stop flag shared between a worker and whoever started it.
///
/// The worker polls [`CancellationToken::is_cancelled`] at iteration
/// boundaries and returns early when it flips.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    stopped: Arc<Mutex<bool>>,
}

impl CancellationToken {
    /// Create a token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the worker to stop
    pub fn cancel(&self) {
        match self.stopped.lock() {
            Ok(mut stopped) => *stopped = true,
            Err(poisoned) => *poisoned.into_inner() = true,
        }
    }

    /// Check whether a stop was requested
    pub fn is_cancelled(&self) -> bool {
        match self.stopped.lock() {
            Ok(stopped) => *stopped,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Path helpers shared by every component that writes into a user directory
pub mod paths {
    use super::*;

    /// Resolve a path for `file_name` inside `dir` that does not exist yet.
    ///
    /// When `file_name` is taken, `_1`, `_2`, ... is appended before the
    /// extension until a free name is found.
    pub fn unique_path(dir: &Path, file_name: &str) -> PathBuf {
        let candidate = dir.join(file_name);
        if !candidate.exists() {
            return candidate;
        }

        let name = Path::new(file_name);
        let stem = name
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.to_string());
        let extension = name.extension().map(|e| e.to_string_lossy().into_owned());

        let mut suffix = 1u32;
        loop {
            let file_name = match &extension {
                Some(ext) => format!("{}_{}.{}", stem, suffix, ext),
                None => format!("{}_{}", stem, suffix),
            };
            let candidate = dir.join(file_name);
            if !candidate.exists() {
                return candidate;
            }
            suffix += 1;
        }
    }

    /// Ensure output directory exists
    pub fn ensure_dir(path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)?;
        Ok(())
    }

    /// Append `extension` to `stem` unless it already carries one
    pub fn with_default_extension(stem: &str, extension: &str) -> String {
        if Path::new(stem).extension().is_some() {
            stem.to_string()
        } else {
            format!("{}.{}", stem, extension)
        }
    }
}
