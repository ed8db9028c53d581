//! Engine configuration.
//!
//! Configuration is loaded from environment variables with defaults suitable
//! for an embedded, single-process engine. The role algebra itself can be
//! supplied as a JSON document; without one the standard algebra is used.

use rolegraph_events::DEFAULT_SOURCE;
use rolegraph_rbac::{AlgebraError, RoleAlgebra};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },

    /// The algebra file could not be read.
    #[error("Cannot read role algebra from {path}: {source}")]
    Read {
        /// File that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The algebra file was read but is not a valid algebra.
    #[error(transparent)]
    Algebra(#[from] AlgebraError),
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Per-topic buffer of the in-memory event bus.
    pub event_capacity: usize,

    /// Whether committed mutations are published as events.
    pub publish_events: bool,

    /// Source stamped on published events.
    pub event_source: String,

    /// Whether snapshots must carry exactly the implicit grants their
    /// explicit grants derive.
    pub verify_on_load: bool,

    /// JSON role algebra. `None` selects the standard algebra.
    pub algebra_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_capacity: 1024,
            publish_events: true,
            event_source: DEFAULT_SOURCE.to_string(),
            verify_on_load: false,
            algebra_path: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `ROLEGRAPH_EVENT_CAPACITY`: Event buffer per topic (default: 1024)
    /// - `ROLEGRAPH_PUBLISH_EVENTS`: Publish change events (default: true)
    /// - `ROLEGRAPH_EVENT_SOURCE`: Source of published events (default: rolegraph)
    /// - `ROLEGRAPH_VERIFY_ON_LOAD`: Reject snapshots with stale implicit grants (default: false)
    /// - `ROLEGRAPH_ALGEBRA_PATH`: Path to a JSON role algebra
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            event_capacity: std::env::var("ROLEGRAPH_EVENT_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.event_capacity),
            publish_events: std::env::var("ROLEGRAPH_PUBLISH_EVENTS")
                .map(|s| s != "false" && s != "0")
                .unwrap_or(default.publish_events),
            event_source: std::env::var("ROLEGRAPH_EVENT_SOURCE").unwrap_or(default.event_source),
            verify_on_load: std::env::var("ROLEGRAPH_VERIFY_ON_LOAD")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(default.verify_on_load),
            algebra_path: std::env::var_os("ROLEGRAPH_ALGEBRA_PATH").map(PathBuf::from),
        }
    }

    /// Check values that cannot be expressed by the types alone.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "event_capacity".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.event_source.is_empty() || self.event_source.contains('.') {
            return Err(ConfigError::InvalidValue {
                key: "event_source".to_string(),
                message: "must be a single non-empty topic segment".to_string(),
            });
        }
        Ok(())
    }

    /// The configured role algebra.
    pub fn load_algebra(&self) -> Result<RoleAlgebra, ConfigError> {
        let Some(path) = &self.algebra_path else {
            return Ok(RoleAlgebra::standard());
        };

        let document = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Ok(RoleAlgebra::from_json(&document)?)
    }
}
