//! On-disk node configuration: a TOML file supplying defaults that
//! command-line flags may override, using a layered config style
//! (serde-derived struct, `toml::from_str`, CLI wins).

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Errors loading or parsing a node's configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("reading config file {path}: {source}")]
    Read {
        /// The path that failed to read.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file's contents were not valid TOML for this schema.
    #[error("parsing config file {path}: {source}")]
    Parse {
        /// The path that failed to parse.
        path: String,
        /// The underlying TOML error.
        #[source]
        source: toml::de::Error,
    },
}

/// Node configuration, loadable from a TOML file and overridable by CLI
/// flags (see [`crate::Cli`]).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct NodeConfig {
    /// Fabric device name this node binds to (e.g. `mlx5_0`).
    pub device: Option<String>,
    /// This node's own LID.
    pub lid: Option<u16>,
    /// Role bitmask (see [`ssa_types::NodeRole`]'s bit values).
    pub role: Option<u8>,
    /// Filesystem path to a local database snapshot, used by core-role
    /// nodes instead of pulling one from a parent.
    pub db_path: Option<String>,
    /// Initial join-retry backoff, in milliseconds.
    pub join_retry_initial_ms: Option<u64>,
    /// Join-retry backoff cap, in milliseconds.
    pub join_retry_cap_ms: Option<u64>,
    /// `tracing-subscriber` env-filter directive, e.g. `ssa_node=debug`.
    pub log_level: Option<String>,
}

impl NodeConfig {
    /// Load a configuration file. Returns a default (all-`None`)
    /// configuration if `path` does not exist, so a bare CLI invocation
    /// with no config file still works.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(NodeConfig::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}
