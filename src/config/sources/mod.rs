//! File-backed config sources and the worker hand-off channel.
//!
//! Provides file-based sources (YAML, JSON, TOML) gated by feature flags,
//! [`parse_config_str`] for format-specific deserialization, and the
//! environment hand-off used by process-pool workers, which receive the
//! supervisor's already-resolved config instead of re-resolving it.

pub mod file_source;

#[cfg(feature = "yaml")]
pub mod yaml;

#[cfg(feature = "json")]
pub mod json;

#[cfg(feature = "toml")]
pub mod toml_source;

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::config::model::ServerConfig;
use crate::error::RelayError;
use file_source::FileSource;

/// Environment variable carrying the resolved config (JSON) to pool workers.
pub const WORKER_CONFIG_ENV: &str = "SLOWRELAY_WORKER_CONFIG";

/// Parse a config string based on file extension.
pub fn parse_config_str(
    ext: &str,
    content: &str,
    path_display: &str,
) -> Result<ServerConfig, RelayError> {
    match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => serde_yml::from_str(content).map_err(|e| RelayError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        #[cfg(feature = "json")]
        "json" => serde_json::from_str(content).map_err(|e| RelayError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        #[cfg(feature = "toml")]
        "toml" => toml::from_str(content).map_err(|e| RelayError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        other => Err(RelayError::UnsupportedFormat(other.to_string())),
    }
}

/// Pick the [`FileSource`] matching the file extension.
pub fn file_source_for(path: &Path) -> Result<FileSource, RelayError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => Ok(yaml::new(path.to_path_buf())),

        #[cfg(feature = "json")]
        "json" => Ok(json::new(path.to_path_buf())),

        #[cfg(feature = "toml")]
        "toml" => Ok(toml_source::new(path.to_path_buf())),

        other => Err(RelayError::UnsupportedFormat(other.to_string())),
    }
}

/// Compute a lowercase hex-encoded SHA-256 digest.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Serialize a resolved config for [`WORKER_CONFIG_ENV`].
pub fn to_worker_env(config: &ServerConfig) -> Result<String, RelayError> {
    serde_json::to_string(config).map_err(|e| RelayError::ConfigParse {
        path: format!("${WORKER_CONFIG_ENV}"),
        source: Box::new(e),
    })
}

/// Read the config a supervisor handed to this worker process.
pub fn from_worker_env() -> Result<ServerConfig, RelayError> {
    let raw = std::env::var(WORKER_CONFIG_ENV).map_err(|_| RelayError::NoUpstream {
        hint: format!(
            "{WORKER_CONFIG_ENV} is not set; 'worker' is started by 'slowrelay run' \
             with a process-pool strategy and is not meant to be run by hand."
        ),
    })?;
    serde_json::from_str(&raw).map_err(|e| RelayError::ConfigParse {
        path: format!("${WORKER_CONFIG_ENV}"),
        source: Box::new(e),
    })
}
