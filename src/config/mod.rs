//! Configuration loading, overriding and validation.
//!
//! A [`ServerConfig`] is assembled exactly once at startup by [`resolve`]:
//! an optional file (explicit or auto-detected) provides the base, CLI and
//! environment [`Overrides`] are layered on top, and the result is
//! validated and frozen inside a [`LoadedConfig`]. Nothing reads the
//! environment after that point.

pub mod model;
pub mod overrides;
pub mod sources;
pub mod validation;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use url::Url;

use crate::error::RelayError;
use model::ServerConfig;
pub use overrides::Overrides;

/// File names tried in the working directory when `--config` is absent.
pub const CANDIDATES: &[&str] = &[
    "slowrelay.yaml",
    "slowrelay.yml",
    "slowrelay.json",
    "slowrelay.toml",
];

/// The validated, immutable configuration shared by every worker.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: Arc<ServerConfig>,
    pub source_name: String,
    /// `upstream.url`, parsed once so requests only append `delay`.
    pub upstream_url: Url,
    /// SHA-256 of the canonical JSON form; identical across pool workers.
    pub digest: String,
}

impl LoadedConfig {
    pub fn new(config: ServerConfig, source_name: impl Into<String>) -> Result<Self, RelayError> {
        if let Err(errors) = validation::validate(&config) {
            return Err(RelayError::ConfigValidation { errors });
        }
        let upstream_url =
            Url::parse(&config.upstream.url).map_err(|e| RelayError::UriParse {
                source: Box::new(e),
            })?;
        let canonical = serde_json::to_string(&config).map_err(|e| RelayError::ConfigParse {
            path: "(resolved config)".into(),
            source: Box::new(e),
        })?;
        Ok(Self {
            config: Arc::new(config),
            source_name: source_name.into(),
            upstream_url,
            digest: sources::sha256_hex(canonical.as_bytes()),
        })
    }

    /// First eight hex digits of the digest, for logs and health output.
    #[must_use]
    pub fn short_digest(&self) -> &str {
        self.digest.get(..8).unwrap_or(&self.digest)
    }
}

pub async fn resolve(
    explicit: Option<&Path>,
    overrides: &Overrides,
) -> Result<LoadedConfig, RelayError> {
    let (mut config, source_name) = match resolve_file(explicit).await? {
        Some(path) => {
            let source = sources::file_source_for(&path)?;
            let config = source.load().await?;
            (config, source.name().to_string())
        }
        None => {
            let Some(ref url) = overrides.upstream else {
                return Err(RelayError::NoUpstream {
                    hint: "Provide --upstream <url> (or UPSTREAM_URL) or a config file.\n  \
                           Run 'slowrelay init' to create a config file."
                        .into(),
                });
            };
            (ServerConfig::with_upstream(url.clone()), "cli".to_string())
        }
    };

    overrides.apply(&mut config);
    LoadedConfig::new(config, source_name)
}

async fn resolve_file(explicit: Option<&Path>) -> Result<Option<PathBuf>, RelayError> {
    if let Some(path) = explicit {
        return Ok(Some(path.to_path_buf()));
    }

    for name in CANDIDATES {
        let path = PathBuf::from(name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::info!(path = %path.display(), "auto-detected config file");
            return Ok(Some(path));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::Strategy;

    #[tokio::test]
    async fn cli_only_config_requires_upstream() {
        let err = resolve(None, &Overrides::default()).await;
        // The working directory of the test run has no slowrelay.* files.
        assert!(matches!(err, Err(RelayError::NoUpstream { .. })));
    }

    #[tokio::test]
    async fn cli_only_config_uses_defaults() {
        let overrides = Overrides {
            upstream: Some("http://127.0.0.1:8001/".into()),
            ..Overrides::default()
        };
        let loaded = resolve(None, &overrides).await.unwrap();
        assert_eq!(loaded.source_name, "cli");
        assert_eq!(loaded.config.strategy, Strategy::Cooperative);
        assert_eq!(loaded.short_digest().len(), 8);
    }

    #[test]
    fn upstream_url_is_parsed_once_at_load() {
        let loaded =
            LoadedConfig::new(ServerConfig::with_upstream("http://slow_api:8001"), "test").unwrap();
        assert_eq!(loaded.upstream_url.as_str(), "http://slow_api:8001/");
        assert_eq!(loaded.upstream_url.port(), Some(8001));
    }

    #[test]
    fn invalid_config_is_rejected_before_freezing() {
        let config = ServerConfig::with_upstream("not a url");
        assert!(matches!(
            LoadedConfig::new(config, "test"),
            Err(RelayError::ConfigValidation { .. })
        ));
    }

    #[test]
    fn digest_depends_only_on_content() {
        let a = LoadedConfig::new(ServerConfig::with_upstream("http://a/"), "yaml").unwrap();
        let b = LoadedConfig::new(ServerConfig::with_upstream("http://a/"), "worker").unwrap();
        let c = LoadedConfig::new(ServerConfig::with_upstream("http://b/"), "yaml").unwrap();
        assert_eq!(a.digest, b.digest);
        assert_ne!(a.digest, c.digest);
    }
}
