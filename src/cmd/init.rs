//! `slowrelay init` — generate a starter configuration file.
//!
//! Writes either a static template (minimal or fully documented) or, with
//! `--upstream`, a config serialized from [`ServerConfig`] for that
//! upstream and strategy.

use std::path::PathBuf;

use crate::cli::{ConfigFormat, InitArgs, StrategyKind};
use crate::config::model::ServerConfig;
use crate::config::overrides::Overrides;
use crate::error::RelayError;

pub fn execute(args: &InitArgs) -> Result<(), RelayError> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("slowrelay.{}", args.format.extension())));

    if output.exists() {
        return Err(RelayError::FileExists { path: output });
    }

    let content = match args.upstream {
        Some(ref upstream) => generated(upstream, args.strategy, &args.format)?,
        None => template(&args.format, args.full).to_string(),
    };

    std::fs::write(&output, content)?;
    println!("Created {}", output.display());
    Ok(())
}

const fn template(format: &ConfigFormat, full: bool) -> &'static str {
    match (format, full) {
        (ConfigFormat::Yaml, false) => YAML_MINIMAL,
        (ConfigFormat::Yaml, true) => YAML_FULL,
        (ConfigFormat::Json, false) => JSON_MINIMAL,
        (ConfigFormat::Json, true) => JSON_FULL,
        (ConfigFormat::Toml, false) => TOML_MINIMAL,
        (ConfigFormat::Toml, true) => TOML_FULL,
    }
}

fn generated(
    upstream: &str,
    strategy: Option<StrategyKind>,
    format: &ConfigFormat,
) -> Result<String, RelayError> {
    let mut config = ServerConfig::with_upstream(upstream);
    Overrides {
        strategy,
        ..Overrides::default()
    }
    .apply(&mut config);
    serialize_config(&config, format)
}

/// Serialize a `ServerConfig` to a formatted string in the given format.
pub fn serialize_config(
    config: &ServerConfig,
    format: &ConfigFormat,
) -> Result<String, RelayError> {
    match format {
        #[cfg(feature = "yaml")]
        ConfigFormat::Yaml => serde_yml::to_string(config)
            .map_err(|e| RelayError::Io(std::io::Error::other(e.to_string()))),

        #[cfg(not(feature = "yaml"))]
        ConfigFormat::Yaml => Err(RelayError::UnsupportedFormat("yaml".into())),

        ConfigFormat::Json => serde_json::to_string_pretty(config)
            .map_err(|e| RelayError::Io(std::io::Error::other(e.to_string()))),

        #[cfg(feature = "toml")]
        ConfigFormat::Toml => toml::to_string_pretty(config)
            .map_err(|e| RelayError::Io(std::io::Error::other(e.to_string()))),

        #[cfg(not(feature = "toml"))]
        ConfigFormat::Toml => Err(RelayError::UnsupportedFormat("toml".into())),
    }
}

const YAML_MINIMAL: &str = r#"# slowrelay config

upstream:
  url: "http://localhost:8001/"
"#;

const YAML_FULL: &str = r#"# slowrelay config
#
# All values shown are defaults unless noted. Every field can also be set
# on the command line (see `slowrelay run --help`).

# Address the relay listens on
listen: "0.0.0.0:8000"

upstream:
  # Base URL of the slow service; `?delay=<n>` is appended per request (required)
  url: "http://localhost:8001/"
  # timeout: 30000             # Per-request timeout in ms (connect + response + body)
  # pool_idle_timeout: 30      # Seconds before idle upstream connections are closed

# How requests are scheduled. The handler is identical under every strategy.
strategy:
  kind: cooperative            # One thread, one task per connection
  # kind: single-threaded      # One request at a time
  # kind: thread-pool          # N threads, one request per thread
  # threads: 4
  # kind: process-pool         # M processes x N threads (unix only)
  # processes: 2
  # threads: 4

# limits:
#   max_body: 1048576          # Max request body in bytes
#   backlog: 1024              # listen(2) backlog
#   header_read_timeout: 10000 # ms a blocking worker waits for request headers
"#;

const JSON_MINIMAL: &str = r#"{
  "upstream": {
    "url": "http://localhost:8001/"
  }
}
"#;

const JSON_FULL: &str = r#"{
  "listen": "0.0.0.0:8000",
  "upstream": {
    "url": "http://localhost:8001/",
    "timeout": 30000,
    "pool_idle_timeout": 30
  },
  "strategy": {
    "kind": "thread-pool",
    "threads": 4
  },
  "limits": {
    "max_body": 1048576,
    "backlog": 1024,
    "header_read_timeout": 10000
  }
}
"#;

const TOML_MINIMAL: &str = r#"# slowrelay config

[upstream]
url = "http://localhost:8001/"
"#;

const TOML_FULL: &str = r#"# slowrelay config
#
# All values shown are defaults unless noted.

# Address the relay listens on
listen = "0.0.0.0:8000"

[upstream]
# Base URL of the slow service; `?delay=<n>` is appended per request (required)
url = "http://localhost:8001/"
# timeout = 30000            # Per-request timeout in ms
# pool_idle_timeout = 30     # Seconds before idle upstream connections are closed

[strategy]
kind = "cooperative"         # single-threaded | thread-pool | process-pool | cooperative
# threads = 4                # thread-pool, process-pool
# processes = 2              # process-pool (unix only)

# [limits]
# max_body = 1048576
# backlog = 1024
# header_read_timeout = 10000
"#;
