//! Configuration validation with detailed error reporting.
//!
//! The [`validate`] function checks a parsed [`ServerConfig`] for
//! structural errors such as an unparsable listen address, a malformed
//! upstream URL, an out-of-range timeout or pool size, and strategies the
//! current platform cannot run. Returns a list of [`ValidationError`]
//! values with per-field suggestions.

use std::net::SocketAddr;

use url::Url;

use super::model::{ServerConfig, Strategy};
use crate::error::ValidationError;

pub const MAX_THREADS: usize = 1024;
pub const MAX_PROCESSES: usize = 256;
pub const MAX_TIMEOUT_MS: u64 = 600_000;

/// Validate the upstream base URL. Returns `Ok(())` or a human-readable error.
pub fn validate_upstream_url(url: &str) -> Result<(), String> {
    match Url::parse(url) {
        Ok(parsed) => {
            let scheme = parsed.scheme();
            if scheme != "http" && scheme != "https" {
                Err(format!(
                    "unsupported scheme '{scheme}' (expected http or https)"
                ))
            } else if parsed.host_str().map_or(true, str::is_empty) {
                Err("URL has no host".into())
            } else if parsed.query().is_some() {
                Err("URL must not carry a query string".into())
            } else {
                Ok(())
            }
        }
        Err(_) => Err(format!("'{url}' is not a valid URL")),
    }
}

fn validate_pool_size(
    errors: &mut Vec<ValidationError>,
    field: &str,
    value: usize,
    max: usize,
) {
    if value == 0 || value > max {
        errors.push(ValidationError {
            field: field.into(),
            message: format!("must be between 1 and {max}, got {value}"),
            suggestion: None,
        });
    }
}

pub fn validate(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listen.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError {
            field: "listen".into(),
            message: format!("'{}' is not a socket address", config.listen),
            suggestion: config
                .listen
                .parse::<u16>()
                .ok()
                .map(|port| format!("did you mean '0.0.0.0:{port}'?")),
        });
    }

    if let Err(msg) = validate_upstream_url(&config.upstream.url) {
        errors.push(ValidationError {
            field: "upstream.url".into(),
            message: msg,
            suggestion: if config.upstream.url.contains("://") {
                None
            } else {
                Some(format!("did you mean 'http://{}'?", config.upstream.url))
            },
        });
    }

    if config.upstream.timeout == 0 || config.upstream.timeout > MAX_TIMEOUT_MS {
        errors.push(ValidationError {
            field: "upstream.timeout".into(),
            message: format!(
                "must be between 1 and {MAX_TIMEOUT_MS} milliseconds, got {}",
                config.upstream.timeout
            ),
            suggestion: None,
        });
    }

    match config.strategy {
        Strategy::SingleThreaded | Strategy::Cooperative => {}
        Strategy::ThreadPool { threads } => {
            validate_pool_size(&mut errors, "strategy.threads", threads, MAX_THREADS);
        }
        Strategy::ProcessPool { processes, threads } => {
            validate_pool_size(
                &mut errors,
                "strategy.processes",
                processes,
                MAX_PROCESSES,
            );
            validate_pool_size(&mut errors, "strategy.threads", threads, MAX_THREADS);
            if !cfg!(unix) {
                errors.push(ValidationError {
                    field: "strategy.kind".into(),
                    message: "process-pool requires SO_REUSEPORT, which this platform lacks"
                        .into(),
                    suggestion: Some("use 'thread-pool' instead".into()),
                });
            }
        }
    }

    if config.limits.max_body == 0 {
        errors.push(ValidationError {
            field: "limits.max_body".into(),
            message: "must be greater than zero".into(),
            suggestion: None,
        });
    }

    if config.limits.header_read_timeout == 0
        || config.limits.header_read_timeout > MAX_TIMEOUT_MS
    {
        errors.push(ValidationError {
            field: "limits.header_read_timeout".into(),
            message: format!(
                "must be between 1 and {MAX_TIMEOUT_MS} milliseconds, got {}",
                config.limits.header_read_timeout
            ),
            suggestion: None,
        });
    }

    if config.limits.backlog == 0 {
        errors.push(ValidationError {
            field: "limits.backlog".into(),
            message: "must be greater than zero".into(),
            suggestion: None,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[must_use]
pub fn format_validation_report(path: &str, config: &ServerConfig) -> String {
    let lines = [
        format!("  listen:    {}", config.listen),
        format!("  upstream:  {}", config.upstream.url),
        format!("  timeout:   {}ms", config.upstream.timeout),
        format!("  strategy:  {}", config.strategy.describe()),
        format!("  max body:  {} bytes", config.limits.max_body),
    ];

    format!("{} is valid\n{}", path, lines.join("\n"))
}
