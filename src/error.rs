//! Unified error types for slowrelay.
//!
//! Defines [`RelayError`] (process-level failures: config, startup,
//! serving), [`ForwardError`] (the per-request taxonomy that is always
//! turned into an HTTP response) and [`ValidationError`] for config
//! validation failures. All use `thiserror` or hand-written `Display`
//! impls with contextual hints.

use std::path::PathBuf;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "  {}: {}", self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({suggestion})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

fn format_errors(errors: &[ValidationError]) -> String {
    use std::fmt::Write;
    let mut buf = String::new();
    for (i, e) in errors.iter().enumerate() {
        if i > 0 {
            buf.push('\n');
        }
        // write! to String is infallible (only fails on OOM which is unrecoverable)
        let _ = write!(buf, "{e}");
    }
    buf
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RelayError {
    #[error("No upstream configured.\n\n  {hint}")]
    NoUpstream { hint: String },

    #[error("Config file not found: {}", path.display())]
    ConfigFileNotFound { path: PathBuf },

    #[error("Config parse error in {path}:\n  {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Config validation failed:\n{}", format_errors(.errors))]
    ConfigValidation { errors: Vec<ValidationError> },

    #[error("Unsupported config format: '{0}'")]
    UnsupportedFormat(String),

    #[error("Invalid address: {0}")]
    AddressParse(#[from] std::net::AddrParseError),

    #[error("Invalid URI: {source}")]
    UriParse {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("HTTP request failed: {source}")]
    HttpRequest {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("File already exists: {}", path.display())]
    FileExists { path: PathBuf },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Health check failed with status {0}")]
    HealthCheckFailed(hyper::StatusCode),

    #[error("Worker {worker} panicked")]
    WorkerPanicked { worker: String },

    #[error("Worker {worker} exited {failures} times in a row right after starting; giving up")]
    WorkerCrashLoop { worker: usize, failures: u32 },

    #[error("Strategy '{0}' must be run through the process supervisor")]
    UnsupportedStrategy(&'static str),
}

/// Failure of a single forwarded request.
///
/// Every variant maps to exactly one status code via [`ForwardError::status`]
/// and is rendered as a plain-text body. Nothing of this type escapes the
/// request that produced it.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("invalid 'delay' parameter {value:?}: {reason}")]
    InvalidParameter { value: String, reason: &'static str },

    #[error("upstream unavailable: {source}")]
    UpstreamUnavailable {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("upstream responded with status {status}")]
    UpstreamStatus { status: StatusCode },

    #[error("upstream did not respond within {}ms", timeout.as_millis())]
    UpstreamTimeout { timeout: Duration },

    #[error("internal fault: {0}")]
    InternalFault(String),
}

impl ForwardError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidParameter { .. } => StatusCode::BAD_REQUEST,
            Self::UpstreamUnavailable { .. } | Self::UpstreamStatus { .. } => {
                StatusCode::BAD_GATEWAY
            }
            Self::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::InternalFault(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-friendly label used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidParameter { .. } => "invalid_parameter",
            Self::UpstreamUnavailable { .. } => "upstream_unavailable",
            Self::UpstreamStatus { .. } => "upstream_status",
            Self::UpstreamTimeout { .. } => "upstream_timeout",
            Self::InternalFault(_) => "internal_fault",
        }
    }
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> Response {
        (self.status(), format!("{self}\n")).into_response()
    }
}
