//! Serde data structures for the slowrelay configuration file.
//!
//! Contains [`ServerConfig`] (the root), [`UpstreamConfig`],
//! [`Strategy`] and [`Limits`]. Structs derive `Serialize` and
//! `Deserialize` with `deny_unknown_fields` for strict parsing.

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RelayError;

pub const DEFAULT_LISTEN: &str = "0.0.0.0:8000";
pub const DEFAULT_THREADS: usize = 4;
pub const DEFAULT_PROCESSES: usize = 2;

const fn default_timeout() -> u64 {
    30_000
}

const fn default_pool_idle_timeout() -> u64 {
    30
}

const fn default_max_body() -> usize {
    1_048_576
}

const fn default_backlog() -> u32 {
    1024
}

const fn default_header_read_timeout() -> u64 {
    10_000
}

const fn default_threads() -> usize {
    DEFAULT_THREADS
}

const fn default_processes() -> usize {
    DEFAULT_PROCESSES
}

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

fn is_default_listen(v: &str) -> bool {
    v == DEFAULT_LISTEN
}

fn is_default_timeout(v: &u64) -> bool {
    *v == default_timeout()
}

fn is_default_pool_idle_timeout(v: &u64) -> bool {
    *v == default_pool_idle_timeout()
}

fn is_default_strategy(v: &Strategy) -> bool {
    *v == Strategy::default()
}

fn is_default_limits(v: &Limits) -> bool {
    *v == Limits::default()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_listen", skip_serializing_if = "is_default_listen")]
    pub listen: String,

    pub upstream: UpstreamConfig,

    #[serde(default, skip_serializing_if = "is_default_strategy")]
    pub strategy: Strategy,

    #[serde(default, skip_serializing_if = "is_default_limits")]
    pub limits: Limits,
}

impl ServerConfig {
    /// A config with every default and the given upstream.
    #[must_use]
    pub fn with_upstream(url: impl Into<String>) -> Self {
        Self {
            listen: default_listen(),
            upstream: UpstreamConfig {
                url: url.into(),
                timeout: default_timeout(),
                pool_idle_timeout: default_pool_idle_timeout(),
            },
            strategy: Strategy::default(),
            limits: Limits::default(),
        }
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, RelayError> {
        Ok(self.listen.parse()?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    pub url: String,

    /// Per-request timeout in milliseconds, covering connect and body.
    #[serde(
        default = "default_timeout",
        skip_serializing_if = "is_default_timeout"
    )]
    pub timeout: u64,

    /// Idle pooled connections are closed after this many seconds.
    #[serde(
        default = "default_pool_idle_timeout",
        skip_serializing_if = "is_default_pool_idle_timeout"
    )]
    pub pool_idle_timeout: u64,
}

impl UpstreamConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }
}

/// How the serving harness schedules requests.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Strategy {
    SingleThreaded,
    ThreadPool {
        #[serde(default = "default_threads")]
        threads: usize,
    },
    ProcessPool {
        #[serde(default = "default_processes")]
        processes: usize,
        #[serde(default = "default_threads")]
        threads: usize,
    },
    #[default]
    Cooperative,
}

impl Strategy {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SingleThreaded => "single-threaded",
            Self::ThreadPool { .. } => "thread-pool",
            Self::ProcessPool { .. } => "process-pool",
            Self::Cooperative => "cooperative",
        }
    }

    /// Human-readable shape, e.g. `process-pool (2 x 4)`.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::ThreadPool { threads } => format!("thread-pool ({threads} threads)"),
            Self::ProcessPool { processes, threads } => {
                format!("process-pool ({processes} processes x {threads} threads)")
            }
            other => other.name().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Limits {
    #[serde(default = "default_max_body")]
    pub max_body: usize,

    /// Listen backlog passed to `listen(2)`.
    #[serde(default = "default_backlog")]
    pub backlog: u32,

    /// Milliseconds a blocking worker waits for request headers before
    /// dropping the connection.
    #[serde(default = "default_header_read_timeout")]
    pub header_read_timeout: u64,
}

impl Limits {
    #[must_use]
    pub const fn header_read_timeout(&self) -> Duration {
        Duration::from_millis(self.header_read_timeout)
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_body: default_max_body(),
            backlog: default_backlog(),
            header_read_timeout: default_header_read_timeout(),
        }
    }
}
