//! Command-line interface definitions using clap derive macros.
//!
//! Contains the top-level [`Cli`] parser, the [`Commands`] enum for
//! subcommands (run, slow-api, init, validate, health and the hidden
//! worker) and their associated argument structs. Every `run` flag has an
//! environment variable equivalent for container deployments.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("SLOWRELAY_GIT_SHORT"),
    ", ",
    env!("SLOWRELAY_BUILD_PROFILE"),
    ")"
);

#[derive(Parser)]
#[command(
    name = "slowrelay",
    version,
    long_version = LONG_VERSION,
    about = "HTTP forwarding service with pluggable concurrency harnesses",
    propagate_version = true,
    after_help = "\x1b[1mQuick start:\x1b[0m\n  \
        slowrelay slow-api -p 8001                              Start a slow upstream\n  \
        slowrelay run --upstream http://localhost:8001/         Relay to it (cooperative)\n  \
        slowrelay run --strategy thread-pool --threads 8 ...    Same handler, other harness"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the forwarding service
    Run(Box<RunArgs>),

    /// Start the slow upstream simulator
    SlowApi(SlowApiArgs),

    /// Generate a starter config file
    Init(InitArgs),

    /// Validate a config file without starting
    Validate(ValidateArgs),

    /// Check health of a running instance
    Health(HealthArgs),

    /// Process-pool worker (started by `run`)
    #[command(hide = true)]
    Worker(WorkerArgs),
}

#[derive(Args, Clone, Debug)]
pub struct LogArgs {
    /// Log level
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Force pretty (human-readable) log output
    #[arg(long)]
    pub pretty: bool,

    /// Force JSON log output (overrides TTY detection)
    #[arg(long, conflicts_with = "pretty")]
    pub json: bool,
}

#[derive(Args)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m\n  \
        slowrelay run                                              Auto-detect config\n  \
        slowrelay run -c relay.yaml                                Specific config file\n  \
        slowrelay run --upstream http://slow_api:8001/ -p 8000     No config file\n  \
        slowrelay run --strategy process-pool --processes 4 --threads 8")]
pub struct RunArgs {
    /// Config file path (.yaml, .json, .toml)
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Listen port [default: 8000]
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Listen address [default: 0.0.0.0]
    #[arg(long, env = "HOST")]
    pub host: Option<IpAddr>,

    /// Upstream base URL, e.g. http://slow_api:8001/
    #[arg(short, long, env = "UPSTREAM_URL")]
    pub upstream: Option<String>,

    // -- Concurrency --
    /// Serving strategy [default: cooperative]
    #[arg(short, long, env = "STRATEGY", help_heading = "Concurrency")]
    pub strategy: Option<StrategyKind>,

    /// Threads per pool (thread-pool, process-pool) [default: 4]
    #[arg(short, long, env = "THREADS", help_heading = "Concurrency")]
    pub threads: Option<usize>,

    /// Worker processes (process-pool) [default: 2]
    #[arg(long, env = "PROCESSES", help_heading = "Concurrency")]
    pub processes: Option<usize>,

    // -- Logging --
    #[command(flatten)]
    pub log: LogArgs,

    // -- Observability --
    /// Sentry DSN (enables error tracking)
    #[cfg(feature = "sentry-integration")]
    #[arg(long, env = "SENTRY_DSN", help_heading = "Observability")]
    pub sentry_dsn: Option<String>,

    /// Sentry environment tag
    #[cfg(feature = "sentry-integration")]
    #[arg(long, env = "SENTRY_ENVIRONMENT", help_heading = "Observability")]
    pub sentry_environment: Option<String>,

    // -- Tuning --
    /// Per-request upstream timeout in milliseconds [default: 30000]
    #[arg(long, env = "REQUEST_TIMEOUT_MS", help_heading = "Tuning")]
    pub timeout: Option<u64>,

    /// Max request body size in bytes [default: 1048576]
    #[arg(long, env = "MAX_BODY_SIZE", help_heading = "Tuning")]
    pub max_body: Option<usize>,
}

#[derive(Args)]
pub struct SlowApiArgs {
    /// Listen port
    #[arg(short, long, env = "PORT", default_value_t = 8001)]
    pub port: u16,

    /// Listen address
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    #[command(flatten)]
    pub log: LogArgs,
}

#[derive(Args)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m\n  \
        slowrelay init                                   Quick start config (yaml)\n  \
        slowrelay init --full                            Every option, documented\n  \
        slowrelay init -u http://api:9000/ -f toml       Config for a given upstream")]
pub struct InitArgs {
    /// Output format
    #[arg(short, long, default_value = "yaml")]
    pub format: ConfigFormat,

    /// Output file path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Include full documentation as comments
    #[arg(long, conflicts_with = "upstream")]
    pub full: bool,

    /// Generate a config for this upstream instead of the template
    #[arg(short, long)]
    pub upstream: Option<String>,

    /// Strategy for the generated config (with --upstream)
    #[arg(short, long, requires = "upstream")]
    pub strategy: Option<StrategyKind>,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Config file to validate
    #[arg(default_value = "slowrelay.yaml")]
    pub config: PathBuf,

    /// Output format
    #[arg(long, default_value = "text")]
    pub format: ValidateFormat,
}

#[derive(Args)]
pub struct HealthArgs {
    /// URL of the running instance
    #[arg(default_value = "http://localhost:8000")]
    pub url: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct WorkerArgs {
    /// Slot number assigned by the supervisor
    #[arg(long, default_value_t = 0)]
    pub index: usize,

    #[command(flatten)]
    pub log: LogArgs,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyKind {
    SingleThreaded,
    ThreadPool,
    ProcessPool,
    Cooperative,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn to_tracing_level(&self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }

    /// The flag value that parses back into `self`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

impl ConfigFormat {
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
            Self::Toml => "toml",
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
pub enum ValidateFormat {
    Text,
    Json,
}
