//! Structured logging setup using the `tracing` ecosystem.
//!
//! Configures a `tracing-subscriber` with either JSON output (for
//! production) or pretty-printed output (for TTY / local dev). Format
//! is auto-detected from the terminal but can be forced via `--json`
//! or `--pretty`. Process-pool workers receive the supervisor's resolved
//! choice through [`LogArgs::to_worker_args`] so every process logs alike.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::LogArgs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[must_use]
pub fn resolve_format(pretty: bool, json: bool) -> LogFormat {
    if json {
        LogFormat::Json
    } else if pretty || std::io::IsTerminal::is_terminal(&std::io::stdout()) {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    }
}

/// Install the global subscriber. Returns the format actually chosen.
pub fn init(args: &LogArgs) -> LogFormat {
    let format = resolve_format(args.pretty, args.json);
    let filter =
        tracing_subscriber::filter::Targets::new().with_default(args.log_level.to_tracing_level());

    // Error events become Sentry events once `sentry_integration::init` runs.
    #[cfg(feature = "sentry-integration")]
    let sentry_layer = Some(sentry_tracing::layer());
    #[cfg(not(feature = "sentry-integration"))]
    let sentry_layer: Option<tracing_subscriber::layer::Identity> = None;

    // try_init: integration tests may start several servers in one process
    let _ = match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(sentry_layer)
            .with(fmt::layer().json().with_target(false).with_thread_names(true))
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(sentry_layer)
            .with(fmt::layer().pretty().with_thread_names(true))
            .try_init(),
    };

    format
}

impl LogArgs {
    /// Flags that make a child process log exactly like this one.
    #[must_use]
    pub fn to_worker_args(&self, format: LogFormat) -> Vec<String> {
        vec![
            "--log-level".to_string(),
            self.log_level.as_str().to_string(),
            match format {
                LogFormat::Json => "--json".to_string(),
                LogFormat::Pretty => "--pretty".to_string(),
            },
        ]
    }
}
