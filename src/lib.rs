//! Slowrelay is an HTTP forwarding service for a slow upstream.
//!
//! Every `GET /?delay=<n>` is forwarded to `GET <upstream>/?delay=<n>` and
//! answered with `Hi there! ` followed by the upstream body. The handler is
//! written once; the serving harness around it decides how requests are
//! scheduled: one at a time, a pool of threads, a pool of processes each
//! running a pool of threads, or cooperative tasks on a single thread.
//!
//! # Architecture
//!
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, slow-api, init,
//!   validate, health, worker).
//! - [`config`] -- Configuration loading, CLI overrides and validation.
//! - [`error`] -- Unified error types using `thiserror`.
//! - [`harness`] -- Serving strategies: single-threaded, thread pool,
//!   cooperative, and the process-pool supervisor.
//! - [`health`] -- `GET /health` endpoint handler returning runtime diagnostics.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//! - [`proxy`] -- The forwarding handler, delay parsing and the upstream call.
//! - [`server`] -- Router, shared application state, HTTP client, listener
//!   setup and graceful shutdown.
//! - [`slow_api`] -- A slow upstream simulator for local runs and tests.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `yaml` | YAML config file support _(enabled by default)_ |
//! | `json` | JSON config file support |
//! | `toml` | TOML config file support |
//! | `sentry-integration` | Sentry error tracking |
//! | `file-backends` | All file format backends |
//! | `full` | All features |

// Binary crate — public functions are internal, not consumed by external users.
#![allow(clippy::missing_errors_doc)]

pub mod cli;
pub mod cmd;
pub mod config;
pub mod error;
pub mod harness;
pub mod health;
pub mod logging;
pub mod proxy;
pub mod server;
pub mod slow_api;

#[cfg(feature = "sentry-integration")]
pub mod sentry_integration;
