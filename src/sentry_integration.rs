//! Optional Sentry error tracking for `slowrelay run`.
//!
//! The returned guard must outlive the server so that panics caught in
//! handlers and upstream failures logged at error level are delivered.

pub fn init(dsn: &str, environment: Option<&str>) -> sentry::ClientInitGuard {
    let parsed_dsn = match dsn.parse() {
        Ok(d) => Some(d),
        Err(e) => {
            tracing::warn!(error = %e, "invalid Sentry DSN, error tracking disabled");
            None
        }
    };

    sentry::init(sentry::ClientOptions {
        dsn: parsed_dsn,
        environment: environment.map(|e| e.to_string().into()),
        release: Some(concat!("slowrelay@", env!("CARGO_PKG_VERSION")).into()),
        server_name: Some(format!("slowrelay-{}", std::process::id()).into()),
        ..Default::default()
    })
}
