//! CLI / environment overrides layered on top of a config file.

use std::net::{IpAddr, SocketAddr};

use super::model::{ServerConfig, Strategy, DEFAULT_LISTEN, DEFAULT_PROCESSES, DEFAULT_THREADS};
use crate::cli::{RunArgs, StrategyKind};

/// Values given explicitly on the command line or through the environment.
/// `None` means "keep whatever the file (or the default) says".
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<IpAddr>,
    pub port: Option<u16>,
    pub upstream: Option<String>,
    pub strategy: Option<StrategyKind>,
    pub threads: Option<usize>,
    pub processes: Option<usize>,
    pub timeout: Option<u64>,
    pub max_body: Option<usize>,
}

impl From<&RunArgs> for Overrides {
    fn from(args: &RunArgs) -> Self {
        Self {
            host: args.host,
            port: args.port,
            upstream: args.upstream.clone(),
            strategy: args.strategy,
            threads: args.threads,
            processes: args.processes,
            timeout: args.timeout,
            max_body: args.max_body,
        }
    }
}

impl Overrides {
    pub fn apply(&self, config: &mut ServerConfig) {
        if self.host.is_some() || self.port.is_some() {
            let current = config
                .listen
                .parse::<SocketAddr>()
                .or_else(|_| DEFAULT_LISTEN.parse())
                .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 8000)));
            let addr = SocketAddr::new(
                self.host.unwrap_or_else(|| current.ip()),
                self.port.unwrap_or_else(|| current.port()),
            );
            config.listen = addr.to_string();
        }

        if let Some(ref url) = self.upstream {
            config.upstream.url.clone_from(url);
        }
        if let Some(timeout) = self.timeout {
            config.upstream.timeout = timeout;
        }
        if let Some(max_body) = self.max_body {
            config.limits.max_body = max_body;
        }

        config.strategy = self.merge_strategy(&config.strategy);
    }

    fn merge_strategy(&self, current: &Strategy) -> Strategy {
        let (current_threads, current_processes) = match *current {
            Strategy::ThreadPool { threads } => (threads, DEFAULT_PROCESSES),
            Strategy::ProcessPool { processes, threads } => (threads, processes),
            Strategy::SingleThreaded | Strategy::Cooperative => {
                (DEFAULT_THREADS, DEFAULT_PROCESSES)
            }
        };
        let threads = self.threads.unwrap_or(current_threads);
        let processes = self.processes.unwrap_or(current_processes);

        let kind = self.strategy.unwrap_or(match current {
            Strategy::SingleThreaded => StrategyKind::SingleThreaded,
            Strategy::ThreadPool { .. } => StrategyKind::ThreadPool,
            Strategy::ProcessPool { .. } => StrategyKind::ProcessPool,
            Strategy::Cooperative => StrategyKind::Cooperative,
        });

        match kind {
            StrategyKind::SingleThreaded => Strategy::SingleThreaded,
            StrategyKind::ThreadPool => Strategy::ThreadPool { threads },
            StrategyKind::ProcessPool => Strategy::ProcessPool { processes, threads },
            StrategyKind::Cooperative => Strategy::Cooperative,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ServerConfig {
        ServerConfig::with_upstream("http://file-upstream:8001/")
    }

    #[test]
    fn empty_overrides_change_nothing() {
        let mut config = base();
        Overrides::default().apply(&mut config);
        assert_eq!(config, base());
    }

    #[test]
    fn port_keeps_file_host() {
        let mut config = base();
        config.listen = "127.0.0.1:9000".into();
        Overrides {
            port: Some(9100),
            ..Overrides::default()
        }
        .apply(&mut config);
        assert_eq!(config.listen, "127.0.0.1:9100");
    }

    #[test]
    fn ipv6_host_is_bracketed() {
        let mut config = base();
        Overrides {
            host: Some("::1".parse().unwrap()),
            ..Overrides::default()
        }
        .apply(&mut config);
        assert_eq!(config.listen, "[::1]:8000");
    }

    #[test]
    fn threads_alone_resize_existing_pool() {
        let mut config = base();
        config.strategy = Strategy::ProcessPool {
            processes: 3,
            threads: 2,
        };
        Overrides {
            threads: Some(16),
            ..Overrides::default()
        }
        .apply(&mut config);
        assert_eq!(
            config.strategy,
            Strategy::ProcessPool {
                processes: 3,
                threads: 16
            }
        );
    }

    #[test]
    fn threads_alone_leave_cooperative_alone() {
        let mut config = base();
        Overrides {
            threads: Some(16),
            ..Overrides::default()
        }
        .apply(&mut config);
        assert_eq!(config.strategy, Strategy::Cooperative);
    }

    #[test]
    fn strategy_kind_switches_and_takes_sizes() {
        let mut config = base();
        Overrides {
            strategy: Some(StrategyKind::ThreadPool),
            threads: Some(12),
            upstream: Some("http://cli-upstream/".into()),
            timeout: Some(1500),
            ..Overrides::default()
        }
        .apply(&mut config);
        assert_eq!(config.strategy, Strategy::ThreadPool { threads: 12 });
        assert_eq!(config.upstream.url, "http://cli-upstream/");
        assert_eq!(config.upstream.timeout, 1500);
    }
}
