//! Integration tests for config loading across all file formats.

use slowrelay::config::model::Strategy;
use slowrelay::config::sources::parse_config_str;
use slowrelay::config::validation::validate;

fn load_example(name: &str) -> String {
    let path = format!("example/{name}");
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("failed to read {path}: {e}"))
}

#[test]
fn yaml_example_loads_and_validates() {
    let content = load_example("slowrelay.yaml");
    let config = parse_config_str("yaml", &content, "slowrelay.yaml").unwrap();
    validate(&config).unwrap();
    assert_eq!(config.upstream.url, "http://slow_api:8001/");
    assert_eq!(config.strategy, Strategy::Cooperative);
}

#[test]
fn yaml_full_example_loads_and_validates() {
    let content = load_example("full.yaml");
    let config = parse_config_str("yaml", &content, "full.yaml").unwrap();
    validate(&config).unwrap();
    assert_eq!(
        config.strategy,
        Strategy::ProcessPool {
            processes: 2,
            threads: 8
        }
    );
    assert_eq!(config.upstream.timeout, 10_000);
    assert_eq!(config.limits.backlog, 2048);
    assert_eq!(config.limits.header_read_timeout, 5_000);
}

#[cfg(feature = "json")]
#[test]
fn json_example_loads_and_validates() {
    let content = load_example("slowrelay.json");
    let config = parse_config_str("json", &content, "slowrelay.json").unwrap();
    validate(&config).unwrap();
    assert_eq!(config.strategy, Strategy::ThreadPool { threads: 8 });
}

#[cfg(feature = "toml")]
#[test]
fn toml_example_loads_and_validates() {
    let content = load_example("slowrelay.toml");
    let config = parse_config_str("toml", &content, "slowrelay.toml").unwrap();
    validate(&config).unwrap();
    assert_eq!(config.strategy, Strategy::ThreadPool { threads: 8 });
}

#[cfg(all(feature = "json", feature = "toml"))]
#[test]
fn json_and_toml_examples_are_equivalent() {
    let json_config =
        parse_config_str("json", &load_example("slowrelay.json"), "json").unwrap();
    let toml_config =
        parse_config_str("toml", &load_example("slowrelay.toml"), "toml").unwrap();
    assert_eq!(json_config, toml_config);
}

#[test]
fn unknown_fields_are_rejected() {
    let content = "upstream:\n  url: http://slow_api:8001/\nroutes: []\n";
    assert!(parse_config_str("yaml", content, "bad.yaml").is_err());
}

#[test]
fn unknown_strategy_kind_is_rejected() {
    let content = "upstream:\n  url: http://slow_api:8001/\nstrategy:\n  kind: green-threads\n";
    assert!(parse_config_str("yaml", content, "bad.yaml").is_err());
}

#[test]
fn invalid_values_are_reported_per_field() {
    let content = "listen: \"8000\"\nupstream:\n  url: slow_api:8001\n  timeout: 0\n\
                   strategy:\n  kind: thread-pool\n  threads: 0\n";
    let config = parse_config_str("yaml", content, "bad.yaml").unwrap();
    let errors = validate(&config).unwrap_err();
    let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
    assert_eq!(
        fields,
        ["listen", "upstream.url", "upstream.timeout", "strategy.threads"]
    );
}
