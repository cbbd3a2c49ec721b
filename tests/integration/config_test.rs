//! Configuration loading tests

use std::io::Write;
use trade_relay::config::Config;
use trade_relay::ws::ReconnectPolicy;

#[test]
fn test_config_example_loads() {
    let config: Config = toml::from_str(include_str!("../../config.toml.example")).unwrap();
    assert_eq!(config.feed.symbols, vec!["btcusdt", "ethusdt"]);
    assert_eq!(config.kafka.topic, "crypto_prices");
    assert_eq!(config.store.max_connections, 20);
    assert_eq!(
        config.feed.reconnect,
        ReconnectPolicy::Exponential {
            initial_ms: 1_000,
            max_ms: 30_000
        }
    );
}

#[test]
fn test_config_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        [feed]
        symbols = ["ethusdt"]

        [feed.reconnect]
        strategy = "fixed"
        delay_ms = 5000

        [kafka]
        bootstrap_servers = "broker:9092"
        topic = "trades"

        [store]
        url = "postgres://localhost/trades"
        "#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.feed.reconnect, ReconnectPolicy::Fixed { delay_ms: 5_000 });
    assert_eq!(config.kafka.bootstrap_servers, "broker:9092");
    assert_eq!(config.consumer.max_consecutive_failures, 10);
}

#[test]
fn test_config_load_rejects_invalid_toml() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[feed\nsymbols = ").unwrap();
    assert!(Config::load(file.path()).is_err());
}
