use std::path::Path;

use quanta_stream::config::{parse_interval_ms, Config, FeedMode, StreamKind};
use quanta_stream::indicator::FlatPricePolicy;
use tokio_test::{assert_err, assert_ok};

#[test]
fn parse_shipped_default_toml() {
    let config = assert_ok!(Config::from_path(Path::new("config/default.toml")));
    assert_ok!(config.validate());
    assert_eq!(config.feed.mode, FeedMode::Auto);
    assert_eq!(config.feed.symbol, "btcusdt");
    assert_eq!(config.feed.stream, StreamKind::Combined);
    assert_eq!(config.feed.subscriber_queue, 100);
    assert_eq!(config.feed.ping_interval_ms, 20_000);
    assert_eq!(config.history.rest_endpoints[0], "https://api.binance.us");
    assert_eq!(config.history.kline_interval, "1h");
    assert_eq!(config.indicators.default_period, 14);
    assert_eq!(config.indicators.flat_price, FlatPricePolicy::Forward);
    assert!((config.synthetic.start_price - 48_000.0).abs() < f64::EPSILON);
    assert_eq!(config.synthetic.seed, None);
    assert_eq!(config.server.bind_addr, "0.0.0.0:50051");
}

#[test]
fn partial_toml_keeps_section_defaults() {
    let toml_str = r#"
[feed]
mode = "synthetic"
symbol = "ethusdt"
stream = "ticker"

[synthetic]
seed = 42

[indicators]
flat_price = "skip_unchanged"

[logging]
level = "debug"
json = true
"#;
    let config = assert_ok!(Config::from_toml_str(toml_str));
    assert_eq!(config.feed.mode, FeedMode::Synthetic);
    assert_eq!(config.feed.symbol, "ethusdt");
    assert_eq!(config.feed.stream, StreamKind::Ticker);
    assert_eq!(config.feed.max_backoff_ms, 30_000);
    assert_eq!(config.synthetic.seed, Some(42));
    assert_eq!(config.synthetic.interval_ms, 1_000);
    assert_eq!(config.indicators.flat_price, FlatPricePolicy::SkipUnchanged);
    assert_eq!(config.indicators.default_period, 14);
    assert_eq!(config.logging.level, "debug");
    assert!(config.logging.json);
}

#[test]
fn validation_rejects_inconsistent_settings() {
    let cases = [
        "[feed]\nsymbol = \"  \"",
        "[feed]\nws_endpoints = []",
        "[feed]\ninitial_backoff_ms = 0",
        "[feed]\ninitial_backoff_ms = 60000\nmax_backoff_ms = 1000",
        "[feed]\nsubscriber_queue = 0",
        "[feed]\nping_interval_ms = 60000\nidle_timeout_ms = 60000",
        "[feed]\nping_interval_ms = 0",
        "[feed]\nhandshake_timeout_ms = 0",
        "[history]\nrest_endpoints = []",
        "[history]\nkline_interval = \"1x\"",
        "[indicators]\ndefault_period = 0",
        "[server]\nsession_queue = 0",
        "[synthetic]\ninterval_ms = 0",
        "[synthetic]\nstart_price = -5.0",
    ];
    for case in cases {
        assert_err!(Config::from_toml_str(case), "accepted: {}", case);
    }
}

#[test]
fn unknown_enum_values_fail_to_parse() {
    assert_err!(Config::from_toml_str("[feed]\nmode = \"paper\""));
    assert_err!(Config::from_toml_str("[indicators]\nflat_price = \"drop\""));
}

#[test]
fn parse_interval_valid() {
    assert_eq!(parse_interval_ms("1m").unwrap(), 60_000);
    assert_eq!(parse_interval_ms("2h").unwrap(), 7_200_000);
    assert_eq!(parse_interval_ms("1M").unwrap(), 2_592_000_000);
}

#[test]
fn parse_interval_rejects_invalid_inputs() {
    assert!(parse_interval_ms("").is_err());
    assert!(parse_interval_ms("m").is_err());
    assert!(parse_interval_ms("0m").is_err());
    assert!(parse_interval_ms("1x").is_err());
}
