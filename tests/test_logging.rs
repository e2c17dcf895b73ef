//! Tests for logging configuration and format parsing
//!
//! Tests the pure functions in the logging module that handle
//! log format parsing and configuration from environment variables.

use neochat::observability::logging::{build_filter, init_logging, parse_level, LogFormat};
use tracing::Level;

#[test]
fn test_log_format_parse_json() {
    assert_eq!(LogFormat::parse("json"), LogFormat::Json);
    assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
}

#[test]
fn test_log_format_parse_pretty() {
    assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
    assert_eq!(LogFormat::parse("PRETTY"), LogFormat::Pretty);
}

#[test]
fn test_log_format_parse_invalid_defaults_to_compact() {
    // Terminal-friendly output is the default for an interactive client
    assert_eq!(LogFormat::parse("invalid"), LogFormat::Compact);
    assert_eq!(LogFormat::parse(""), LogFormat::Compact);
    assert_eq!(LogFormat::parse("yaml"), LogFormat::Compact);
}

#[test]
fn test_parse_level_falls_back_to_default() {
    assert_eq!(parse_level("debug", Level::WARN), Level::DEBUG);
    assert_eq!(parse_level("ERROR", Level::WARN), Level::ERROR);
    assert_eq!(parse_level("verbose", Level::WARN), Level::WARN);
    assert_eq!(parse_level("", Level::INFO), Level::INFO);
}

#[test]
fn test_build_filter_includes_level() {
    if std::env::var("RUST_LOG").is_ok() {
        return;
    }
    let filter = build_filter(Level::DEBUG).to_string();
    assert!(filter.contains("debug"), "Filter was: {filter}");
    assert!(filter.contains("rumqttc=warn"), "Filter was: {filter}");
}

#[test]
fn test_init_logging_twice_does_not_panic() {
    init_logging(Level::INFO, LogFormat::Compact, false);
    init_logging(Level::DEBUG, LogFormat::Json, true);
    tracing::info!("logging initialized");
}
