//! Configuration loading and validation tests
//!
//! Tests focus on BEHAVIOR of configuration loading, validation, and error handling.
//! We test observable outcomes, not implementation details of TOML parsing.

use neochat::config::{ChatConfig, ConfigError};
use neochat::session::SessionSettings;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "{content}").unwrap();
    temp_file
}

#[test]
fn test_config_loads_successfully_from_valid_toml() {
    let temp_file = write_config(
        r#"
[client]
id_prefix = "terminal"
display_name = "alice"

[broker]
broker_url = "mqtts://chat.example.com"
keep_alive_secs = 30
reconnect_delay_ms = 5000

[session]
typing_expiry_ms = 2000
typing_throttle_ms = 300

[topics]
users = "/topic/online"
"#,
    );

    let config = ChatConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.client.id_prefix, "terminal");
    assert_eq!(config.client.display_name.as_deref(), Some("alice"));
    assert_eq!(config.broker.broker_url, "mqtts://chat.example.com");
    assert_eq!(config.broker.keep_alive_secs, 30);
    assert_eq!(config.broker.reconnect_delay(), Duration::from_millis(5000));
    assert_eq!(config.session.typing_expiry_ms, 2000);
    assert_eq!(config.session.typing_throttle_ms, 300);
    assert_eq!(config.topics.users, "/topic/online");
    assert_eq!(config.topics.messages, "/topic/messages");
}

#[test]
fn test_empty_file_uses_defaults() {
    let temp_file = write_config("");

    let config = ChatConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config, ChatConfig::default());
    assert_eq!(config.broker.broker_url, "mqtt://localhost:1883");
    assert_eq!(config.broker.reconnect_delay_ms, 3000);
    assert_eq!(config.session.typing_expiry_ms, 1500);
    assert_eq!(config.session.typing_throttle_ms, 0);
    assert_eq!(config.topics.typing, "/topic/typing");
    assert_eq!(config.topics.destination_prefix, "/app");
}

#[test]
fn test_settings_follow_config() {
    let temp_file = write_config(
        r#"
[session]
typing_expiry_ms = 750

[topics]
destination_prefix = "/chat"
"#,
    );

    let config = ChatConfig::load_from_file(temp_file.path()).unwrap();
    let settings = SessionSettings::from_config(&config);

    assert_eq!(settings.typing_expiry, Duration::from_millis(750));
    assert_eq!(
        settings
            .topics
            .destination(neochat::protocol::Destination::Join),
        "/chat/join"
    );
}

#[test]
fn test_missing_file_is_a_read_error() {
    let result = ChatConfig::load_from_file(std::path::Path::new("/nonexistent/neochat.toml"));
    assert!(matches!(result, Err(ConfigError::FileRead(_))));
}

#[test]
fn test_invalid_toml_is_rejected() {
    let temp_file = write_config("[broker\nbroker_url = ");
    let result = ChatConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_wrong_types_are_rejected() {
    let temp_file = write_config(
        r#"
[broker]
reconnect_delay_ms = "soon"
"#,
    );
    let result = ChatConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_invalid_broker_urls_are_rejected() {
    for url in ["localhost:1883", "http://localhost:1883", "ws://localhost/ws", ""] {
        let temp_file = write_config(&format!("[broker]\nbroker_url = \"{url}\"\n"));
        let result = ChatConfig::load_from_file(temp_file.path());
        assert!(
            matches!(result, Err(ConfigError::InvalidBrokerUrl(_))),
            "URL should be rejected: {url}"
        );
    }
}

#[test]
fn test_invalid_client_prefix_is_rejected() {
    let temp_file = write_config(
        r#"
[client]
id_prefix = "bad prefix!"
"#,
    );
    let result = ChatConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::InvalidClientId(_))));
}

#[test]
fn test_zero_delays_are_rejected() {
    for content in [
        "[broker]\nreconnect_delay_ms = 0\n",
        "[session]\ntyping_expiry_ms = 0\n",
    ] {
        let temp_file = write_config(content);
        let result = ChatConfig::load_from_file(temp_file.path());
        assert!(
            matches!(result, Err(ConfigError::InvalidConfig(_))),
            "Config should be rejected: {content}"
        );
    }
}

#[test]
fn test_blank_topics_are_rejected() {
    let temp_file = write_config(
        r#"
[topics]
messages = "  "
"#,
    );
    let result = ChatConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
}

#[test]
fn test_credentials_resolved_from_environment() {
    std::env::set_var("NEOCHAT_TEST_CONFIG_USER", "alice");
    std::env::set_var("NEOCHAT_TEST_CONFIG_PASS", "secret");

    let temp_file = write_config(
        r#"
[broker]
username_env = "NEOCHAT_TEST_CONFIG_USER"
password_env = "NEOCHAT_TEST_CONFIG_PASS"
"#,
    );
    let config = ChatConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.broker.username().as_deref(), Some("alice"));
    assert_eq!(config.broker.password().as_deref(), Some("secret"));

    let unset = ChatConfig::default();
    assert_eq!(unset.broker.username(), None);
}

#[test]
fn test_config_round_trips_through_toml() {
    let config = ChatConfig::default();
    let text = toml::to_string_pretty(&config).unwrap();
    assert_eq!(ChatConfig::from_toml_str(&text).unwrap(), config);
}
