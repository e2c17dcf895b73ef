//! NeoChat - terminal chat client
//!
//! Joins the room, prints roster, message and typing changes, and sends each
//! line read from stdin as a chat message.

use clap::{Parser, Subcommand};
use neochat::config::ChatConfig;
use neochat::observability::init_default_logging;
use neochat::session::{ChatSession, SessionState};
use std::path::PathBuf;
use std::process;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info};

/// Realtime chat client over MQTT
#[derive(Parser)]
#[command(name = "neochat")]
#[command(about = "Realtime chat client over MQTT")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Broker URL, overrides the configuration file
    #[arg(long, env = "NEOCHAT_BROKER_URL", value_name = "URL")]
    broker_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join the chat and relay stdin lines as messages
    Run {
        /// Display name, overrides client.display_name
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Validate configuration
    Config {
        /// Show the effective configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!("Starting neochat v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(cli.config.as_ref(), cli.broker_url) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            eprintln!("neochat: {e}");
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run { name } => run_chat(config, name).await,
        Commands::Config { show } => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        eprintln!("neochat: {e}");
        process::exit(1);
    }

    info!("Shutdown complete");
}

fn load_configuration(
    config_path: Option<&PathBuf>,
    broker_url: Option<String>,
) -> Result<ChatConfig, Box<dyn std::error::Error>> {
    let mut config = match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            ChatConfig::load_from_file(path)?
        }
        None => {
            let default_paths = ["neochat.toml", "config/neochat.toml"];

            match default_paths
                .iter()
                .map(PathBuf::from)
                .find(|path| path.exists())
            {
                Some(path) => {
                    info!("Loading configuration from: {}", path.display());
                    ChatConfig::load_from_file(&path)?
                }
                None => {
                    info!("No configuration file found, using defaults");
                    ChatConfig::default()
                }
            }
        }
    };

    if let Some(broker_url) = broker_url {
        config.broker.broker_url = broker_url;
    }
    config.validate()?;

    Ok(config)
}

async fn run_chat(
    config: ChatConfig,
    name: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let name = name
        .or_else(|| config.client.display_name.clone())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or("a display name is required (--name or client.display_name)")?;

    let mut session = ChatSession::connect_mqtt(&config)?;
    let actions = session.actions();
    let mut state_rx = session.watch();
    let mut previous = session.snapshot();

    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("* connecting to {} as {}", config.broker.broker_url, name);

    loop {
        tokio::select! {
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = state_rx.borrow_and_update().clone();

                if became_ready(&previous, &current) {
                    actions.announce_identity(name.as_str()).await;
                }

                for line in describe_changes(&previous, &current) {
                    println!("{line}");
                }
                previous = current;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => actions.send_message(name.as_str(), line).await,
                Ok(None) => {
                    info!("stdin closed, leaving");
                    break;
                }
                Err(e) => {
                    error!("Failed to read stdin: {}", e);
                    break;
                }
            },
            _ = sigint.recv() => {
                info!("Received SIGINT, leaving");
                break;
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, leaving");
                break;
            }
        }
    }

    session.teardown().await;
    println!("* disconnected");
    Ok(())
}

/// The server forgets us with the link, so join again on every ready
///
/// Watch updates coalesce: a whole outage can fall between two snapshots that
/// both read connected, which the reconnect count still reveals.
fn became_ready(previous: &SessionState, current: &SessionState) -> bool {
    current.is_connected()
        && (!previous.is_connected() || previous.reconnect_count() != current.reconnect_count())
}

/// Terminal lines for everything that changed between two snapshots
fn describe_changes(previous: &SessionState, current: &SessionState) -> Vec<String> {
    let mut lines = Vec::new();

    if previous.status() != current.status() || became_ready(previous, current) {
        lines.push(format!("* {}", current.status()));
    }

    if previous.roster() != current.roster() {
        lines.push(format!("* online: {}", current.roster().join(", ")));
    }

    let seen = previous.log().len().min(current.log().len());
    for message in &current.log()[seen..] {
        lines.push(format!("<{}> {}", message.sender, message.content));
    }

    if previous.visible_typing_user() != current.visible_typing_user() {
        if let Some(user) = current.visible_typing_user() {
            lines.push(format!("* {user} is typing..."));
        }
    }

    lines
}

fn handle_config_command(
    config: &ChatConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("{}", toml::to_string_pretty(config)?);
    } else {
        println!("Configuration is valid");
    }

    info!("Configuration validation complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "neochat",
            "--broker-url",
            "mqtt://broker.local",
            "run",
            "--name",
            "alice",
        ])
        .unwrap();
        assert_eq!(cli.broker_url.as_deref(), Some("mqtt://broker.local"));
        assert!(matches!(cli.command, Commands::Run { name: Some(ref n) } if n == "alice"));
    }

    #[test]
    fn test_cli_parses_config_show() {
        let cli = Cli::try_parse_from(["neochat", "-c", "chat.toml", "config", "--show"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("chat.toml")));
        assert!(matches!(cli.command, Commands::Config { show: true }));
    }

    #[test]
    fn test_describe_no_changes() {
        let state = SessionState::default();
        assert!(describe_changes(&state, &state).is_empty());
        assert!(!became_ready(&state, &state));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejoin_after_outage_hidden_between_snapshots() {
        use neochat::session::{ConnectionStatus, SessionSettings};
        use neochat::testing::MockTransport;
        use std::time::Duration;

        let wait = Duration::from_secs(1);
        let transport = MockTransport::new().with_reconnect_delay(Duration::from_millis(10));
        let mut session = ChatSession::spawn(transport.clone(), SessionSettings::default());
        let disconnected = session.snapshot();

        transport.accept().await;
        let first = session
            .wait_for(wait, |state| state.is_connected())
            .await
            .unwrap();
        assert!(became_ready(&disconnected, &first));
        assert!(!became_ready(&first, &first));

        // Lose the link and come back without looking at the states in between
        transport.drop_link("network").await;
        session
            .wait_for_status(ConnectionStatus::Connecting, wait)
            .await
            .unwrap();
        transport.accept().await;
        let second = session
            .wait_for(wait, |state| state.is_connected())
            .await
            .unwrap();

        assert_eq!(second.reconnect_count(), 1);
        assert!(became_ready(&first, &second));
        assert_eq!(describe_changes(&first, &second), ["* connected"]);

        session.teardown().await;
    }
}
