//! `ripple`: console client for the Ripple realtime chat.
//!
//! Connects to the realtime endpoint, prints chat events to stdout and sends
//! lines typed on stdin. Configuration via CLI flags, environment variables,
//! or config file (`~/.config/ripple/config.toml`).
//!
//! ```bash
//! cargo run --bin ripple -- --user-id 1 --realtime-url ws://127.0.0.1:8080/ws
//!
//! # Or via environment variables
//! RIPPLE_USER_ID=1 RIPPLE_TOKEN=... cargo run --bin ripple
//! ```

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_appender::non_blocking::WorkerGuard;

use ripple::api::HttpChatApi;
use ripple::client::{ClientEvent, RealtimeClient};
use ripple::config::{CliArgs, ClientConfig};
use ripple::console::{self, Command};
use ripple::transport::CLOSE_NORMAL;
use ripple::transport::websocket::WebSocketConnector;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Logs go to a file; stdout is the chat.
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    let Some(settings) = config.to_client_settings() else {
        eprintln!("error: no user id configured (use --user-id or RIPPLE_USER_ID)");
        return ExitCode::FAILURE;
    };
    let api = match HttpChatApi::new(&config.api_url, config.token.clone()) {
        Ok(api) => api,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(user = %settings.local_user, url = %settings.realtime_url, "ripple starting");
    let connector = WebSocketConnector::new(config.connect_timeout);
    let (client, events) = RealtimeClient::new(settings, connector, api);

    run(&client, events).await;

    client.shutdown();
    tracing::info!("ripple exiting");
    ExitCode::SUCCESS
}

/// Initialize file-based logging.
///
/// Returns a [`WorkerGuard`] that must be held until shutdown to ensure all
/// buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("ripple.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// Console loop: interleave client events with stdin commands until `/quit`
/// or end of input.
async fn run<C, A>(
    client: &RealtimeClient<C, A>,
    mut events: tokio::sync::mpsc::Receiver<ClientEvent>,
) where
    C: ripple::transport::Connector,
    A: ripple::api::ChatApi,
{
    let local_user = client.local_user();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut group_mode = false;
    let mut typing = false;

    client.start();
    println!("{}", console::HELP);

    loop {
        tokio::select! {
            Some(event) = events.recv() => {
                if let Some(line) = console::render_event(&event, local_user) {
                    println!("{line}");
                }
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(err = %e, "stdin read failed");
                        break;
                    }
                };
                let Some(command) = console::parse_command(&line) else {
                    continue;
                };
                match command {
                    Command::Open(id) => {
                        client.select_conversation(id);
                        println!("* now talking in #{id}");
                    }
                    Command::ToggleGroup => {
                        group_mode = !group_mode;
                        println!("* sending as {}", console::send_kind(group_mode));
                    }
                    Command::Typing => {
                        if let Some(id) = client.selected_conversation() {
                            typing = !typing;
                            client.send_typing_indicator(id, typing);
                        } else {
                            println!("! open a conversation first");
                        }
                    }
                    Command::Reconnect => client.reconnect(),
                    Command::Help => println!("{}", console::HELP),
                    Command::Quit => break,
                    Command::Invalid(message) => println!("! {message}"),
                    Command::Say(text) => {
                        let Some(id) = client.selected_conversation() else {
                            println!("! open a conversation first (/open <id>)");
                            continue;
                        };
                        let kind = console::send_kind(group_mode);
                        if let Err(e) = client.send_message(id, text, kind) {
                            println!("! not sent: {e}");
                        }
                        if typing {
                            typing = false;
                            client.send_typing_indicator(id, false);
                        }
                    }
                }
            }
        }
    }

    client.disconnect(CLOSE_NORMAL, "user quit");
}
