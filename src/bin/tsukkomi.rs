//! Terminal frontend for the tsukkomi client.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tsukkomi_client::capture::Recorder;
use tsukkomi_client::codec::DecodedAudio;
use tsukkomi_client::config::AudioConfig;
use tsukkomi_client::playback::Playback;
use tsukkomi_client::{ClientConfig, InputEvent, RealtimeClient, ViewEvent};

/// Real-time voice chat with a manzai tsukkomi server.
#[derive(Parser)]
#[command(name = "tsukkomi", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// WebSocket server URL (overrides the config file).
    #[arg(short, long)]
    server: Option<String>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Connect and start a conversation.
    Chat,

    /// List available audio devices.
    Devices,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Users can override with RUST_LOG=debug to see everything.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tsukkomi_client=info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = if let Some(ref path) = cli.config {
        ClientConfig::load(path)?
    } else {
        let path = ClientConfig::default_config_path();
        if path.exists() {
            ClientConfig::load(&path)?
        } else {
            ClientConfig::default()
        }
    };

    if let Some(server) = cli.server {
        config.connection.server_url = server;
    }

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => run_chat(config).await,
        Command::Devices => list_devices(),
    }
}

async fn run_chat(config: ClientConfig) -> anyhow::Result<()> {
    println!(
        "Tsukkomi client v{} ({})",
        env!("CARGO_PKG_VERSION"),
        config.connection.server_url
    );
    println!("{}", config.conversation.welcome_message);
    println!("Type a message and press Enter. /rec starts recording, /stop sends it, /quit exits.\n");

    let cancel = CancellationToken::new();

    // Handle Ctrl+C
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, shutting down...");
            cancel_clone.cancel();
        }
    });

    let (view_tx, mut view_rx) = mpsc::unbounded_channel();
    let playback_tx = spawn_playback(config.audio.clone());

    let client = RealtimeClient::new(config, cancel.clone())
        .with_view(view_tx)
        .with_playback(playback_tx);

    // Conversation printer.
    tokio::spawn(async move {
        while let Some(event) = view_rx.recv().await {
            match event {
                ViewEvent::Entry(entry) => println!("{entry}"),
                ViewEvent::Status(state) => println!("[status] {}", state.label()),
            }
        }
    });

    // Map stdin lines to input events.
    let (input_tx, input_rx) = mpsc::unbounded_channel();
    let stdin_cancel = cancel.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            tokio::select! {
                _ = stdin_cancel.cancelled() => break,
                line = lines.next_line() => {
                    let Ok(Some(line)) = line else { break };
                    match parse_command(&line) {
                        Some(event) => {
                            if input_tx.send(event).is_err() {
                                break;
                            }
                        }
                        None => {
                            stdin_cancel.cancel();
                            break;
                        }
                    }
                }
            }
        }
    });

    client.run(input_rx).await;
    Ok(())
}

/// Map one stdin line to an input event. `None` requests shutdown.
fn parse_command(line: &str) -> Option<InputEvent> {
    match line.trim() {
        "/quit" | "/exit" => None,
        "/rec" => Some(InputEvent::PressStart),
        "/stop" => Some(InputEvent::Release),
        "/retry" => Some(InputEvent::RequestPermission),
        other => Some(InputEvent::SubmitText(other.to_owned())),
    }
}

/// Dedicated playback thread; cpal playback blocks until each payload ends.
fn spawn_playback(audio: AudioConfig) -> mpsc::UnboundedSender<DecodedAudio> {
    let (tx, mut rx) = mpsc::unbounded_channel::<DecodedAudio>();
    std::thread::spawn(move || {
        let mut playback = match Playback::new(&audio) {
            Ok(p) => p,
            Err(e) => {
                warn!("audio output unavailable, responses will be text only: {e}");
                while rx.blocking_recv().is_some() {}
                return;
            }
        };
        while let Some(decoded) = rx.blocking_recv() {
            if let Err(e) = playback.play(&decoded) {
                warn!("playback failed: {e}");
            }
        }
    });
    tx
}

fn list_devices() -> anyhow::Result<()> {
    println!("Input devices:");
    for name in Recorder::list_input_devices()? {
        println!("  - {name}");
    }

    println!("\nOutput devices:");
    for name in Playback::list_output_devices()? {
        println!("  - {name}");
    }

    Ok(())
}
