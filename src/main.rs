use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};
use voice_stream::{
    create_router, AppState, CaptureKind, CaptureSourceFactory, Config, ConnectionState,
    Notification, StreamingClient, WebSocketConnector,
};

#[derive(Parser)]
#[command(name = "voice-stream", version, about = "Realtime audio streaming over WebSocket")]
struct Cli {
    /// Config file (extension optional)
    #[arg(short, long, default_value = "config/voice-stream")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the streaming server
    Serve,
    /// Connect, record for a while, then stop
    Stream {
        /// Recording length in seconds
        #[arg(short, long, default_value_t = 5)]
        seconds: u64,
        /// Stream this file instead of synthetic audio
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Server URL (overrides the config)
        #[arg(long)]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Serve => serve(&cfg).await,
        Command::Stream { seconds, file, url } => stream(&cfg, seconds, file, url).await,
    }
}

async fn serve(cfg: &Config) -> Result<()> {
    let addr = format!("{}:{}", cfg.server.bind, cfg.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Streaming server listening on {}", addr);
    info!("Recordings will be written to {}", cfg.server.uploads_path);

    let state = AppState::new(&cfg.server.uploads_path);
    axum::serve(listener, create_router(state))
        .await
        .context("Server error")?;

    Ok(())
}

async fn stream(
    cfg: &Config,
    seconds: u64,
    file: Option<PathBuf>,
    url: Option<String>,
) -> Result<()> {
    let mut session_config = cfg.session();
    if let Some(url) = url {
        session_config.server_url = url;
    }

    let kind = file.map(CaptureKind::File).unwrap_or_else(|| cfg.capture_kind());
    let capture = CaptureSourceFactory::create(kind, cfg.capture.fragment_bytes);
    let connector = Arc::new(WebSocketConnector::new(session_config.server_url.clone()));

    let (client, mut notifications, task) =
        StreamingClient::spawn(&session_config, connector, capture);

    let printer = tokio::spawn(async move {
        while let Some(notification) = notifications.recv().await {
            match notification {
                Notification::System(text) => info!("{}", text),
                Notification::Error(text) => error!("{}", text),
                Notification::Status(text) => info!("[status] {}", text),
            }
        }
    });

    // Wait for the channel (the client keeps retrying on its own)
    let connected = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match client.snapshot().await {
                Some(snapshot) if snapshot.connection == ConnectionState::Connected => break true,
                Some(_) => tokio::time::sleep(Duration::from_millis(50)).await,
                None => break false,
            }
        }
    })
    .await
    .unwrap_or(false);

    if !connected {
        client.shutdown();
        bail!("Could not connect to {}", session_config.server_url);
    }

    client.arm().await?;
    info!("Recording for {} seconds...", seconds);
    tokio::time::sleep(Duration::from_secs(seconds)).await;

    // Trailing acks arrive after the stop; give them a moment
    let summary = client.disarm().await;
    tokio::time::sleep(Duration::from_millis(500)).await;

    match (summary, client.snapshot().await) {
        (Some(summary), Some(snapshot)) => {
            let recording = snapshot.recording.unwrap_or_default();
            info!(
                "Recording {} finished: {:.2}s, {} fragments sent, {} acknowledged ({} bytes)",
                summary.session_token,
                summary.duration_secs,
                summary.fragments_forwarded,
                recording.chunk_count,
                recording.bytes_sent
            );
        }
        _ => info!("Recording ended before it was stopped (connection lost)"),
    }

    client.shutdown();
    task.await.context("Client task panicked")?;
    printer.abort();

    Ok(())
}
