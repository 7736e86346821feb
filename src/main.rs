//! CLI for vigil
//!
//! Subcommands:
//! - `watch`: subscribe to an event stream and log what arrives
//! - `serve`: run the demo event server, emitting a synthetic chunk periodically

use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use tracing::{error, info, warn};
use vigil::broker::{ChunkInfo, EventKind, EventPayload, KindFilter, Notification};
use vigil::client::EventClient;
use vigil::config::load_config;
use vigil::connection::ClientOptions;
use vigil::transport::endpoint::resolve_url;
use vigil::transport::{EventServer, ServerFrame, start_event_server};
use vigil::utils::logging;

#[derive(Parser)]
#[command(name = "vigil")]
enum Command {
    /// Subscribe to an event stream and log every event and status change
    Watch {
        /// Endpoint to watch (default: from configuration)
        #[arg(long)]
        url: Option<String>,
        /// Event kinds to receive; repeatable (default: all)
        #[arg(long = "kind", value_parser = parse_kind)]
        kinds: Vec<EventKind>,
    },
    /// Run the demo event server
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8000")]
        addr: String,
        /// Seconds between synthetic `new_chunk` events
        #[arg(long, default_value_t = 5)]
        interval_secs: u64,
    },
}

fn parse_kind(tag: &str) -> Result<EventKind, String> {
    EventKind::from_tag(tag).ok_or_else(|| {
        let known: Vec<&str> = EventKind::ALL.iter().map(|kind| kind.as_str()).collect();
        format!("unknown event kind `{tag}` (expected one of: {})", known.join(", "))
    })
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cmd = Command::parse();

    let settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {e}");
            return;
        }
    };
    logging::init(&settings.logging.level);

    let result = match cmd {
        Command::Watch { url, kinds } => {
            let url = url.unwrap_or_else(|| resolve_url(&settings.endpoint));
            run_watch(url, kinds, ClientOptions::from_settings(&settings)).await
        }
        Command::Serve {
            addr,
            interval_secs,
        } => run_server(addr, interval_secs).await,
    };

    if let Err(e) = result {
        error!("vigil failed: {e}");
    }
}

async fn run_watch(
    url: String,
    kinds: Vec<EventKind>,
    options: ClientOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = EventClient::new(url, options);
    let filter = if kinds.is_empty() {
        KindFilter::all()
    } else {
        kinds.into_iter().collect()
    };

    let mut states = client.watch_state();
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            info!("Connection status: {}", state.status());
        }
    });

    let _subscription = client.subscribe(filter, |notification| match notification {
        Notification::Event(event) => match event.payload() {
            EventPayload::NewChunk(chunk) => {
                info!("New chunk {} ({:.2} MB)", chunk.filename, chunk.size_mb())
            }
            EventPayload::AlertTriggered(alert) => info!(
                "Alert {} on {}: {} ({:.1}%)",
                alert.alert_id,
                alert.video_name,
                alert.description,
                alert.confidence_percent()
            ),
        },
        Notification::Error(e) => warn!("Subscription error: {e}"),
    });

    info!("Watching {}. Press Ctrl-C to stop.", client.endpoint());
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully.");
    client.shutdown();
    Ok(())
}

async fn run_server(addr: String, interval_secs: u64) -> Result<(), Box<dyn std::error::Error>> {
    let server = EventServer::new();

    let emitter = {
        let server = server.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
            ticker.tick().await;
            let mut sequence: u64 = 0;
            loop {
                ticker.tick().await;
                sequence += 1;
                let chunk = ChunkInfo {
                    filename: format!("chunk_{sequence:05}.mp4"),
                    size: 1_048_576 * (1 + sequence % 4),
                    created: Utc::now().to_rfc3339(),
                };
                let sent = server.broadcast(&ServerFrame::new_chunk(&chunk));
                info!("Emitted {} to {sent} client(s)", chunk.filename);
            }
        })
    };

    let result = tokio::select! {
        result = start_event_server(&addr, server.clone()) => {
            error!("Event server exited unexpectedly.");
            result
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
            server.disconnect_all();
            Ok(())
        }
    };

    emitter.abort();
    result.map_err(Into::into)
}
