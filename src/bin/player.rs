//! Radio Player Application
//!
//! Plays the configured live stream headless and serves the control UI.
//!
//! Usage: `radio-player [config.toml]`

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use live_radio_player::{
    config::AppConfig,
    platform::{
        spawn_connectivity_probe, Connectivity, HttpStreamOutput, LoggingMediaSession,
        MemoryClipboard, NoWakeLock, Platform, UnsupportedShare,
    },
    stream::create_shared_buffer,
    ui::WebServer,
    ControllerOptions, StreamPlaybackController,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Live Radio Player");

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref()).context("loading config")?;

    // Transport feeds the chunk buffer; drain it so the transport never
    // backs up while no decoder is attached
    let buffer = create_shared_buffer(config.stream.buffer_capacity);
    let output = HttpStreamOutput::new(buffer.clone())?;
    let transport_stats = output.stats().clone();

    let connectivity = Connectivity::default();
    if let Some(probe_url) = config.probe_url()? {
        let every = Duration::from_secs(config.platform.probe_interval_secs.max(1));
        spawn_connectivity_probe(connectivity.clone(), reqwest::Client::new(), probe_url, every);
    }

    let platform = Platform {
        output: Box::new(output),
        wake_lock: Arc::new(NoWakeLock),
        media_session: Arc::new(LoggingMediaSession::new()),
        share: Arc::new(UnsupportedShare),
        clipboard: Arc::new(MemoryClipboard::new()),
        connectivity: connectivity.subscribe(),
        capabilities: config.capabilities(),
    };

    let controller = StreamPlaybackController::new(ControllerOptions::from_config(&config)?, platform)?;

    println!("\n=== Stream Endpoints ===");
    for (index, uri) in controller.endpoints().iter().enumerate() {
        println!("  [{}] {}", index, uri);
    }
    println!();

    if config.ui.enabled {
        let web_server = WebServer::new(config.ui.clone(), controller.clone());
        let _web_handle = web_server.start_background();
        tracing::info!(
            "Web UI available at http://{}:{}",
            config.ui.bind_address,
            config.ui.http_port
        );
    }

    if config.stream.autoplay && !controller.autoplay() {
        tracing::info!("Autoplay not started; press play in the control UI");
    }

    let drain = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(20));
        let mut last_stats_time = std::time::Instant::now();
        loop {
            ticker.tick().await;
            while buffer.try_pop().is_some() {}

            if last_stats_time.elapsed() >= Duration::from_secs(10) {
                let stats = buffer.stats();
                tracing::info!(
                    bytes = transport_stats.bytes_received.load(Ordering::Relaxed),
                    chunks = transport_stats.chunks_received.load(Ordering::Relaxed),
                    overflows = stats.overflows,
                    fill = buffer.fill_level(),
                    "Transport stats"
                );
                last_stats_time = std::time::Instant::now();
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    controller.shutdown();
    drain.abort();

    Ok(())
}
