//! # Live Radio Player
//!
//! Resilient playback controller for a single live internet radio stream.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                          PRESENTATION LAYER                                  │
//! │   ┌───────────────┐   ┌───────────────┐   ┌──────────────────────────┐      │
//! │   │  Control UI   │   │ "Play now"    │   │ OS media keys / car head │      │
//! │   │  (ui::server) │   │  trigger      │   │ unit (platform session)  │      │
//! │   └───────┬───────┘   └───────┬───────┘   └────────────┬─────────────┘      │
//! │           │  toggle/restart/volume/share               │ MediaAction        │
//! │           ▼                   ▼                        ▼                    │
//! │  ┌─────────────────────────────────────────────────────────────────────┐   │
//! │  │            StreamPlaybackController (controller)                     │   │
//! │  │   PlaybackSession ── status / counters / volume / listening time    │   │
//! │  │        │                                                             │   │
//! │  │        │ connect sequence: endpoint walk → backoff → list retry      │   │
//! │  │        ▼                                                             │   │
//! │  │   ┌──────────┐  ┌──────────┐  ┌──────────┐                           │   │
//! │  │   │Endpoint 0│→ │Endpoint 1│→ │Endpoint 2│  (StreamEndpoint)         │   │
//! │  │   └──────────┘  └──────────┘  └──────────┘                           │   │
//! │  └───────┬──────────────────┬──────────────────┬──────────────────────┘   │
//! │          ▼                  ▼                  ▼                           │
//! │   ┌─────────────┐   ┌──────────────┐   ┌───────────────┐                  │
//! │   │ AudioOutput │   │  Wake lock   │   │ Media session │   (platform)     │
//! │   │ (HTTP GET)  │   │ (best effort)│   │  registry     │                  │
//! │   └──────┬──────┘   └──────────────┘   └───────────────┘                  │
//! └──────────┼──────────────────────────────────────────────────────────────────┘
//!            │ HTTPS
//!            ▼
//!     externally hosted AAC/MP3 live stream
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod platform;
pub mod protocol;
pub mod stream;
#[cfg(feature = "control-ui")]
pub mod ui;

pub use controller::{ControllerOptions, StreamPlaybackController};
pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    use std::time::Duration;

    /// Connect sequences allowed before the session gives up
    pub const MAX_CONNECTION_ATTEMPTS: u32 = 3;

    /// Full passes over the endpoint list after the first one fails
    pub const MAX_RETRIES: u32 = 2;

    /// Time an endpoint gets to start producing audio
    pub const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Delay before trying the next endpoint in the list
    pub const ENDPOINT_BACKOFF: Duration = Duration::from_millis(1000);

    /// Delay before walking the whole list again
    pub const RETRY_BACKOFF: Duration = Duration::from_millis(2000);

    /// Delay between tearing down the output and reconnecting on restart
    pub const RESTART_DELAY: Duration = Duration::from_millis(1000);

    /// Listening-time accumulator period
    pub const LISTENING_TICK: Duration = Duration::from_secs(1);

    /// Synthetic listener-count refresh period
    pub const LISTENERS_TICK: Duration = Duration::from_secs(30);

    /// How long the "link copied" message stays up
    pub const SHARE_MESSAGE_DURATION: Duration = Duration::from_secs(3);

    /// Now-playing rotation interval bounds (3 to 5 minutes)
    pub const NOW_PLAYING_MIN_INTERVAL: Duration = Duration::from_secs(180);
    pub const NOW_PLAYING_MAX_INTERVAL: Duration = Duration::from_secs(300);

    /// Default volume on a fresh session (0-100)
    pub const DEFAULT_VOLUME: u8 = 80;

    /// Synthetic listener figure: base, floor and jitter bounds
    pub const LISTENERS_BASE: u32 = 1200;
    pub const LISTENERS_FLOOR: u32 = 800;
    pub const LISTENERS_JITTER: u32 = 50;
    pub const LISTENERS_PLAYING_BONUS: u32 = 50;

    /// Listener figure shown before the first refresh
    pub const LISTENERS_INITIAL: u32 = 1247;

    /// Gap without audio bytes before the transport reports buffering
    pub const TRANSPORT_WAITING_AFTER: Duration = Duration::from_secs(3);

    /// Gap without audio bytes before the transport reports a stall
    pub const TRANSPORT_STALL_AFTER: Duration = Duration::from_secs(8);

    /// Chunk buffer capacity between transport and decoder (in chunks)
    pub const STREAM_BUFFER_CAPACITY: usize = 256;

    /// Default HTTP port for the control UI
    pub const DEFAULT_HTTP_PORT: u16 = 8080;
}
