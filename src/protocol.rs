//! Types shared between the controller and its consumers
//!
//! Everything here is serializable so the control UI can push it over
//! HTTP and WebSocket without translation.

use serde::{Deserialize, Serialize};

/// Playback state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Connecting,
    Playing,
    Paused,
    Buffering,
    Reconnecting,
    Failed,
}

impl PlaybackStatus {
    /// Audio is attached and the user considers the stream running
    pub fn is_active(self) -> bool {
        matches!(self, PlaybackStatus::Playing | PlaybackStatus::Buffering)
    }

    /// A connect sequence is responsible for the current state
    pub fn is_connecting(self) -> bool {
        matches!(self, PlaybackStatus::Connecting | PlaybackStatus::Reconnecting)
    }
}

/// Human-readable status strings
pub mod messages {
    pub const IDLE: &str = "Tap play to listen";
    pub const CONNECTING: &str = "Connecting to stream...";
    pub const RESTARTING: &str = "Restarting stream...";
    pub const RECONNECTING: &str = "Reconnecting...";
    pub const LIVE: &str = "AAC stream • Live";
    pub const BUFFERING: &str = "Loading...";
    pub const PAUSED: &str = "Paused - tap play to continue";
    pub const OFFLINE: &str = "No internet connection";
    pub const FAILED: &str = "Error - tap play to retry";
    pub const LINK_COPIED: &str = "Link copied! Paste it in your favourite app";

    /// "Reconnecting... (n/m)"
    pub fn reconnecting(retry: u32, max_retries: u32) -> String {
        format!("Reconnecting... ({}/{})", retry, max_retries)
    }
}

/// Title and artist currently on air
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NowPlaying {
    pub title: String,
    pub artist: String,
}

/// Read-only view of the playback session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub session_id: uuid::Uuid,
    pub status: PlaybackStatus,
    pub message: String,
    pub active_endpoint_index: usize,
    pub connection_attempts: u32,
    pub retry_count: u32,
    pub listening_seconds: u64,
    pub listening_time: String,
    pub listeners: u32,
    pub volume: u8,
    pub muted: bool,
    /// Volume as heard: 0 while muted
    pub effective_volume: u8,
    pub online: bool,
    pub wake_lock_held: bool,
    pub initializing: bool,
    pub now_playing: NowPlaying,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Commands accepted from the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    TogglePlay,
    Restart,
    SetVolume { volume: u8 },
    SetMute { muted: bool },
    ToggleMute,
    Share,
    Visibility { visible: bool },
}

/// Hardware / OS media controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaAction {
    Play,
    Pause,
    Stop,
    SeekBackward,
    SeekForward,
    PreviousTrack,
    NextTrack,
}

impl MediaAction {
    pub const ALL: [MediaAction; 7] = [
        MediaAction::Play,
        MediaAction::Pause,
        MediaAction::Stop,
        MediaAction::SeekBackward,
        MediaAction::SeekForward,
        MediaAction::PreviousTrack,
        MediaAction::NextTrack,
    ];

    /// Seek-style controls have no timeline on a live broadcast
    pub fn is_seek_like(self) -> bool {
        matches!(
            self,
            MediaAction::SeekBackward
                | MediaAction::SeekForward
                | MediaAction::PreviousTrack
                | MediaAction::NextTrack
        )
    }
}

/// Playback indicator published to the OS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaPlaybackState {
    None,
    Paused,
    Playing,
}

/// Position indicator for a live stream
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionState {
    /// `None` means unbounded (live)
    pub duration: Option<f64>,
    pub playback_rate: f64,
    pub position: f64,
}

impl PositionState {
    pub fn live(position_seconds: u64) -> Self {
        Self {
            duration: None,
            playback_rate: 1.0,
            position: position_seconds as f64,
        }
    }
}

/// Artwork entry of the media-session metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artwork {
    pub src: String,
    pub sizes: String,
    #[serde(rename = "type")]
    pub mime_type: String,
}

/// Metadata published to the OS media session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub artwork: Vec<Artwork>,
}

/// Result of a `toggle_play` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleOutcome {
    /// Output paused synchronously
    Paused,
    /// A connect sequence was started
    Connecting,
    /// A connect sequence is already in flight; input dropped
    Busy,
    /// No connectivity; no attempt made
    Offline,
    /// Connect budget spent; the session moved to `Failed`
    Refused,
    /// Controller already shut down
    ShutDown,
}

/// Reply to a `ControlMessage`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ControlReply {
    Toggled { outcome: ToggleOutcome },
    Restart { accepted: bool },
    Shared { outcome: ShareOutcome },
    Applied,
}

/// Payload handed to the host share primitive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharePayload {
    pub title: String,
    pub text: String,
    pub url: String,
}

impl SharePayload {
    /// Text written to the clipboard when sharing is unavailable
    pub fn clipboard_text(&self) -> String {
        format!("{} {}", self.text, self.url)
    }
}

/// Result of a `share` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareOutcome {
    Shared,
    Copied,
    Unavailable,
}
