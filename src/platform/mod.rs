//! Host platform seams
//!
//! The controller only talks to the host through these traits. Unsupported
//! features report `PlatformError::Unsupported` and the controller degrades
//! silently.

pub mod headless;
pub mod http;

#[cfg(test)]
pub(crate) mod fake;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use url::Url;

use crate::error::{AudioError, PlatformError};
use crate::protocol::{MediaAction, MediaPlaybackState, PositionState, SharePayload, TrackMetadata};

pub use headless::{
    spawn_connectivity_probe, LoggingMediaSession, MemoryClipboard, NoWakeLock, UnsupportedShare,
};
pub use http::HttpStreamOutput;

/// Events raised by an attached audio output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    /// Enough data to start; not yet producing audio
    CanPlay,
    /// Audio is actually flowing
    Playing,
    /// Paused by the host
    Paused,
    /// Data starved; playback will resume on its own
    Waiting,
    /// Data stopped arriving
    Stalled,
    /// The source ended, which a live broadcast never should
    Ended,
    Error(String),
}

/// Event stream of one attachment. Closed when the attachment is detached.
pub type OutputEvents = mpsc::UnboundedReceiver<OutputEvent>;

/// Audio output primitive
///
/// Implementations must tolerate `pause`/`stop` on an already stopped
/// output.
pub trait AudioOutput: Send {
    /// Attach a new source, replacing any previous one
    fn attach(&mut self, uri: &Url) -> Result<OutputEvents, AudioError>;

    /// Start loading and playing the attached source
    fn play(&mut self) -> Result<(), AudioError>;

    fn pause(&mut self);

    /// Stop and detach the source
    fn stop(&mut self);

    /// Output gain, 0.0-1.0
    fn set_gain(&mut self, gain: f32);

    fn is_attached(&self) -> bool;
}

/// Display wake lock
pub trait WakeLock: Send + Sync {
    fn acquire(&self) -> Result<(), PlatformError>;
    fn release(&self);
}

/// Callback routed from OS media controls
pub type MediaActionHandler = Arc<dyn Fn(MediaAction) + Send + Sync>;

/// OS media-session registry
pub trait MediaSession: Send + Sync {
    fn set_metadata(&self, metadata: &TrackMetadata) -> Result<(), PlatformError>;
    fn set_playback_state(&self, state: MediaPlaybackState) -> Result<(), PlatformError>;
    fn set_position_state(&self, position: PositionState) -> Result<(), PlatformError>;
    fn set_action_handler(
        &self,
        action: MediaAction,
        handler: MediaActionHandler,
    ) -> Result<(), PlatformError>;
}

/// Native share sheet
pub trait ShareTarget: Send + Sync {
    fn share(&self, payload: &SharePayload) -> Result<(), PlatformError>;
}

pub trait Clipboard: Send + Sync {
    fn write_text(&self, text: &str) -> Result<(), PlatformError>;
}

/// Process-wide online/offline signal
#[derive(Clone)]
pub struct Connectivity {
    tx: Arc<watch::Sender<bool>>,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    /// Update the signal; observers only wake on an actual change
    pub fn set_online(&self, online: bool) {
        self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Order in which the endpoint list is walked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EndpointOrder {
    #[default]
    AsListed,
    /// Try unsigned mirrors before the signed first entry
    MirrorsFirst,
}

/// What the host supports, supplied once at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub supports_wake_lock: bool,
    /// Playback may only start after a user gesture
    pub requires_gesture_before_autoplay: bool,
    pub endpoint_order: EndpointOrder,
    /// The host drops wake locks when the page goes to background
    pub wake_lock_revoked_on_hide: bool,
}

impl Capabilities {
    pub fn desktop() -> Self {
        Self {
            supports_wake_lock: true,
            requires_gesture_before_autoplay: true,
            endpoint_order: EndpointOrder::AsListed,
            wake_lock_revoked_on_hide: true,
        }
    }

    pub fn ios() -> Self {
        Self {
            supports_wake_lock: false,
            requires_gesture_before_autoplay: true,
            endpoint_order: EndpointOrder::MirrorsFirst,
            wake_lock_revoked_on_hide: true,
        }
    }

    pub fn android() -> Self {
        Self {
            supports_wake_lock: true,
            requires_gesture_before_autoplay: true,
            endpoint_order: EndpointOrder::AsListed,
            wake_lock_revoked_on_hide: true,
        }
    }

    /// No display and no autoplay policy
    pub fn headless() -> Self {
        Self {
            supports_wake_lock: false,
            requires_gesture_before_autoplay: false,
            endpoint_order: EndpointOrder::AsListed,
            wake_lock_revoked_on_hide: false,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::desktop()
    }
}

/// Everything the controller needs from the host
pub struct Platform {
    pub output: Box<dyn AudioOutput>,
    pub wake_lock: Arc<dyn WakeLock>,
    pub media_session: Arc<dyn MediaSession>,
    pub share: Arc<dyn ShareTarget>,
    pub clipboard: Arc<dyn Clipboard>,
    pub connectivity: watch::Receiver<bool>,
    pub capabilities: Capabilities,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connectivity_only_notifies_on_change() {
        let connectivity = Connectivity::new(true);
        let mut rx = connectivity.subscribe();

        connectivity.set_online(true);
        assert!(!rx.has_changed().unwrap());

        connectivity.set_online(false);
        assert!(rx.has_changed().unwrap());
        rx.changed().await.unwrap();
        assert!(!*rx.borrow_and_update());
        assert!(!connectivity.is_online());
    }

    #[test]
    fn test_presets() {
        assert!(!Capabilities::ios().supports_wake_lock);
        assert_eq!(Capabilities::ios().endpoint_order, EndpointOrder::MirrorsFirst);
        assert!(!Capabilities::headless().requires_gesture_before_autoplay);
        assert_eq!(Capabilities::default(), Capabilities::desktop());
    }
}
