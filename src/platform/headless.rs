//! Host implementations for a process without a display
//!
//! There is no screen to keep awake and no share sheet, so those report
//! unsupported. The media session keeps the registered handlers so media
//! keys can still be routed in through `LoggingMediaSession::trigger`.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::task::JoinHandle;
use url::Url;

use crate::error::PlatformError;
use crate::platform::{Clipboard, Connectivity, MediaActionHandler, MediaSession, ShareTarget, WakeLock};
use crate::protocol::{MediaAction, MediaPlaybackState, PositionState, SharePayload, TrackMetadata};

/// Wake lock for hosts without a display
pub struct NoWakeLock;

impl WakeLock for NoWakeLock {
    fn acquire(&self) -> Result<(), PlatformError> {
        Err(PlatformError::Unsupported("wake lock"))
    }

    fn release(&self) {}
}

/// Media session that logs what it is given and keeps action handlers
#[derive(Default)]
pub struct LoggingMediaSession {
    handlers: Mutex<HashMap<MediaAction, MediaActionHandler>>,
    metadata: Mutex<Option<TrackMetadata>>,
    state: Mutex<Option<MediaPlaybackState>>,
    position: Mutex<Option<PositionState>>,
}

impl LoggingMediaSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route a media key press to its registered handler.
    /// Returns false when nothing is registered for `action`.
    pub fn trigger(&self, action: MediaAction) -> bool {
        let handler = self.handlers.lock().get(&action).cloned();
        match handler {
            Some(handler) => {
                handler(action);
                true
            }
            None => false,
        }
    }

    pub fn metadata(&self) -> Option<TrackMetadata> {
        self.metadata.lock().clone()
    }

    pub fn playback_state(&self) -> Option<MediaPlaybackState> {
        *self.state.lock()
    }

    pub fn position(&self) -> Option<PositionState> {
        *self.position.lock()
    }
}

impl MediaSession for LoggingMediaSession {
    fn set_metadata(&self, metadata: &TrackMetadata) -> Result<(), PlatformError> {
        tracing::debug!(title = %metadata.title, artist = %metadata.artist, "Media session metadata");
        *self.metadata.lock() = Some(metadata.clone());
        Ok(())
    }

    fn set_playback_state(&self, state: MediaPlaybackState) -> Result<(), PlatformError> {
        tracing::debug!(?state, "Media session playback state");
        *self.state.lock() = Some(state);
        Ok(())
    }

    fn set_position_state(&self, position: PositionState) -> Result<(), PlatformError> {
        tracing::trace!(position = position.position, "Media session position");
        *self.position.lock() = Some(position);
        Ok(())
    }

    fn set_action_handler(
        &self,
        action: MediaAction,
        handler: MediaActionHandler,
    ) -> Result<(), PlatformError> {
        self.handlers.lock().insert(action, handler);
        Ok(())
    }
}

/// Share target for hosts without a share sheet
pub struct UnsupportedShare;

impl ShareTarget for UnsupportedShare {
    fn share(&self, _payload: &SharePayload) -> Result<(), PlatformError> {
        Err(PlatformError::Unsupported("share"))
    }
}

/// Clipboard that keeps the last written text in memory
#[derive(Default)]
pub struct MemoryClipboard {
    last: Mutex<Option<String>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Option<String> {
        self.last.lock().clone()
    }
}

impl Clipboard for MemoryClipboard {
    fn write_text(&self, text: &str) -> Result<(), PlatformError> {
        tracing::info!("Copied to clipboard: {}", text);
        *self.last.lock() = Some(text.to_string());
        Ok(())
    }
}

/// Poll `probe_url` and feed the result into `connectivity`.
///
/// Any HTTP response counts as online; only transport failures count as
/// offline.
pub fn spawn_connectivity_probe(
    connectivity: Connectivity,
    client: reqwest::Client,
    probe_url: Url,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let online = match client.head(probe_url.clone()).timeout(every).send().await {
                Ok(_) => true,
                Err(e) => {
                    tracing::debug!(error = %e, "Connectivity probe failed");
                    false
                }
            };

            if online != connectivity.is_online() {
                if online {
                    tracing::info!("Network back online");
                } else {
                    tracing::warn!("Network offline");
                }
            }
            connectivity.set_online(online);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_trigger_routes_to_registered_handler() {
        let session = LoggingMediaSession::new();
        assert!(!session.trigger(MediaAction::Play));

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        session
            .set_action_handler(
                MediaAction::NextTrack,
                Arc::new(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        assert!(session.trigger(MediaAction::NextTrack));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_headless_features_degrade() {
        assert!(matches!(NoWakeLock.acquire(), Err(PlatformError::Unsupported(_))));

        let payload = SharePayload {
            title: "t".into(),
            text: "listen".into(),
            url: "https://radio.example".into(),
        };
        assert!(UnsupportedShare.share(&payload).is_err());

        let clipboard = MemoryClipboard::new();
        clipboard.write_text(&payload.clipboard_text()).unwrap();
        assert_eq!(
            clipboard.contents().as_deref(),
            Some("listen https://radio.example")
        );
    }
}
