//! Mutable playback session state
//!
//! `PlaybackSession` holds the counters and flags of one playback session.
//! It has no I/O of its own; the controller drives every transition and
//! publishes snapshots of it.

use uuid::Uuid;

use crate::constants::{DEFAULT_VOLUME, LISTENERS_INITIAL};
use crate::protocol::{messages, NowPlaying, PlaybackStatus, StatusSnapshot};

/// Core session state, owned exclusively by the controller
#[derive(Debug, Clone)]
pub struct PlaybackSession {
    pub id: Uuid,
    pub status: PlaybackStatus,
    pub message: String,
    /// Endpoint currently attempted or played
    pub active_endpoint_index: usize,
    /// Endpoint that last reached `Playing`; preferred on resume
    pub last_successful_endpoint: Option<usize>,
    pub connection_attempts: u32,
    pub retry_count: u32,
    pub listening_seconds: u64,
    volume: u8,
    muted: bool,
    /// Last non-zero volume, restored by unmute
    last_audible_volume: u8,
    pub has_user_interacted: bool,
    pub wake_lock_held: bool,
    pub online: bool,
    pub listeners: u32,
    pub now_playing: NowPlaying,
}

impl PlaybackSession {
    pub fn new(now_playing: NowPlaying) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: PlaybackStatus::Idle,
            message: messages::IDLE.to_string(),
            active_endpoint_index: 0,
            last_successful_endpoint: None,
            connection_attempts: 0,
            retry_count: 0,
            listening_seconds: 0,
            volume: DEFAULT_VOLUME,
            muted: false,
            last_audible_volume: DEFAULT_VOLUME,
            has_user_interacted: false,
            wake_lock_held: false,
            online: true,
            listeners: LISTENERS_INITIAL,
            now_playing,
        }
    }

    /// Move to `status` with a message
    pub fn transition(&mut self, status: PlaybackStatus, message: impl Into<String>) {
        self.status = status;
        self.message = message.into();
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    /// Volume as heard, 0-100
    pub fn effective_volume(&self) -> u8 {
        if self.muted {
            0
        } else {
            self.volume
        }
    }

    /// Output gain, 0.0-1.0
    pub fn effective_gain(&self) -> f32 {
        self.effective_volume() as f32 / 100.0
    }

    /// Clamp to 0-100; zero mutes, anything else unmutes
    pub fn set_volume(&mut self, volume: i32) {
        let volume = volume.clamp(0, 100) as u8;
        self.volume = volume;
        self.muted = volume == 0;
        if volume > 0 {
            self.last_audible_volume = volume;
        }
    }

    pub fn mute(&mut self) {
        self.muted = true;
    }

    /// Unmute, restoring the last audible volume if the slider sits at 0
    pub fn unmute(&mut self) {
        self.muted = false;
        if self.volume == 0 {
            self.volume = self.last_audible_volume;
        }
    }

    pub fn toggle_mute(&mut self) {
        if self.muted {
            self.unmute();
        } else {
            self.mute();
        }
    }

    /// Clear attempt and retry budgets
    pub fn reset_counters(&mut self) {
        self.connection_attempts = 0;
        self.retry_count = 0;
    }

    /// Hard reset performed by an explicit restart
    pub fn hard_reset(&mut self) {
        self.reset_counters();
        self.active_endpoint_index = 0;
        self.last_successful_endpoint = None;
        self.listening_seconds = 0;
    }

    /// Message appropriate to the current status, used after transient notices
    pub fn resting_message(&self) -> String {
        match self.status {
            PlaybackStatus::Playing => messages::LIVE.to_string(),
            PlaybackStatus::Buffering => messages::BUFFERING.to_string(),
            PlaybackStatus::Paused if !self.online => messages::OFFLINE.to_string(),
            PlaybackStatus::Paused => messages::PAUSED.to_string(),
            PlaybackStatus::Failed => messages::FAILED.to_string(),
            PlaybackStatus::Connecting => messages::CONNECTING.to_string(),
            PlaybackStatus::Reconnecting => messages::RECONNECTING.to_string(),
            PlaybackStatus::Idle => messages::IDLE.to_string(),
        }
    }

    pub fn snapshot(&self, initializing: bool) -> StatusSnapshot {
        StatusSnapshot {
            session_id: self.id,
            status: self.status,
            message: self.message.clone(),
            active_endpoint_index: self.active_endpoint_index,
            connection_attempts: self.connection_attempts,
            retry_count: self.retry_count,
            listening_seconds: self.listening_seconds,
            listening_time: format_listening_time(self.listening_seconds),
            listeners: self.listeners,
            volume: self.volume,
            muted: self.muted,
            effective_volume: self.effective_volume(),
            online: self.online,
            wake_lock_held: self.wake_lock_held,
            initializing,
            now_playing: self.now_playing.clone(),
            updated_at: chrono::Utc::now(),
        }
    }
}

/// Render listening time as "1h 2m 3s", "2m 3s" or "3s"
pub fn format_listening_time(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn session() -> PlaybackSession {
        PlaybackSession::new(NowPlaying::default())
    }

    #[test]
    fn test_zero_volume_mutes_and_unmute_restores() {
        let mut s = session();
        s.set_volume(35);
        s.set_volume(0);
        assert!(s.muted());
        assert_eq!(s.effective_volume(), 0);

        s.unmute();
        assert!(!s.muted());
        assert_eq!(s.volume(), 35);
        assert_eq!(s.effective_volume(), 35);
    }

    #[test]
    fn test_mute_keeps_volume() {
        let mut s = session();
        s.set_volume(60);
        s.mute();
        assert_eq!(s.volume(), 60);
        assert_eq!(s.effective_gain(), 0.0);

        s.toggle_mute();
        assert!(!s.muted());
        assert!((s.effective_gain() - 0.6).abs() < f32::EPSILON);
    }

    #[test]
    fn test_hard_reset_clears_listening_time() {
        let mut s = session();
        s.listening_seconds = 125;
        s.connection_attempts = 2;
        s.retry_count = 1;
        s.active_endpoint_index = 2;
        s.last_successful_endpoint = Some(2);

        s.hard_reset();
        assert_eq!(s.listening_seconds, 0);
        assert_eq!(s.connection_attempts, 0);
        assert_eq!(s.retry_count, 0);
        assert_eq!(s.active_endpoint_index, 0);
        assert_eq!(s.last_successful_endpoint, None);
    }

    #[test]
    fn test_format_listening_time() {
        assert_eq!(format_listening_time(0), "0s");
        assert_eq!(format_listening_time(59), "59s");
        assert_eq!(format_listening_time(61), "1m 1s");
        assert_eq!(format_listening_time(3600), "1h 0m 0s");
        assert_eq!(format_listening_time(3725), "1h 2m 5s");
    }

    proptest! {
        #[test]
        fn prop_volume_always_clamped(v in any::<i32>()) {
            let mut s = session();
            s.set_volume(v);
            prop_assert!(s.volume() <= 100);
            prop_assert_eq!(s.muted(), v <= 0);
            prop_assert!(s.effective_gain() >= 0.0 && s.effective_gain() <= 1.0);
        }

        #[test]
        fn prop_unmute_after_zero_restores_last_positive(v in 1i32..=100) {
            let mut s = session();
            s.set_volume(v);
            s.set_volume(0);
            s.unmute();
            prop_assert_eq!(s.volume() as i32, v);
        }

        #[test]
        fn prop_format_round_trips_seconds(secs in 0u64..400_000) {
            let text = format_listening_time(secs);
            let total: u64 = text
                .split_whitespace()
                .map(|part| {
                    let (num, unit) = part.split_at(part.len() - 1);
                    let n: u64 = num.parse().unwrap();
                    match unit {
                        "h" => n * 3600,
                        "m" => n * 60,
                        _ => n,
                    }
                })
                .sum();
            prop_assert_eq!(total, secs);
        }
    }
}
