//! Player configuration
//!
//! Every field has a default, so an empty or missing file yields a working
//! player for the default station.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::constants::*;
use crate::error::ConfigError;
use crate::platform::{Capabilities, EndpointOrder};
use crate::protocol::{Artwork, NowPlaying, SharePayload, TrackMetadata};
use crate::stream::StreamEndpoint;

/// Top-level configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub stream: StreamConfig,
    pub retry: RetryConfig,
    pub station: StationConfig,
    pub listeners: ListenersConfig,
    pub platform: PlatformConfig,
    pub ui: UiConfig,
    pub share: ShareConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Candidate URIs for the live stream, highest preference first
    pub endpoints: Vec<String>,
    /// Start playing on launch when the platform allows it
    pub autoplay: bool,
    /// Initial volume, 0-100
    pub volume: u8,
    pub buffer_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            endpoints: vec![
                concat!(
                    "https://stream-175.zeno.fm/bbh6u7w8gwzuv?zt=eyJhbGciOiJIUzI1NiJ9.",
                    "eyJzdHJlYW0iOiJiYmg2dTd3OGd3enV2IiwiaG9zdCI6InN0cmVhbS0xNzUuemVuby5mbSIsInRtIjpmYWxzZSwicnR0bCI6NSwianRpIjoiM3Rsa2c5eUVSRWk1eGRNUVJsYzBsdyIsImlhdCI6MTc2Mjk5OTA1NSwiZXhwIjoxNzYyOTk5MTE1fQ.",
                    "dmryXud1zSk8vL1J-5oEIHuSgb9NcwX0DEMmTwn5QdE"
                )
                .to_string(),
                "https://stream-175.zeno.fm/bbh6u7w8gwzuv".to_string(),
                "https://stream.zeno.fm/bbh6u7w8gwzuv".to_string(),
            ],
            autoplay: false,
            volume: DEFAULT_VOLUME,
            buffer_capacity: STREAM_BUFFER_CAPACITY,
        }
    }
}

/// Retry budget and backoff, durations in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_connection_attempts: u32,
    pub max_retries: u32,
    pub attempt_timeout_ms: u64,
    pub endpoint_backoff_ms: u64,
    pub retry_backoff_ms: u64,
    pub restart_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_connection_attempts: MAX_CONNECTION_ATTEMPTS,
            max_retries: MAX_RETRIES,
            attempt_timeout_ms: ATTEMPT_TIMEOUT.as_millis() as u64,
            endpoint_backoff_ms: ENDPOINT_BACKOFF.as_millis() as u64,
            retry_backoff_ms: RETRY_BACKOFF.as_millis() as u64,
            restart_delay_ms: RESTART_DELAY.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub name: String,
    pub album: String,
    pub artwork_url: String,
    pub artwork_type: String,
    pub artwork_sizes: Vec<String>,
    /// Rotated through while playing; the first entry is shown on launch
    pub playlist: Vec<NowPlaying>,
}

impl Default for StationConfig {
    fn default() -> Self {
        let track = |title: &str, artist: &str| NowPlaying {
            title: title.to_string(),
            artist: artist.to_string(),
        };

        Self {
            name: "Ras Reggae Radio".to_string(),
            album: "A Voz Autêntica do Reggae".to_string(),
            artwork_url:
                "https://static.readdy.ai/image/2050551fbb19c229cf27f3c804633125/5a78a9c734517770b4257916fc0f77a3.jpeg"
                    .to_string(),
            artwork_type: "image/jpeg".to_string(),
            artwork_sizes: ["96x96", "128x128", "192x192", "256x256", "384x384", "512x512"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            playlist: vec![
                track("Live Broadcast", "Ras Reggae Radio"),
                track("Roots Rock Reggae", "Bob Marley"),
                track("One Love", "Bob Marley"),
                track("No Woman No Cry", "Bob Marley"),
                track("Three Little Birds", "Bob Marley"),
                track("Buffalo Soldier", "Bob Marley"),
                track("Redemption Song", "Bob Marley"),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenersConfig {
    pub base: u32,
    pub floor: u32,
    pub jitter: u32,
    pub playing_bonus: u32,
}

impl Default for ListenersConfig {
    fn default() -> Self {
        Self {
            base: LISTENERS_BASE,
            floor: LISTENERS_FLOOR,
            jitter: LISTENERS_JITTER,
            playing_bonus: LISTENERS_PLAYING_BONUS,
        }
    }
}

/// Named capability preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlatformPreset {
    Desktop,
    Ios,
    Android,
    #[default]
    Headless,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub preset: PlatformPreset,
    /// Per-field overrides of the preset
    pub supports_wake_lock: Option<bool>,
    pub requires_gesture_before_autoplay: Option<bool>,
    pub endpoint_order: Option<EndpointOrder>,
    pub wake_lock_revoked_on_hide: Option<bool>,
    /// Polled with HEAD to derive connectivity; no probing when unset
    pub probe_url: Option<String>,
    pub probe_interval_secs: u64,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            preset: PlatformPreset::default(),
            supports_wake_lock: None,
            requires_gesture_before_autoplay: None,
            endpoint_order: None,
            wake_lock_revoked_on_hide: None,
            probe_url: None,
            probe_interval_secs: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub enabled: bool,
    pub bind_address: String,
    pub http_port: u16,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1".to_string(),
            http_port: DEFAULT_HTTP_PORT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareConfig {
    pub title: String,
    pub text: String,
    pub url: String,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            title: "Ras Reggae Radio - Live".to_string(),
            text: "Listening to the best online reggae radio!".to_string(),
            url: "https://rasreggaeradio.com".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, or from the platform config directory.
    ///
    /// An explicit path must exist; the default location falls back to
    /// built-in defaults when no file is there.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => {
                    tracing::debug!("No config file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        tracing::info!("Loaded config from {}", path.display());
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// `<config dir>/live-radio-player/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "live-radio-player")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn endpoints(&self) -> Result<StreamEndpoint, ConfigError> {
        StreamEndpoint::parse(&self.stream.endpoints)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let r = &self.retry;
        RetryPolicy {
            max_connection_attempts: r.max_connection_attempts,
            max_retries: r.max_retries,
            attempt_timeout: Duration::from_millis(r.attempt_timeout_ms),
            endpoint_backoff: Duration::from_millis(r.endpoint_backoff_ms),
            retry_backoff: Duration::from_millis(r.retry_backoff_ms),
            restart_delay: Duration::from_millis(r.restart_delay_ms),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        let p = &self.platform;
        let mut caps = match p.preset {
            PlatformPreset::Desktop => Capabilities::desktop(),
            PlatformPreset::Ios => Capabilities::ios(),
            PlatformPreset::Android => Capabilities::android(),
            PlatformPreset::Headless => Capabilities::headless(),
        };

        if let Some(v) = p.supports_wake_lock {
            caps.supports_wake_lock = v;
        }
        if let Some(v) = p.requires_gesture_before_autoplay {
            caps.requires_gesture_before_autoplay = v;
        }
        if let Some(v) = p.endpoint_order {
            caps.endpoint_order = v;
        }
        if let Some(v) = p.wake_lock_revoked_on_hide {
            caps.wake_lock_revoked_on_hide = v;
        }
        caps
    }

    pub fn probe_url(&self) -> Result<Option<Url>, ConfigError> {
        self.platform
            .probe_url
            .as_deref()
            .map(|raw| {
                Url::parse(raw).map_err(|e| ConfigError::InvalidEndpoint {
                    uri: raw.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }

    pub fn station(&self) -> StationMetadata {
        let s = &self.station;
        StationMetadata {
            name: s.name.clone(),
            album: s.album.clone(),
            artwork: s
                .artwork_sizes
                .iter()
                .map(|sizes| Artwork {
                    src: s.artwork_url.clone(),
                    sizes: sizes.clone(),
                    mime_type: s.artwork_type.clone(),
                })
                .collect(),
            playlist: s.playlist.clone(),
        }
    }

    pub fn listener_model(&self) -> ListenerModel {
        let l = &self.listeners;
        ListenerModel {
            base: l.base,
            floor: l.floor,
            jitter: l.jitter,
            playing_bonus: l.playing_bonus,
        }
    }

    pub fn share_payload(&self) -> SharePayload {
        SharePayload {
            title: self.share.title.clone(),
            text: self.share.text.clone(),
            url: self.share.url.clone(),
        }
    }
}

/// Connect-sequence budget and timings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_connection_attempts: u32,
    pub max_retries: u32,
    pub attempt_timeout: Duration,
    pub endpoint_backoff: Duration,
    pub retry_backoff: Duration,
    pub restart_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_connection_attempts: MAX_CONNECTION_ATTEMPTS,
            max_retries: MAX_RETRIES,
            attempt_timeout: ATTEMPT_TIMEOUT,
            endpoint_backoff: ENDPOINT_BACKOFF,
            retry_backoff: RETRY_BACKOFF,
            restart_delay: RESTART_DELAY,
        }
    }
}

/// Static station data published to the OS media session
#[derive(Debug, Clone, PartialEq)]
pub struct StationMetadata {
    pub name: String,
    pub album: String,
    pub artwork: Vec<Artwork>,
    pub playlist: Vec<NowPlaying>,
}

impl StationMetadata {
    /// What is shown before the first rotation
    pub fn initial_now_playing(&self) -> NowPlaying {
        self.playlist.first().cloned().unwrap_or_else(|| NowPlaying {
            title: self.name.clone(),
            artist: self.name.clone(),
        })
    }

    /// Random playlist entry, `None` when the playlist is empty
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<NowPlaying> {
        if self.playlist.is_empty() {
            return None;
        }
        Some(self.playlist[rng.gen_range(0..self.playlist.len())].clone())
    }

    pub fn track_metadata(&self, now_playing: &NowPlaying) -> TrackMetadata {
        TrackMetadata {
            title: now_playing.title.clone(),
            artist: now_playing.artist.clone(),
            album: self.album.clone(),
            artwork: self.artwork.clone(),
        }
    }
}

impl Default for StationMetadata {
    fn default() -> Self {
        AppConfig::default().station()
    }
}

/// Synthetic listener figure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerModel {
    pub base: u32,
    pub floor: u32,
    pub jitter: u32,
    pub playing_bonus: u32,
}

impl ListenerModel {
    /// `max(base + U(-jitter, jitter) + (playing ? U(0, bonus) : 0), floor)`
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, playing: bool) -> u32 {
        let jitter = self.jitter as i64;
        let variation = if jitter > 0 {
            rng.gen_range(-jitter..jitter)
        } else {
            0
        };
        let bonus = if playing && self.playing_bonus > 0 {
            rng.gen_range(0..self.playing_bonus) as i64
        } else {
            0
        };

        let figure = (self.base as i64 + variation + bonus).max(self.floor as i64);
        figure.clamp(0, u32::MAX as i64) as u32
    }
}

impl Default for ListenerModel {
    fn default() -> Self {
        Self {
            base: LISTENERS_BASE,
            floor: LISTENERS_FLOOR,
            jitter: LISTENERS_JITTER,
            playing_bonus: LISTENERS_PLAYING_BONUS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_empty_file_yields_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.endpoints().unwrap().len(), 3);
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.capabilities(), Capabilities::headless());
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_toml(
            r#"
            [stream]
            endpoints = ["https://a.example/live", "https://b.example/live"]

            [retry]
            max_retries = 1
            endpoint_backoff_ms = 250

            [platform]
            preset = "ios"
            supports_wake_lock = true

            [ui]
            http_port = 9000
            "#,
        )
        .unwrap();

        let policy = config.retry_policy();
        assert_eq!(policy.max_retries, 1);
        assert_eq!(policy.endpoint_backoff, Duration::from_millis(250));
        assert_eq!(policy.max_connection_attempts, MAX_CONNECTION_ATTEMPTS);

        let caps = config.capabilities();
        assert!(caps.supports_wake_lock);
        assert_eq!(caps.endpoint_order, EndpointOrder::MirrorsFirst);

        assert_eq!(config.ui.http_port, 9000);
        assert_eq!(config.ui.bind_address, "127.0.0.1");
        assert_eq!(
            config.endpoints().unwrap().get(1).map(|u| u.as_str()),
            Some("https://b.example/live")
        );
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let config = AppConfig::from_toml("[stream]\nendpoints = [\"not a url\"]").unwrap();
        assert!(matches!(
            config.endpoints(),
            Err(ConfigError::InvalidEndpoint { .. })
        ));

        let config = AppConfig::from_toml("[stream]\nendpoints = []").unwrap();
        assert!(matches!(config.endpoints(), Err(ConfigError::NoEndpoints)));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        assert!(matches!(
            AppConfig::from_toml("[retry\nmax_retries = "),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_explicit_path_is_read_error() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/radio/config.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_station_metadata() {
        let station = AppConfig::default().station();
        assert_eq!(station.artwork.len(), 6);
        assert_eq!(station.artwork[0].sizes, "96x96");
        assert_eq!(station.initial_now_playing().artist, "Ras Reggae Radio");

        let meta = station.track_metadata(&station.playlist[2]);
        assert_eq!(meta.title, "One Love");
        assert_eq!(meta.album, "A Voz Autêntica do Reggae");

        let empty = StationMetadata {
            playlist: Vec::new(),
            ..station
        };
        let mut rng = StdRng::seed_from_u64(7);
        assert!(empty.pick(&mut rng).is_none());
        assert_eq!(empty.initial_now_playing().title, "Ras Reggae Radio");
    }

    #[test]
    fn test_degenerate_listener_model() {
        let model = ListenerModel {
            base: 10,
            floor: 0,
            jitter: 0,
            playing_bonus: 0,
        };
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(model.sample(&mut rng, true), 10);
    }

    proptest! {
        #[test]
        fn prop_listener_figure_bounded(seed in any::<u64>(), playing in any::<bool>()) {
            let model = ListenerModel::default();
            let mut rng = StdRng::seed_from_u64(seed);
            let n = model.sample(&mut rng, playing);
            prop_assert!(n >= LISTENERS_FLOOR);
            prop_assert!(n >= LISTENERS_BASE - LISTENERS_JITTER);
            let ceiling = LISTENERS_BASE + LISTENERS_JITTER
                + if playing { LISTENERS_PLAYING_BONUS } else { 0 };
            prop_assert!(n < ceiling);
        }
    }
}
