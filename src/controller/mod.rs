//! Stream playback controller
//!
//! `StreamPlaybackController` is a cheap cloneable handle. All clones drive
//! the same session: the control UI, OS media keys and any "play now"
//! button elsewhere in the host all hold a clone instead of reaching for a
//! global.
//!
//! ## Locking
//!
//! `session` and `output` are separate `parking_lot` mutexes. Neither is
//! ever held across an `.await`, and they are never held at the same time.

mod connect;
mod share;
mod tickers;

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::{AppConfig, ListenerModel, RetryPolicy, StationMetadata};
use crate::constants::DEFAULT_VOLUME;
use crate::error::{ConfigError, Result};
use crate::platform::{
    AudioOutput, Capabilities, Clipboard, MediaSession, Platform, ShareTarget, WakeLock,
};
use crate::protocol::{
    messages, ControlMessage, ControlReply, MediaAction, MediaPlaybackState, PlaybackStatus,
    PositionState, SharePayload, StatusSnapshot, ToggleOutcome,
};
use crate::stream::{PlaybackSession, StreamEndpoint};

use connect::{ConnectRequest, InitGuard, Refusal};

/// Everything the controller is configured with besides the host platform
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub endpoints: StreamEndpoint,
    pub retry: RetryPolicy,
    pub station: StationMetadata,
    pub listeners: ListenerModel,
    pub share: SharePayload,
    pub initial_volume: u8,
}

impl ControllerOptions {
    pub fn new(endpoints: StreamEndpoint) -> Self {
        let config = AppConfig::default();
        Self {
            endpoints,
            retry: RetryPolicy::default(),
            station: config.station(),
            listeners: ListenerModel::default(),
            share: config.share_payload(),
            initial_volume: DEFAULT_VOLUME,
        }
    }

    pub fn from_config(config: &AppConfig) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            endpoints: config.endpoints()?,
            retry: config.retry_policy(),
            station: config.station(),
            listeners: config.listener_model(),
            share: config.share_payload(),
            initial_volume: config.stream.volume,
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Background tasks owned by one controller
#[derive(Default)]
struct Tasks {
    connect: Option<JoinHandle<()>>,
    monitor: Option<JoinHandle<()>>,
    listening: Option<JoinHandle<()>>,
    now_playing: Option<JoinHandle<()>>,
    share_reset: Option<JoinHandle<()>>,
    listeners: Option<JoinHandle<()>>,
    connectivity: Option<JoinHandle<()>>,
}

impl Tasks {
    fn all(&mut self) -> impl Iterator<Item = JoinHandle<()>> {
        [
            self.connect.take(),
            self.monitor.take(),
            self.listening.take(),
            self.now_playing.take(),
            self.share_reset.take(),
            self.listeners.take(),
            self.connectivity.take(),
        ]
        .into_iter()
        .flatten()
    }
}

/// Store `task` in `slot`, aborting whatever was there
fn replace_task(slot: &mut Option<JoinHandle<()>>, task: JoinHandle<()>) {
    if let Some(old) = slot.replace(task) {
        old.abort();
    }
}

fn abort_task(slot: &mut Option<JoinHandle<()>>) {
    if let Some(task) = slot.take() {
        task.abort();
    }
}

pub(crate) struct Inner {
    endpoints: StreamEndpoint,
    policy: RetryPolicy,
    station: StationMetadata,
    listener_model: ListenerModel,
    share_payload: SharePayload,
    capabilities: Capabilities,

    session: Mutex<PlaybackSession>,
    output: Mutex<Box<dyn AudioOutput>>,
    wake_lock: Arc<dyn WakeLock>,
    media_session: Arc<dyn MediaSession>,
    share_target: Arc<dyn ShareTarget>,
    clipboard: Arc<dyn Clipboard>,

    /// A connect sequence (or restart delay) is in flight
    initializing: AtomicBool,
    /// Cleared by shutdown; checked after every await
    alive: AtomicBool,
    /// Bumped on every attach and detach; stale output events are ignored
    generation: AtomicU64,

    snapshot_tx: watch::Sender<StatusSnapshot>,
    tasks: Mutex<Tasks>,
    runtime: Handle,
}

/// Playback controller handle
#[derive(Clone)]
pub struct StreamPlaybackController {
    inner: Arc<Inner>,
}

impl StreamPlaybackController {
    /// Build a controller. Must be called from within a tokio runtime.
    pub fn new(options: ControllerOptions, platform: Platform) -> Result<Self> {
        let runtime = Handle::try_current()?;
        let Platform {
            output,
            wake_lock,
            media_session,
            share,
            clipboard,
            connectivity,
            capabilities,
        } = platform;

        let endpoints = options.endpoints.ordered(capabilities.endpoint_order);
        let mut session = PlaybackSession::new(options.station.initial_now_playing());
        session.set_volume(options.initial_volume as i32);
        session.online = *connectivity.borrow();

        let (snapshot_tx, _) = watch::channel(session.snapshot(false));

        tracing::info!(
            session = %session.id,
            endpoints = endpoints.len(),
            ?capabilities,
            "Playback controller created"
        );

        let inner = Arc::new(Inner {
            endpoints,
            policy: options.retry,
            station: options.station,
            listener_model: options.listeners,
            share_payload: options.share,
            capabilities,
            session: Mutex::new(session),
            output: Mutex::new(output),
            wake_lock,
            media_session,
            share_target: share,
            clipboard,
            initializing: AtomicBool::new(false),
            alive: AtomicBool::new(true),
            generation: AtomicU64::new(0),
            snapshot_tx,
            tasks: Mutex::new(Tasks::default()),
            runtime,
        });

        inner.register_media_actions();
        inner.set_media_state(MediaPlaybackState::None);
        inner.start_listeners_ticker();
        inner.start_connectivity_observer(connectivity);

        Ok(Self { inner })
    }

    /// Play when stopped, pause when playing.
    ///
    /// Pausing is synchronous. Input while a connect sequence is in flight is
    /// dropped, not queued.
    pub fn toggle_play(&self) -> ToggleOutcome {
        let inner = &self.inner;
        if !inner.is_alive() {
            return ToggleOutcome::ShutDown;
        }
        if inner.initializing.load(Ordering::SeqCst) {
            tracing::debug!("Toggle ignored, connect in flight");
            return ToggleOutcome::Busy;
        }

        enum Next {
            Pause,
            Offline,
            Connect { prefer_last: bool },
        }

        let next = {
            let mut session = inner.session.lock();
            session.has_user_interacted = true;
            if session.status.is_active() {
                Next::Pause
            } else if !session.online {
                session.message = messages::OFFLINE.to_string();
                Next::Offline
            } else {
                Next::Connect {
                    prefer_last: session.status == PlaybackStatus::Paused,
                }
            }
        };

        match next {
            Next::Pause => {
                inner.pause_playback(messages::PAUSED);
                ToggleOutcome::Paused
            }
            Next::Offline => {
                tracing::info!("Play requested while offline");
                inner.publish();
                ToggleOutcome::Offline
            }
            Next::Connect { prefer_last } => {
                let request = ConnectRequest {
                    prefer_last,
                    ..ConnectRequest::fresh()
                };
                match inner.begin_connect(request, PlaybackStatus::Connecting, messages::CONNECTING)
                {
                    Ok(()) => ToggleOutcome::Connecting,
                    Err(Refusal::Busy) => ToggleOutcome::Busy,
                    Err(_) => ToggleOutcome::Refused,
                }
            }
        }
    }

    /// Tear down and reconnect from the first endpoint.
    ///
    /// Returns false when a connect sequence is already in flight.
    pub fn restart(&self) -> bool {
        let inner = &self.inner;
        if !inner.is_alive() {
            return false;
        }
        let Some(guard) = InitGuard::claim(inner) else {
            tracing::debug!("Restart ignored, connect in flight");
            return false;
        };

        {
            let mut session = inner.session.lock();
            session.has_user_interacted = true;
            session.hard_reset();
        }
        tracing::info!("Restarting stream");
        inner.teardown_playback();

        let request = ConnectRequest {
            delay: inner.policy.restart_delay,
            ..ConnectRequest::fresh()
        };
        inner
            .start_connect(guard, request, PlaybackStatus::Connecting, messages::RESTARTING)
            .is_ok()
    }

    /// Start playing without a user gesture, if the platform allows it.
    ///
    /// Only starts from `Idle` or `Failed`; a session the user already
    /// drove is left alone.
    pub fn autoplay(&self) -> bool {
        let inner = &self.inner;
        if !inner.is_alive() {
            return false;
        }
        {
            let session = inner.session.lock();
            let startable = matches!(session.status, PlaybackStatus::Idle | PlaybackStatus::Failed);
            if !session.online || !startable {
                tracing::debug!(status = ?session.status, "Autoplay skipped");
                return false;
            }
        }
        match inner.begin_connect(
            ConnectRequest::fresh(),
            PlaybackStatus::Connecting,
            messages::CONNECTING,
        ) {
            Ok(()) => true,
            Err(refusal) => {
                tracing::debug!(?refusal, "Autoplay refused");
                false
            }
        }
    }

    /// Set volume 0-100; 0 mutes
    pub fn set_volume(&self, volume: i32) {
        self.inner.update_volume(|session| session.set_volume(volume));
    }

    pub fn mute(&self) {
        self.inner.update_volume(PlaybackSession::mute);
    }

    pub fn unmute(&self) {
        self.inner.update_volume(PlaybackSession::unmute);
    }

    pub fn toggle_mute(&self) {
        self.inner.update_volume(PlaybackSession::toggle_mute);
    }

    /// Page or window visibility changed
    pub fn set_visibility(&self, visible: bool) {
        let inner = &self.inner;
        if !inner.is_alive() {
            return;
        }

        if !visible {
            let revoked = inner.capabilities.wake_lock_revoked_on_hide && {
                let mut session = inner.session.lock();
                std::mem::replace(&mut session.wake_lock_held, false)
            };
            if revoked {
                tracing::debug!("Wake lock revoked by host on hide");
                inner.publish();
            }
            return;
        }

        if inner.session.lock().status.is_active() {
            inner.publish_media_session();
            inner.acquire_wake_lock();
            inner.publish();
        }
    }

    /// Route an OS media control
    pub fn handle_media_action(&self, action: MediaAction) {
        tracing::debug!(?action, "Media action");
        let active = self.inner.session.lock().status.is_active();
        match action {
            MediaAction::Play if !active => {
                self.toggle_play();
            }
            MediaAction::Pause | MediaAction::Stop if active => {
                self.toggle_play();
            }
            action if action.is_seek_like() => {
                self.restart();
            }
            _ => {}
        }
    }

    /// Apply a command from the presentation layer
    pub fn apply(&self, message: ControlMessage) -> ControlReply {
        match message {
            ControlMessage::TogglePlay => ControlReply::Toggled {
                outcome: self.toggle_play(),
            },
            ControlMessage::Restart => ControlReply::Restart {
                accepted: self.restart(),
            },
            ControlMessage::SetVolume { volume } => {
                self.set_volume(volume as i32);
                ControlReply::Applied
            }
            ControlMessage::SetMute { muted: true } => {
                self.mute();
                ControlReply::Applied
            }
            ControlMessage::SetMute { muted: false } => {
                self.unmute();
                ControlReply::Applied
            }
            ControlMessage::ToggleMute => {
                self.toggle_mute();
                ControlReply::Applied
            }
            ControlMessage::Share => ControlReply::Shared {
                outcome: self.share(),
            },
            ControlMessage::Visibility { visible } => {
                self.set_visibility(visible);
                ControlReply::Applied
            }
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner.snapshot_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    pub fn is_initializing(&self) -> bool {
        self.inner.initializing.load(Ordering::SeqCst)
    }

    pub fn endpoints(&self) -> &StreamEndpoint {
        &self.inner.endpoints
    }

    pub fn capabilities(&self) -> Capabilities {
        self.inner.capabilities
    }

    /// Stop everything. Later calls on any clone are no-ops.
    pub fn shutdown(&self) {
        let inner = &self.inner;
        if !inner.alive.swap(false, Ordering::SeqCst) {
            return;
        }

        let tasks: Vec<_> = inner.tasks.lock().all().collect();
        for task in tasks {
            task.abort();
        }

        inner.generation.fetch_add(1, Ordering::SeqCst);
        inner.output.lock().stop();
        inner.release_wake_lock();
        inner.set_media_state(MediaPlaybackState::None);
        inner.initializing.store(false, Ordering::SeqCst);
        {
            let mut session = inner.session.lock();
            session.transition(PlaybackStatus::Idle, messages::IDLE);
        }
        inner.publish();
        tracing::info!("Playback controller shut down");
    }
}

impl Inner {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// True while `generation` names the current attachment
    fn is_current(&self, generation: u64) -> bool {
        self.is_alive() && self.generation.load(Ordering::SeqCst) == generation
    }

    /// Push a fresh snapshot to every subscriber
    fn publish(&self) {
        let snapshot = self
            .session
            .lock()
            .snapshot(self.initializing.load(Ordering::SeqCst));
        self.snapshot_tx.send_replace(snapshot);
    }

    fn update_volume(&self, apply: impl FnOnce(&mut PlaybackSession)) {
        let gain = {
            let mut session = self.session.lock();
            apply(&mut session);
            session.effective_gain()
        };
        {
            let mut output = self.output.lock();
            if output.is_attached() {
                output.set_gain(gain);
            }
        }
        self.publish();
    }

    /// Synchronous pause, also used for the forced offline pause
    fn pause_playback(&self, message: &str) {
        {
            let mut session = self.session.lock();
            session.transition(PlaybackStatus::Paused, message);
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        {
            let mut tasks = self.tasks.lock();
            abort_task(&mut tasks.monitor);
        }
        self.output.lock().pause();
        self.stop_playing_tickers();
        self.release_wake_lock();
        self.set_media_state(MediaPlaybackState::Paused);
        self.refresh_listeners();
        tracing::info!("Playback paused");
        self.publish();
    }

    /// Detach the output and stop everything tied to audible playback
    fn teardown_playback(&self) {
        self.detach_output();
        {
            let mut tasks = self.tasks.lock();
            abort_task(&mut tasks.monitor);
        }
        self.stop_playing_tickers();
        self.release_wake_lock();
        self.set_media_state(MediaPlaybackState::Paused);
    }

    fn detach_output(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.output.lock().stop();
    }

    fn acquire_wake_lock(&self) {
        if !self.capabilities.supports_wake_lock || self.session.lock().wake_lock_held {
            return;
        }
        match self.wake_lock.acquire() {
            Ok(()) => {
                self.session.lock().wake_lock_held = true;
                tracing::debug!("Wake lock acquired");
            }
            Err(e) => tracing::debug!("Wake lock unavailable: {}", e),
        }
    }

    fn release_wake_lock(&self) {
        let held = std::mem::replace(&mut self.session.lock().wake_lock_held, false);
        if held {
            self.wake_lock.release();
            tracing::debug!("Wake lock released");
        }
    }

    fn set_media_state(&self, state: MediaPlaybackState) {
        if let Err(e) = self.media_session.set_playback_state(state) {
            tracing::debug!("Media session state not published: {}", e);
        }
    }

    /// Metadata, playback state, position and handlers for the OS
    fn publish_media_session(self: &Arc<Self>) {
        let (now_playing, status, position) = {
            let session = self.session.lock();
            (
                session.now_playing.clone(),
                session.status,
                session.listening_seconds,
            )
        };

        let metadata = self.station.track_metadata(&now_playing);
        if let Err(e) = self.media_session.set_metadata(&metadata) {
            tracing::debug!("Media session metadata not published: {}", e);
            return;
        }
        self.set_media_state(if status.is_active() {
            MediaPlaybackState::Playing
        } else {
            MediaPlaybackState::Paused
        });
        if let Err(e) = self
            .media_session
            .set_position_state(PositionState::live(position))
        {
            tracing::debug!("Media session position not published: {}", e);
        }
        self.register_media_actions();
    }

    /// The registry only ever sees a weak reference to the controller
    fn register_media_actions(self: &Arc<Self>) {
        for action in MediaAction::ALL {
            let weak: Weak<Inner> = Arc::downgrade(self);
            let handler = Arc::new(move |action: MediaAction| {
                if let Some(inner) = weak.upgrade() {
                    StreamPlaybackController { inner }.handle_media_action(action);
                }
            });
            if let Err(e) = self.media_session.set_action_handler(action, handler) {
                tracing::debug!(?action, "Media action handler not registered: {}", e);
            }
        }
    }

    fn start_connectivity_observer(self: &Arc<Self>, mut connectivity: watch::Receiver<bool>) {
        let weak = Arc::downgrade(self);
        let task = self.runtime.spawn(async move {
            while connectivity.changed().await.is_ok() {
                let online = *connectivity.borrow_and_update();
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if !inner.is_alive() {
                    return;
                }
                inner.on_connectivity(online);
            }
        });
        replace_task(&mut self.tasks.lock().connectivity, task);
    }

    fn on_connectivity(&self, online: bool) {
        let status = {
            let mut session = self.session.lock();
            session.online = online;
            session.status
        };

        if !online {
            tracing::warn!("{}", crate::error::PlaybackError::OfflineDetected);
            if status.is_active() {
                self.pause_playback(messages::OFFLINE);
                return;
            }
            if status == PlaybackStatus::Paused {
                self.session.lock().message = messages::OFFLINE.to_string();
            }
        } else {
            tracing::info!("Connection restored");
            let mut session = self.session.lock();
            if session.status == PlaybackStatus::Paused && session.message == messages::OFFLINE {
                session.message = messages::PAUSED.to_string();
            }
        }
        self.publish();
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().all() {
            task.abort();
        }
        self.output.get_mut().stop();
        if self.session.get_mut().wake_lock_held {
            self.wake_lock.release();
        }
    }
}
