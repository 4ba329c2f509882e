//! Connect sequence and stream monitor
//!
//! A connect sequence walks the endpoint list, backing off between
//! endpoints and between full passes, until one endpoint produces audio or
//! the retry budget runs out. Exactly one sequence runs at a time; the
//! `InitGuard` it owns is what `toggle_play` and `restart` see as
//! "initializing".

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use super::{replace_task, Inner};
use crate::error::PlaybackError;
use crate::platform::{OutputEvent, OutputEvents};
use crate::protocol::{messages, MediaPlaybackState, PlaybackStatus};

/// Holds the initializing flag; clears it exactly once on drop
pub(super) struct InitGuard {
    inner: Arc<Inner>,
}

impl InitGuard {
    pub(super) fn claim(inner: &Arc<Inner>) -> Option<Self> {
        inner
            .initializing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;
        Some(Self {
            inner: inner.clone(),
        })
    }
}

impl Drop for InitGuard {
    fn drop(&mut self) {
        self.inner.initializing.store(false, Ordering::SeqCst);
        self.inner.publish();
    }
}

#[derive(Debug, Clone, Copy)]
pub(super) struct ConnectRequest {
    /// Start from the endpoint that last reached `Playing`
    pub prefer_last: bool,
    /// Wait before the first attempt
    pub delay: Duration,
}

impl ConnectRequest {
    pub(super) fn fresh() -> Self {
        Self {
            prefer_last: false,
            delay: Duration::ZERO,
        }
    }
}

/// Why a connect sequence was not started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Refusal {
    Busy,
    GestureRequired,
    AttemptsExhausted,
}

impl Inner {
    pub(super) fn begin_connect(
        self: &Arc<Self>,
        request: ConnectRequest,
        status: PlaybackStatus,
        message: &str,
    ) -> Result<(), Refusal> {
        let guard = InitGuard::claim(self).ok_or(Refusal::Busy)?;
        self.start_connect(guard, request, status, message)
    }

    /// Run the entry checks under an already claimed guard and spawn the
    /// sequence
    pub(super) fn start_connect(
        self: &Arc<Self>,
        guard: InitGuard,
        request: ConnectRequest,
        status: PlaybackStatus,
        message: &str,
    ) -> Result<(), Refusal> {
        let checked = {
            let mut session = self.session.lock();
            if self.capabilities.requires_gesture_before_autoplay && !session.has_user_interacted
            {
                Err(Refusal::GestureRequired)
            } else if session.connection_attempts >= self.policy.max_connection_attempts {
                session.transition(PlaybackStatus::Failed, messages::FAILED);
                session.reset_counters();
                Err(Refusal::AttemptsExhausted)
            } else {
                session.connection_attempts += 1;
                session.transition(status, message);
                Ok(session.connection_attempts)
            }
        };

        let attempt = match checked {
            Ok(attempt) => attempt,
            Err(refusal) => {
                if refusal == Refusal::AttemptsExhausted {
                    tracing::warn!(
                        max = self.policy.max_connection_attempts,
                        "Connection attempts exhausted"
                    );
                    self.release_wake_lock();
                    self.set_media_state(MediaPlaybackState::Paused);
                }
                drop(guard);
                return Err(refusal);
            }
        };

        tracing::info!(
            attempt,
            max = self.policy.max_connection_attempts,
            "Starting connect sequence"
        );
        self.publish();

        let inner = self.clone();
        let task = self.runtime.spawn(async move {
            if !request.delay.is_zero() {
                tokio::time::sleep(request.delay).await;
            }
            if inner.is_alive() {
                if let Some((events, generation)) = inner.run_connect(request.prefer_last).await {
                    inner.spawn_monitor(events, generation);
                }
            }
            drop(guard);
        });
        replace_task(&mut self.tasks.lock().connect, task);
        Ok(())
    }

    /// Walk the endpoint list until one plays or the retry budget is spent
    async fn run_connect(self: &Arc<Self>, prefer_last: bool) -> Option<(OutputEvents, u64)> {
        let count = self.endpoints.len();
        let mut start = if prefer_last {
            self.session.lock().last_successful_endpoint.unwrap_or(0)
        } else {
            0
        };

        loop {
            for index in start..count {
                match self.attempt(index).await {
                    Ok(attached) => {
                        if !self.is_alive() {
                            return None;
                        }
                        self.on_connected(index);
                        return Some(attached);
                    }
                    Err(e) => {
                        tracing::warn!(endpoint = index, "{}", e);
                        if !self.is_alive() {
                            return None;
                        }
                        if !self.endpoints.is_last(index) {
                            tokio::time::sleep(self.policy.endpoint_backoff).await;
                            if !self.is_alive() {
                                return None;
                            }
                        }
                    }
                }
            }

            tracing::warn!("{}", PlaybackError::AllEndpointsExhausted { count });
            let retry = {
                let mut session = self.session.lock();
                if session.retry_count < self.policy.max_retries {
                    session.retry_count += 1;
                    let message = messages::reconnecting(session.retry_count, self.policy.max_retries);
                    session.transition(PlaybackStatus::Reconnecting, message);
                    Some(session.retry_count)
                } else {
                    None
                }
            };

            let Some(retry) = retry else {
                self.on_exhausted();
                return None;
            };

            tracing::info!(retry, max = self.policy.max_retries, "Retrying endpoint list");
            self.publish();
            tokio::time::sleep(self.policy.retry_backoff).await;
            if !self.is_alive() {
                return None;
            }
            start = 0;
        }
    }

    /// One endpoint: attach, play and wait for audio
    async fn attempt(self: &Arc<Self>, index: usize) -> Result<(OutputEvents, u64), PlaybackError> {
        let unavailable = |reason: String| PlaybackError::EndpointUnavailable { index, reason };

        let uri = self
            .endpoints
            .get(index)
            .cloned()
            .ok_or_else(|| unavailable("no such endpoint".to_string()))?;
        let gain = {
            let mut session = self.session.lock();
            session.active_endpoint_index = index;
            session.effective_gain()
        };
        self.publish();

        // Bump before detaching so the old monitor sees itself as stale
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut events = {
            let mut output = self.output.lock();
            output.stop();
            let events = output.attach(&uri).map_err(|e| unavailable(e.to_string()))?;
            output.set_gain(gain);
            if let Err(e) = output.play() {
                output.stop();
                return Err(unavailable(e.to_string()));
            }
            events
        };
        tracing::debug!(endpoint = index, uri = %uri, "Trying endpoint");

        let reason =
            match tokio::time::timeout(self.policy.attempt_timeout, wait_for_playing(&mut events))
                .await
            {
                Ok(Ok(())) => return Ok((events, generation)),
                Ok(Err(reason)) => reason,
                Err(_) => format!("no audio within {:?}", self.policy.attempt_timeout),
            };

        if self.is_current(generation) {
            self.detach_output();
        }
        Err(unavailable(reason))
    }

    fn on_connected(self: &Arc<Self>, index: usize) {
        let session_id = {
            let mut session = self.session.lock();
            session.reset_counters();
            session.active_endpoint_index = index;
            session.last_successful_endpoint = Some(index);
            session.transition(PlaybackStatus::Playing, messages::LIVE);
            session.id
        };
        tracing::info!(session = %session_id, endpoint = index, "Stream playing");

        self.start_listening_ticker();
        self.start_now_playing_rotation();
        self.acquire_wake_lock();
        self.publish_media_session();
        self.refresh_listeners();
        self.publish();
    }

    fn on_exhausted(&self) {
        {
            let mut session = self.session.lock();
            session.transition(PlaybackStatus::Failed, messages::FAILED);
            session.reset_counters();
        }
        tracing::error!("{}", PlaybackError::RetryBudgetExhausted);
        self.detach_output();
        self.release_wake_lock();
        self.set_media_state(MediaPlaybackState::Paused);
        self.publish();
    }

    /// Follow the output after a successful connect
    fn spawn_monitor(self: &Arc<Self>, mut events: OutputEvents, generation: u64) {
        if !self.is_current(generation) {
            return;
        }

        let weak = Arc::downgrade(self);
        let task = self.runtime.spawn(async move {
            let reason = loop {
                let event = events.recv().await;
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if !inner.is_current(generation) {
                    return;
                }
                match event {
                    Some(OutputEvent::Waiting) => inner.on_buffering(true),
                    Some(OutputEvent::Playing) => inner.on_buffering(false),
                    Some(OutputEvent::CanPlay) => {}
                    Some(OutputEvent::Paused) => inner.on_host_paused(),
                    Some(OutputEvent::Stalled) => break "stalled".to_string(),
                    Some(OutputEvent::Ended) => break "stream ended".to_string(),
                    Some(OutputEvent::Error(reason)) => break reason,
                    None => break "output detached".to_string(),
                }
            };

            if let Some(inner) = weak.upgrade() {
                if inner.is_current(generation) {
                    inner.on_stream_lost(&reason);
                }
            }
        });
        replace_task(&mut self.tasks.lock().monitor, task);
    }

    fn on_buffering(&self, buffering: bool) {
        let changed = {
            let mut session = self.session.lock();
            match (session.status, buffering) {
                (PlaybackStatus::Playing, true) => {
                    session.transition(PlaybackStatus::Buffering, messages::BUFFERING);
                    true
                }
                (PlaybackStatus::Buffering, false) => {
                    session.transition(PlaybackStatus::Playing, messages::LIVE);
                    true
                }
                _ => false,
            }
        };
        if changed {
            tracing::debug!(buffering, "Buffering state changed");
            if !buffering {
                // The lock may have been revoked while buffering
                self.acquire_wake_lock();
                self.set_media_state(MediaPlaybackState::Playing);
            }
            self.publish();
        }
    }

    /// The host paused the output on its own
    fn on_host_paused(&self) {
        if self.session.lock().status.is_active() {
            self.pause_playback(messages::PAUSED);
        }
    }

    /// Audio stopped while active: reconnect, preferring the same endpoint
    fn on_stream_lost(self: &Arc<Self>, reason: &str) {
        if !self.session.lock().status.is_active() {
            return;
        }
        tracing::warn!(reason, "Stream lost, reconnecting");

        self.detach_output();
        // Called from the monitor itself; let it finish instead of aborting
        self.tasks.lock().monitor.take();
        self.stop_playing_tickers();
        self.release_wake_lock();
        self.set_media_state(MediaPlaybackState::Paused);

        let request = ConnectRequest {
            prefer_last: true,
            delay: Duration::ZERO,
        };
        if let Err(refusal) =
            self.begin_connect(request, PlaybackStatus::Reconnecting, messages::RECONNECTING)
        {
            tracing::debug!(?refusal, "Reconnect not started");
            self.publish();
        }
    }
}

async fn wait_for_playing(events: &mut OutputEvents) -> Result<(), String> {
    while let Some(event) = events.recv().await {
        match event {
            OutputEvent::Playing => return Ok(()),
            OutputEvent::CanPlay | OutputEvent::Waiting | OutputEvent::Paused => {}
            OutputEvent::Stalled => return Err("stalled before playing".to_string()),
            OutputEvent::Ended => return Err("ended before playing".to_string()),
            OutputEvent::Error(reason) => return Err(reason),
        }
    }
    Err("output detached".to_string())
}
