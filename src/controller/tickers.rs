//! Periodic session updates: listening time, listener figure and the
//! now-playing rotation

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};

use super::{abort_task, replace_task, Inner};
use crate::constants::{
    LISTENERS_TICK, LISTENING_TICK, NOW_PLAYING_MAX_INTERVAL, NOW_PLAYING_MIN_INTERVAL,
};
use crate::protocol::{PlaybackStatus, PositionState};

impl Inner {
    /// One second per tick, counted only while `Playing`
    pub(super) fn start_listening_ticker(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let task = self.runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + LISTENING_TICK, LISTENING_TICK);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if !inner.is_alive() {
                    return;
                }

                let position = {
                    let mut session = inner.session.lock();
                    if session.status != PlaybackStatus::Playing {
                        continue;
                    }
                    session.listening_seconds += 1;
                    session.listening_seconds
                };

                if let Err(e) = inner
                    .media_session
                    .set_position_state(PositionState::live(position))
                {
                    tracing::trace!("Media session position not published: {}", e);
                }
                inner.publish();
            }
        });
        replace_task(&mut self.tasks.lock().listening, task);
    }

    /// Swap the displayed track every 3 to 5 minutes while playing
    pub(super) fn start_now_playing_rotation(self: &Arc<Self>) {
        if self.station.playlist.is_empty() {
            return;
        }

        let weak = Arc::downgrade(self);
        let task = self.runtime.spawn(async move {
            loop {
                let wait = {
                    let min = NOW_PLAYING_MIN_INTERVAL.as_millis() as u64;
                    let max = NOW_PLAYING_MAX_INTERVAL.as_millis() as u64;
                    Duration::from_millis(rand::thread_rng().gen_range(min..=max))
                };
                tokio::time::sleep(wait).await;

                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if !inner.is_alive() {
                    return;
                }
                if inner.session.lock().status != PlaybackStatus::Playing {
                    continue;
                }

                let Some(track) = inner.station.pick(&mut rand::thread_rng()) else {
                    return;
                };
                tracing::debug!(title = %track.title, artist = %track.artist, "Now playing");
                inner.session.lock().now_playing = track;
                inner.publish_media_session();
                inner.publish();
            }
        });
        replace_task(&mut self.tasks.lock().now_playing, task);
    }

    pub(super) fn stop_playing_tickers(&self) {
        let mut tasks = self.tasks.lock();
        abort_task(&mut tasks.listening);
        abort_task(&mut tasks.now_playing);
    }

    /// Runs for the controller's whole life, first refresh immediately
    pub(super) fn start_listeners_ticker(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let task = self.runtime.spawn(async move {
            let mut ticker = interval(LISTENERS_TICK);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if !inner.is_alive() {
                    return;
                }
                inner.refresh_listeners();
            }
        });
        replace_task(&mut self.tasks.lock().listeners, task);
    }

    /// Recompute the synthetic listener figure
    pub(super) fn refresh_listeners(&self) {
        {
            let mut session = self.session.lock();
            let playing = session.status == PlaybackStatus::Playing;
            session.listeners = self.listener_model.sample(&mut rand::thread_rng(), playing);
        }
        self.publish();
    }
}
