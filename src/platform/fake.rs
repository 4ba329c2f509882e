//! Scripted host doubles for controller tests

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

use crate::error::{AudioError, PlatformError};
use crate::platform::{AudioOutput, OutputEvent, OutputEvents, ShareTarget, WakeLock};
use crate::protocol::SharePayload;

/// How an endpoint answers `play()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// CanPlay then Playing after the answer delay
    Succeed,
    /// Error after the answer delay
    Fail,
    /// Never answers; only the attempt timeout ends it
    Hang,
}

#[derive(Default)]
struct FakeState {
    behaviors: HashMap<String, Behavior>,
    attaches: Vec<Url>,
    current: Option<(Url, mpsc::UnboundedSender<OutputEvent>)>,
    attached_now: usize,
    max_attached: usize,
    pauses: usize,
    gain: f32,
}

/// Test side of a `ScriptedOutput`
#[derive(Clone)]
pub struct OutputHandle {
    state: Arc<Mutex<FakeState>>,
}

impl OutputHandle {
    pub fn set_behavior(&self, uri: &str, behavior: Behavior) {
        self.state.lock().behaviors.insert(uri.to_string(), behavior);
    }

    pub fn attached_uris(&self) -> Vec<String> {
        self.state
            .lock()
            .attaches
            .iter()
            .map(|u| u.to_string())
            .collect()
    }

    pub fn attach_count(&self) -> usize {
        self.state.lock().attaches.len()
    }

    pub fn max_simultaneous(&self) -> usize {
        self.state.lock().max_attached
    }

    pub fn is_attached(&self) -> bool {
        self.state.lock().current.is_some()
    }

    pub fn gain(&self) -> f32 {
        self.state.lock().gain
    }

    pub fn pauses(&self) -> usize {
        self.state.lock().pauses
    }

    /// Inject an event into the current attachment
    pub fn emit(&self, event: OutputEvent) -> bool {
        match self.state.lock().current.as_ref() {
            Some((_, tx)) => tx.send(event).is_ok(),
            None => false,
        }
    }
}

/// Audio output whose endpoints answer according to a script
pub struct ScriptedOutput {
    state: Arc<Mutex<FakeState>>,
    answer_delay: Duration,
}

impl ScriptedOutput {
    /// Unscripted endpoints fail
    pub fn new() -> (Self, OutputHandle) {
        let state = Arc::new(Mutex::new(FakeState {
            gain: 1.0,
            ..Default::default()
        }));
        (
            Self {
                state: state.clone(),
                answer_delay: Duration::from_millis(100),
            },
            OutputHandle { state },
        )
    }
}

impl AudioOutput for ScriptedOutput {
    fn attach(&mut self, uri: &Url) -> Result<OutputEvents, AudioError> {
        let mut state = self.state.lock();
        // Replacing without a stop counts as a second live attachment
        let (tx, rx) = mpsc::unbounded_channel();
        state.current = Some((uri.clone(), tx));
        state.attaches.push(uri.clone());
        state.attached_now += 1;
        state.max_attached = state.max_attached.max(state.attached_now);
        Ok(rx)
    }

    fn play(&mut self) -> Result<(), AudioError> {
        let state = self.state.lock();
        let (uri, tx) = state.current.clone().ok_or(AudioError::NotAttached)?;
        let behavior = state
            .behaviors
            .get(uri.as_str())
            .copied()
            .unwrap_or(Behavior::Fail);
        let delay = self.answer_delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match behavior {
                Behavior::Succeed => {
                    let _ = tx.send(OutputEvent::CanPlay);
                    let _ = tx.send(OutputEvent::Playing);
                }
                Behavior::Fail => {
                    let _ = tx.send(OutputEvent::Error("scripted failure".into()));
                }
                Behavior::Hang => {
                    // Keep the sender alive so the channel does not close
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    drop(tx);
                }
            }
        });
        Ok(())
    }

    fn pause(&mut self) {
        self.state.lock().pauses += 1;
    }

    fn stop(&mut self) {
        let mut state = self.state.lock();
        state.current = None;
        state.attached_now = 0;
    }

    fn set_gain(&mut self, gain: f32) {
        self.state.lock().gain = gain;
    }

    fn is_attached(&self) -> bool {
        self.state.lock().current.is_some()
    }
}

/// Wake lock that counts calls
pub struct FakeWakeLock {
    supported: bool,
    held: AtomicBool,
    acquires: AtomicUsize,
}

impl FakeWakeLock {
    pub fn new(supported: bool) -> Self {
        Self {
            supported,
            held: AtomicBool::new(false),
            acquires: AtomicUsize::new(0),
        }
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }

    pub fn acquires(&self) -> usize {
        self.acquires.load(Ordering::SeqCst)
    }
}

impl WakeLock for FakeWakeLock {
    fn acquire(&self) -> Result<(), PlatformError> {
        if !self.supported {
            return Err(PlatformError::Unsupported("wake lock"));
        }
        self.acquires.fetch_add(1, Ordering::SeqCst);
        self.held.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn release(&self) {
        self.held.store(false, Ordering::SeqCst);
    }
}

/// Share target that records payloads
pub struct FakeShare {
    supported: bool,
    shared: Mutex<Vec<SharePayload>>,
}

impl FakeShare {
    pub fn new(supported: bool) -> Self {
        Self {
            supported,
            shared: Mutex::new(Vec::new()),
        }
    }

    pub fn shared(&self) -> Vec<SharePayload> {
        self.shared.lock().clone()
    }
}

impl ShareTarget for FakeShare {
    fn share(&self, payload: &SharePayload) -> Result<(), PlatformError> {
        if !self.supported {
            return Err(PlatformError::Unsupported("share"));
        }
        self.shared.lock().push(payload.clone());
        Ok(())
    }
}
