//! HTTP(S) stream transport
//!
//! `HttpStreamOutput` opens a streaming GET against the attached endpoint
//! and feeds compressed chunks into a `StreamBuffer` for the host decoder.
//! Timing of the body drives the output events: the first chunk is
//! `Playing`, a short gap is `Waiting`, a long gap or end of body is a
//! stall.

use futures_util::StreamExt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

use crate::constants::{TRANSPORT_STALL_AFTER, TRANSPORT_WAITING_AFTER};
use crate::error::AudioError;
use crate::platform::{AudioOutput, OutputEvent, OutputEvents};
use crate::stream::{SharedStreamBuffer, StreamChunk};

const USER_AGENT: &str = concat!("live-radio-player/", env!("CARGO_PKG_VERSION"));

/// Transport counters for the current attachment
#[derive(Debug, Default)]
pub struct TransportStats {
    pub bytes_received: AtomicU64,
    pub chunks_received: AtomicU64,
}

struct Attachment {
    uri: Url,
    events: mpsc::UnboundedSender<OutputEvent>,
    task: Option<JoinHandle<()>>,
}

/// reqwest-backed audio output
pub struct HttpStreamOutput {
    client: reqwest::Client,
    buffer: SharedStreamBuffer,
    /// f32 bits
    gain: Arc<AtomicU32>,
    stats: Arc<TransportStats>,
    current: Option<Attachment>,
    waiting_after: Duration,
    stall_after: Duration,
}

impl HttpStreamOutput {
    pub fn new(buffer: SharedStreamBuffer) -> Result<Self, AudioError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AudioError::Transport(e.to_string()))?;

        Ok(Self::with_client(client, buffer))
    }

    pub fn with_client(client: reqwest::Client, buffer: SharedStreamBuffer) -> Self {
        Self {
            client,
            buffer,
            gain: Arc::new(AtomicU32::new(1.0f32.to_bits())),
            stats: Arc::new(TransportStats::default()),
            current: None,
            waiting_after: TRANSPORT_WAITING_AFTER,
            stall_after: TRANSPORT_STALL_AFTER,
        }
    }

    /// Override the body-gap thresholds
    pub fn with_timing(mut self, waiting_after: Duration, stall_after: Duration) -> Self {
        self.waiting_after = waiting_after;
        self.stall_after = stall_after.max(waiting_after);
        self
    }

    /// Gain the decoder should apply
    pub fn gain(&self) -> f32 {
        f32::from_bits(self.gain.load(Ordering::Relaxed))
    }

    pub fn buffer(&self) -> &SharedStreamBuffer {
        &self.buffer
    }

    pub fn stats(&self) -> &Arc<TransportStats> {
        &self.stats
    }
}

impl AudioOutput for HttpStreamOutput {
    fn attach(&mut self, uri: &Url) -> Result<OutputEvents, AudioError> {
        self.stop();

        let (tx, rx) = mpsc::unbounded_channel();
        self.current = Some(Attachment {
            uri: uri.clone(),
            events: tx,
            task: None,
        });
        tracing::debug!(uri = %uri, "Attached stream source");
        Ok(rx)
    }

    fn play(&mut self) -> Result<(), AudioError> {
        let attachment = self.current.as_mut().ok_or(AudioError::NotAttached)?;
        if attachment.task.as_ref().is_some_and(|t| !t.is_finished()) {
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| AudioError::PlayRejected(e.to_string()))?;

        let pump = BodyPump {
            client: self.client.clone(),
            uri: attachment.uri.clone(),
            events: attachment.events.clone(),
            buffer: self.buffer.clone(),
            stats: self.stats.clone(),
            waiting_after: self.waiting_after,
            stall_after: self.stall_after,
        };
        attachment.task = Some(runtime.spawn(pump.run()));
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(attachment) = self.current.as_mut() {
            // A live body cannot be paused; drop the connection instead
            if let Some(task) = attachment.task.take() {
                task.abort();
                let _ = attachment.events.send(OutputEvent::Paused);
            }
        }
        self.buffer.clear();
    }

    fn stop(&mut self) {
        if let Some(attachment) = self.current.take() {
            if let Some(task) = attachment.task {
                task.abort();
            }
            tracing::debug!(uri = %attachment.uri, "Detached stream source");
        }
        self.buffer.clear();
    }

    fn set_gain(&mut self, gain: f32) {
        self.gain
            .store(gain.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    fn is_attached(&self) -> bool {
        self.current.is_some()
    }
}

impl Drop for HttpStreamOutput {
    fn drop(&mut self) {
        self.stop();
    }
}

struct BodyPump {
    client: reqwest::Client,
    uri: Url,
    events: mpsc::UnboundedSender<OutputEvent>,
    buffer: SharedStreamBuffer,
    stats: Arc<TransportStats>,
    waiting_after: Duration,
    stall_after: Duration,
}

impl BodyPump {
    async fn run(self) {
        let response = match self.client.get(self.uri.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                let _ = self.events.send(OutputEvent::Error(e.to_string()));
                return;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let _ = self
                .events
                .send(OutputEvent::Error(AudioError::HttpStatus(status.as_u16()).to_string()));
            return;
        }

        let _ = self.events.send(OutputEvent::CanPlay);

        let mut body = response.bytes_stream();
        let started = Instant::now();
        let mut sequence: u32 = 0;
        let mut playing = false;
        let mut waiting = false;

        loop {
            let gap = match (playing, waiting) {
                (true, false) => self.waiting_after,
                (true, true) => self.stall_after.saturating_sub(self.waiting_after),
                (false, _) => self.stall_after,
            };

            match tokio::time::timeout(gap, body.next()).await {
                Ok(Some(Ok(chunk))) => {
                    if !playing || waiting {
                        playing = true;
                        waiting = false;
                        let _ = self.events.send(OutputEvent::Playing);
                    }
                    self.stats
                        .bytes_received
                        .fetch_add(chunk.len() as u64, Ordering::Relaxed);
                    self.stats.chunks_received.fetch_add(1, Ordering::Relaxed);

                    let timestamp = started.elapsed().as_micros() as u64;
                    if !self.buffer.push(StreamChunk::new(chunk, timestamp, sequence)) {
                        tracing::trace!(uri = %self.uri, "Stream buffer full, chunk dropped");
                    }
                    sequence = sequence.wrapping_add(1);
                }
                Ok(Some(Err(e))) => {
                    let _ = self.events.send(OutputEvent::Error(e.to_string()));
                    return;
                }
                Ok(None) => {
                    let _ = self.events.send(OutputEvent::Ended);
                    return;
                }
                Err(_) if playing && !waiting => {
                    waiting = true;
                    let _ = self.events.send(OutputEvent::Waiting);
                }
                Err(_) => {
                    let _ = self.events.send(OutputEvent::Stalled);
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::create_shared_buffer;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one HTTP response: status line, then `chunks` as chunked body,
    /// then hold the connection open
    async fn serve_once(status: &'static str, chunks: Vec<&'static str>) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;

            let head = format!(
                "HTTP/1.1 {}\r\nContent-Type: audio/aac\r\nTransfer-Encoding: chunked\r\n\r\n",
                status
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            for chunk in chunks {
                let framed = format!("{:x}\r\n{}\r\n", chunk.len(), chunk);
                socket.write_all(framed.as_bytes()).await.unwrap();
            }
            socket.flush().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        Url::parse(&format!("http://{}/live", addr)).unwrap()
    }

    async fn next_event(events: &mut OutputEvents) -> OutputEvent {
        tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("event in time")
            .expect("channel open")
    }

    #[tokio::test]
    async fn test_first_chunk_reports_playing_then_gap_reports_waiting_and_stall() {
        let uri = serve_once("200 OK", vec!["aacframe"]).await;
        let buffer = create_shared_buffer(16);
        let mut output = HttpStreamOutput::new(buffer.clone())
            .unwrap()
            .with_timing(Duration::from_millis(200), Duration::from_millis(400));

        let mut events = output.attach(&uri).unwrap();
        output.play().unwrap();

        assert_eq!(next_event(&mut events).await, OutputEvent::CanPlay);
        assert_eq!(next_event(&mut events).await, OutputEvent::Playing);
        assert_eq!(next_event(&mut events).await, OutputEvent::Waiting);
        assert_eq!(next_event(&mut events).await, OutputEvent::Stalled);

        assert_eq!(output.stats().chunks_received.load(Ordering::Relaxed), 1);
        assert_eq!(buffer.stats().bytes_in, 8);
    }

    #[tokio::test]
    async fn test_http_error_status_reports_error() {
        let uri = serve_once("404 Not Found", vec![]).await;
        let mut output = HttpStreamOutput::new(create_shared_buffer(4)).unwrap();

        let mut events = output.attach(&uri).unwrap();
        output.play().unwrap();

        match next_event(&mut events).await {
            OutputEvent::Error(reason) => assert!(reason.contains("404")),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stop_detaches_and_closes_events() {
        let uri = serve_once("200 OK", vec!["aacframe"]).await;
        let mut output = HttpStreamOutput::new(create_shared_buffer(4)).unwrap();

        let mut events = output.attach(&uri).unwrap();
        assert!(output.is_attached());
        output.set_gain(0.25);
        assert_eq!(output.gain(), 0.25);

        output.stop();
        output.stop();
        output.pause();
        assert!(!output.is_attached());
        assert!(output.play().is_err());
        assert!(events.recv().await.is_none());
    }
}
