//! Lock-free chunk buffer between the HTTP transport and the decoder
//!
//! Single-producer single-consumer: the transport task pushes compressed
//! audio chunks as they arrive, the host decoder pops them.

use bytes::Bytes;
use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// One chunk of compressed stream bytes
#[derive(Clone, Debug)]
pub struct StreamChunk {
    pub data: Bytes,
    /// Microseconds since the attachment started
    pub timestamp: u64,
    /// Chunk sequence number within the attachment
    pub sequence: u32,
}

impl StreamChunk {
    pub fn new(data: Bytes, timestamp: u64, sequence: u32) -> Self {
        Self {
            data,
            timestamp,
            sequence,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Bounded chunk buffer
pub struct StreamBuffer {
    queue: ArrayQueue<StreamChunk>,
    overflow_count: AtomicUsize,
    underrun_count: AtomicUsize,
    bytes_in: AtomicU64,
}

impl StreamBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity),
            overflow_count: AtomicUsize::new(0),
            underrun_count: AtomicUsize::new(0),
            bytes_in: AtomicU64::new(0),
        }
    }

    /// Push a chunk. Returns false and drops it if the buffer is full.
    pub fn push(&self, chunk: StreamChunk) -> bool {
        let len = chunk.len() as u64;
        match self.queue.push(chunk) {
            Ok(()) => {
                self.bytes_in.fetch_add(len, Ordering::Relaxed);
                true
            }
            Err(_) => {
                self.overflow_count.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Pop a chunk, counting an underrun when empty
    pub fn pop(&self) -> Option<StreamChunk> {
        match self.queue.pop() {
            Some(chunk) => Some(chunk),
            None => {
                self.underrun_count.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Pop without counting an underrun
    pub fn try_pop(&self) -> Option<StreamChunk> {
        self.queue.pop()
    }

    /// Drop everything buffered; used when the source is detached
    pub fn clear(&self) {
        while self.queue.pop().is_some() {}
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub fn fill_level(&self) -> f32 {
        self.len() as f32 / self.capacity() as f32
    }

    pub fn stats(&self) -> StreamBufferStats {
        StreamBufferStats {
            level: self.len(),
            capacity: self.capacity(),
            overflows: self.overflow_count.load(Ordering::Relaxed),
            underruns: self.underrun_count.load(Ordering::Relaxed),
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
        }
    }
}

/// Buffer statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamBufferStats {
    pub level: usize,
    pub capacity: usize,
    pub overflows: usize,
    pub underruns: usize,
    pub bytes_in: u64,
}

/// Thread-safe handle to a stream buffer
pub type SharedStreamBuffer = Arc<StreamBuffer>;

pub fn create_shared_buffer(capacity: usize) -> SharedStreamBuffer {
    Arc::new(StreamBuffer::new(capacity))
}
