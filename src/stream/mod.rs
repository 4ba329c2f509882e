//! Stream sources and session state

pub mod buffer;
pub mod endpoint;
pub mod session;

pub use buffer::{create_shared_buffer, SharedStreamBuffer, StreamBuffer, StreamChunk};
pub use endpoint::StreamEndpoint;
pub use session::{format_listening_time, PlaybackSession};
