//! Local control UI
//!
//! HTTP endpoints for the player controls plus a WebSocket that pushes every
//! status snapshot and accepts control messages.

pub mod handlers;
pub mod server;
pub mod websocket;

pub use server::{AppState, WebServer};
