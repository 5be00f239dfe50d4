//! Ripple: realtime chat connection manager for the Ripple social network.
//!
//! Keeps one WebSocket connection to the chat server alive, dispatches
//! inbound frames into conversation state, and exposes non-blocking send
//! operations plus an event stream for a UI layer.

pub mod api;
pub mod chat;
pub mod client;
pub mod config;
pub mod console;
pub mod transport;
