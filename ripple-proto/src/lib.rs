//! Shared protocol definitions for the Ripple realtime wire format.

pub mod codec;
pub mod message;
pub mod presence;
pub mod record;
pub mod typing;
