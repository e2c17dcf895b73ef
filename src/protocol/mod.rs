//! Chat protocol payloads and topic layout
//!
//! This module implements the message structures exchanged with the broker
//! and the mapping between topics and session handlers.

pub mod messages;
pub mod topics;

pub use messages::*;
pub use topics::*;
