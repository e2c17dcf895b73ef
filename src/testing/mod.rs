//! Testing utilities and mock implementations
//!
//! This module provides mock implementations for exercising chat sessions
//! without an MQTT broker.

pub mod mocks;

pub use mocks::*;
