//! Observability for the chat client
//!
//! Structured logging through `tracing`, configured from the environment.

pub mod logging;

// Re-export for convenience
pub use logging::{init_default_logging, init_logging, LogFormat};

// Span macros for structured logging
pub use logging::{session_span, transport_span};
