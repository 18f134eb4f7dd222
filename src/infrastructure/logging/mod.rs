//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - JSON or pretty formatting per configuration
//! - Environment filter overrides via RUST_LOG

pub mod logger;

pub use logger::init_logging;
