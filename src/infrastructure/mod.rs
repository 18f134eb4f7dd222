//! Infrastructure layer module
//!
//! Cross-cutting concerns that sit outside the domain:
//! - Configuration management (figment with YAML and env overrides)
//! - Logging setup (tracing subscriber wiring)
//!
//! Persistence adapters live under `adapters` and satisfy the port traits
//! defined in the domain layer.

pub mod config;
pub mod logging;
