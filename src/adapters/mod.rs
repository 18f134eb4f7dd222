//! Infrastructure adapters for external systems.

pub mod session;
pub mod sqlite;
