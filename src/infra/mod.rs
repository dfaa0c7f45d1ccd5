//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod settings_store;
pub mod telemetry;
