//! Infrastructure adapters and runtime bootstrap.

pub mod backend;
pub mod error;
pub mod http;
pub mod snapshot;
pub mod telemetry;
