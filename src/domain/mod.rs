//! Domain layer types and invariants.

pub mod content;
pub mod entities;
pub mod error;
pub mod slug;
pub mod types;
