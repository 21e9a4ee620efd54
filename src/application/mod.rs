//! Application services: source resolution, cached reads and coordinated
//! writes.

pub mod availability;
pub mod commands;
pub mod comments;
pub mod content;
pub mod error;
pub mod mutations;
pub mod reader;
pub mod repos;
pub mod resolver;
pub mod services;
