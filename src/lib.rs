//! Folio: content for a portfolio and blog, read from a live backend when it
//! is reachable and from a bundled snapshot when it is not, behind a query
//! cache that mutations keep coherent.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
