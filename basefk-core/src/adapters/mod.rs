//! Adapter implementations
//!
//! - MySQL for the SchemaPort
//! - In-memory fake for service unit tests

pub mod mysql;

#[cfg(test)]
pub mod fake;
