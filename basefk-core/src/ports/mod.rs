//! Port definitions (hexagonal architecture)
//!
//! Services depend only on these traits, not on the MySQL adapter.

mod schema;

pub use schema::{in_transaction, NewBase, SchemaPort};
