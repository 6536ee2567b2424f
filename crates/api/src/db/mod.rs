//! Shared database schema, migrations, and query builders.
//!
//! Every builder returns a [`Built`] pair of SQL text and bound values; the
//! server binds the values to its SQLite connection. Column order of each
//! SELECT is documented on the builder because row mappers read by index.

pub mod invites;
pub mod lists;
pub mod members;
pub mod migrations;
pub mod presence;
pub mod push;
pub mod tables;
pub mod todos;
pub mod users;

// Re-export tables for convenience
pub use tables::*;

/// A built statement: SQL text plus its bound values.
pub type Built = (String, sea_query::Values);
