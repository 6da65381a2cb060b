//! Relational store for the claim chain index
//!
//! One store per table, each offering idempotent puts keyed by the table's
//! natural key, partial column updates and the aggregate helpers the
//! reconciliation jobs need.

pub mod cache;
pub mod db;
pub mod errors;
pub mod models;
pub mod stores;

pub use db::Database;
pub use errors::{DbError, DbResult};
pub use models::*;
