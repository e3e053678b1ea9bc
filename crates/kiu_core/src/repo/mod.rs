//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts (`CategoryTree`,
//!   `AccessStore`, ...).
//! - Isolate SQLite query details from access resolution and services.
//!
//! # Invariants
//! - Repository constructors verify schema version and required tables.
//! - Repository APIs return semantic errors (`NotFound`, `HasChildren`, ...)
//!   in addition to DB transport errors.
//! - Multi-row writes take an explicit `UnitOfWork`.

pub mod access_repo;
pub mod category_repo;
pub mod content_repo;
mod error;
pub mod notification_repo;
mod schema;
pub mod user_repo;

pub use error::{RepoError, RepoResult};

/// Case-insensitive substring match with full Unicode case folding.
///
/// SQLite's built-in `lower()` only folds ASCII, so text search filters run
/// here after the query instead of in SQL.
pub(crate) fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
