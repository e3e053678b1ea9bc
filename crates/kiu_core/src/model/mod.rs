//! Domain model for the student-materials catalog.
//!
//! # Responsibility
//! - Define the records shared by repositories, access resolution and services.
//! - Keep pure, storage-independent rules (level arithmetic, notification
//!   validity windows) next to the data they govern.
//!
//! # Invariants
//! - Every record is identified by a SQLite integer id.
//! - Timestamps are Unix epoch milliseconds.

pub mod category;
pub mod content;
pub mod notification;
pub mod user;
