//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into admin and app-facing use cases.
//! - Own the unit-of-work boundary for multi-table writes.

pub mod catalog_service;
pub mod category_service;
pub mod content_service;
pub mod read_tracker;
pub mod user_service;
