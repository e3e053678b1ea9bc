//! Access decisions over the category tree.
//!
//! # Responsibility
//! - Resolve `(user, category)` readability by walking the ancestor chain.
//! - Filter content and notification collections for one user.
//!
//! # Invariants
//! - Default deny: no grant row, no access.
//! - Resolver and gate answer denial with `false`/omission, never an error.

mod error;
pub mod gate;
pub mod resolver;

pub use error::AccessError;
pub use gate::{display_order, ContentGate};
pub use resolver::{AccessResolver, UserAccessView};
