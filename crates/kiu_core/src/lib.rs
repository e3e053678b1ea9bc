//! Core domain logic for the KIU student materials backend.
//! This crate owns the category access rules; outer layers only pass in an
//! authenticated user id.

pub mod access;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use access::{AccessError, AccessResolver, ContentGate, UserAccessView};
pub use config::{ConfigError, CoreConfig, DenialPolicy};
pub use db::{now_epoch_ms, open_db, open_db_in_memory, DbError, UnitOfWork};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LoggingError,
};
pub use model::category::{Category, CategoryId, CategoryLevel, CategoryPatch, NewCategory};
pub use model::content::{Content, ContentId, ContentType, NewContent};
pub use model::notification::{
    NewNotification, Notification, NotificationId, NotificationState, NotificationType,
};
pub use model::user::{NewUser, User, UserId, UserRole};
pub use repo::access_repo::{AccessMatrix, AccessStore, GrantState, SqliteAccessStore};
pub use repo::category_repo::{CategoryRepository, CategoryTree, SqliteCategoryRepository};
pub use repo::{RepoError, RepoResult};
pub use service::catalog_service::{CatalogService, CategoryDetail, CategoryNode};
pub use service::category_service::{CategoryService, CategoryServiceError};
pub use service::content_service::{ContentAdminService, ContentServiceError};
pub use service::read_tracker::{NotificationReadTracker, UserNotification};
pub use service::user_service::{UserAccessService, UserServiceError};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
