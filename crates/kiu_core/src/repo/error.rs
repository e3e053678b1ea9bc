//! Repository error shared by every SQLite-backed store.

use crate::db::DbError;
use crate::model::category::{CategoryId, CategoryValidationError};
use crate::model::content::ContentValidationError;
use crate::model::notification::NotificationValidationError;
use crate::model::user::UserValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target row does not exist.
    NotFound { entity: &'static str, id: i64 },
    /// Category still has child categories and cannot be deleted.
    HasChildren(CategoryId),
    /// Parent chain exceeds the maximum depth (cycle or corrupted rows).
    CorruptHierarchy(CategoryId),
    /// Access payload names categories that do not exist.
    UnknownCategories(Vec<CategoryId>),
    /// Unique key already taken.
    Conflict(String),
    CategoryValidation(CategoryValidationError),
    ContentValidation(ContentValidationError),
    NotificationValidation(NotificationValidationError),
    UserValidation(UserValidationError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl RepoError {
    pub(crate) fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::HasChildren(id) => {
                write!(f, "category {id} has sub-categories; delete them first")
            }
            Self::CorruptHierarchy(id) => write!(
                f,
                "category {id} has a parent chain deeper than the maximum depth"
            ),
            Self::UnknownCategories(ids) => write!(f, "unknown category ids: {ids:?}"),
            Self::Conflict(message) => write!(f, "conflict: {message}"),
            Self::CategoryValidation(err) => write!(f, "{err}"),
            Self::ContentValidation(err) => write!(f, "{err}"),
            Self::NotificationValidation(err) => write!(f, "{err}"),
            Self::UserValidation(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "repository requires table `{table}`"),
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::CategoryValidation(err) => Some(err),
            Self::ContentValidation(err) => Some(err),
            Self::NotificationValidation(err) => Some(err),
            Self::UserValidation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<CategoryValidationError> for RepoError {
    fn from(value: CategoryValidationError) -> Self {
        Self::CategoryValidation(value)
    }
}

impl From<ContentValidationError> for RepoError {
    fn from(value: ContentValidationError) -> Self {
        Self::ContentValidation(value)
    }
}

impl From<NotificationValidationError> for RepoError {
    fn from(value: NotificationValidationError) -> Self {
        Self::NotificationValidation(value)
    }
}

impl From<UserValidationError> for RepoError {
    fn from(value: UserValidationError) -> Self {
        Self::UserValidation(value)
    }
}
