//! User registration and access-matrix administration.
//!
//! # Invariants
//! - A registered user owns one denied grant row per existing category; the
//!   user row and those grants commit together or not at all.
//! - Saving a matrix is a full replace; ids that do not name a category
//!   reject the whole save before anything is written.
//! - Admin accounts are not governed by grants and have no matrix.

use crate::db::{DbError, UnitOfWork};
use crate::model::category::CategoryId;
use crate::model::user::{NewUser, User, UserId, UserRole, UserValidationError};
use crate::repo::access_repo::{AccessMatrix, AccessStore, AccessWriter, SqliteAccessStore};
use crate::repo::category_repo::{CategoryTree, SqliteCategoryRepository};
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::repo::RepoError;
use log::info;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum UserServiceError {
    Validation(UserValidationError),
    /// KIU id already registered.
    DuplicateKiuId(String),
    UserNotFound(UserId),
    /// Admin accounts do not carry an access matrix.
    AdminAccessNotManaged(UserId),
    UnknownCategories(Vec<CategoryId>),
    Repo(RepoError),
}

impl Display for UserServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::DuplicateKiuId(message) => write!(f, "{message}"),
            Self::UserNotFound(id) => write!(f, "user not found: {id}"),
            Self::AdminAccessNotManaged(id) => {
                write!(f, "user {id} is an admin; access matrix is not managed")
            }
            Self::UnknownCategories(ids) => write!(f, "unknown category ids: {ids:?}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for UserServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for UserServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::UserValidation(err) => Self::Validation(err),
            RepoError::Conflict(message) => Self::DuplicateKiuId(message),
            RepoError::NotFound { entity: "user", id } => Self::UserNotFound(id),
            RepoError::UnknownCategories(ids) => Self::UnknownCategories(ids),
            other => Self::Repo(other),
        }
    }
}

impl From<DbError> for UserServiceError {
    fn from(value: DbError) -> Self {
        Self::Repo(RepoError::from(value))
    }
}

pub struct UserAccessService<'conn> {
    conn: &'conn Connection,
    users: SqliteUserRepository<'conn>,
    categories: SqliteCategoryRepository<'conn>,
    access: SqliteAccessStore<'conn>,
}

impl<'conn> UserAccessService<'conn> {
    pub fn try_new(conn: &'conn Connection) -> Result<Self, UserServiceError> {
        Ok(Self {
            conn,
            users: SqliteUserRepository::try_new(conn)?,
            categories: SqliteCategoryRepository::try_new(conn)?,
            access: SqliteAccessStore::try_new(conn)?,
        })
    }

    /// Registers a user with default-deny grants on every category.
    pub fn register_user(&self, input: &NewUser) -> Result<User, UserServiceError> {
        let uow = UnitOfWork::begin(self.conn)?;
        let user = self.users.create_user(&uow, input)?;
        let category_ids = self.categories.all_ids()?;
        let seeded = self
            .access
            .initialize_for_new_user(&uow, user.id, &category_ids)?;
        uow.commit()?;

        info!(
            "event=user_register module=user status=ok user_id={} seeded_grants={seeded}",
            user.id
        );
        Ok(user)
    }

    pub fn get_user(&self, user_id: UserId) -> Result<User, UserServiceError> {
        self.users
            .get_user(user_id)?
            .ok_or(UserServiceError::UserNotFound(user_id))
    }

    pub fn list_users(&self, search: Option<&str>) -> Result<Vec<User>, UserServiceError> {
        Ok(self.users.list_users(search)?)
    }

    pub fn delete_user(&self, user_id: UserId) -> Result<(), UserServiceError> {
        self.users.delete_user(user_id)?;
        info!("event=user_delete module=user status=ok user_id={user_id}");
        Ok(())
    }

    /// Full matrix over every category; missing rows read as `false`.
    pub fn access_matrix(&self, user_id: UserId) -> Result<AccessMatrix, UserServiceError> {
        self.require_managed_user(user_id)?;
        let stored = self.access.access_matrix(user_id)?;
        Ok(self
            .categories
            .all_ids()?
            .into_iter()
            .map(|id| (id, stored.get(&id).copied().unwrap_or(false)))
            .collect())
    }

    /// Grants exactly `allowed` and denies every other category.
    pub fn save_access_matrix(
        &self,
        user_id: UserId,
        allowed: &[CategoryId],
    ) -> Result<usize, UserServiceError> {
        let matrix: AccessMatrix = allowed.iter().map(|id| (*id, true)).collect();
        self.replace_access_matrix(user_id, &matrix)
    }

    /// Replaces the user's grants with an explicit matrix.
    pub fn replace_access_matrix(
        &self,
        user_id: UserId,
        matrix: &AccessMatrix,
    ) -> Result<usize, UserServiceError> {
        let uow = UnitOfWork::begin(self.conn)?;
        self.require_managed_user(user_id)?;
        let written = self.access.set_access_matrix(&uow, user_id, matrix)?;
        uow.commit()?;

        let granted = matrix.values().filter(|has_access| **has_access).count();
        info!(
            "event=access_matrix_replace module=user status=ok user_id={user_id} rows={written} granted={granted}"
        );
        Ok(written)
    }

    fn require_managed_user(&self, user_id: UserId) -> Result<User, UserServiceError> {
        let user = self.get_user(user_id)?;
        if user.role == UserRole::Admin {
            return Err(UserServiceError::AdminAccessNotManaged(user_id));
        }
        Ok(user)
    }
}
