//! Category administration use cases.
//!
//! # Responsibility
//! - Derive category level from the parent; never accept it from callers.
//! - Reject moves that would create a cycle or push the subtree below
//!   `MAX_CATEGORY_DEPTH`.
//! - Keep the "every user has a grant row" invariant when categories are
//!   created, and announce new active categories.
//!
//! # Invariants
//! - Create and move are single units of work. All repositories share the
//!   service connection, so their statements join the open transaction.

use crate::db::{DbError, UnitOfWork};
use crate::model::category::{
    normalize_category_title, Category, CategoryId, CategoryLevel, CategoryPatch,
    CategoryValidationError, NewCategory, MAX_CATEGORY_DEPTH,
};
use crate::model::notification::{NewNotification, NotificationType};
use crate::repo::access_repo::{AccessWriter, SqliteAccessStore};
use crate::repo::category_repo::{CategoryRepository, CategoryTree, SqliteCategoryRepository};
use crate::repo::notification_repo::{NotificationRepository, SqliteNotificationRepository};
use crate::repo::RepoError;
use log::info;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Priority of the automatic "new category" announcement.
pub const CATEGORY_ANNOUNCEMENT_PRIORITY: i64 = 15;

#[derive(Debug)]
pub enum CategoryServiceError {
    InvalidTitle,
    CategoryNotFound(CategoryId),
    ParentNotFound(CategoryId),
    /// Placing a child under this parent would exceed the maximum depth.
    DepthExceeded { parent_id: CategoryId },
    /// Moving `category_id` under `parent_id` would close a loop.
    CycleDetected {
        category_id: CategoryId,
        parent_id: CategoryId,
    },
    HasChildren(CategoryId),
    Repo(RepoError),
}

impl Display for CategoryServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTitle => write!(f, "category title must not be blank"),
            Self::CategoryNotFound(id) => write!(f, "category not found: {id}"),
            Self::ParentNotFound(id) => write!(f, "parent category not found: {id}"),
            Self::DepthExceeded { parent_id } => write!(
                f,
                "category under parent {parent_id} would exceed depth {MAX_CATEGORY_DEPTH}"
            ),
            Self::CycleDetected {
                category_id,
                parent_id,
            } => write!(
                f,
                "move would create cycle: category {category_id} under parent {parent_id}"
            ),
            Self::HasChildren(id) => {
                write!(f, "category {id} has sub-categories; delete them first")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CategoryServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for CategoryServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound {
                entity: "category",
                id,
            } => Self::CategoryNotFound(id),
            RepoError::HasChildren(id) => Self::HasChildren(id),
            RepoError::CategoryValidation(CategoryValidationError::BlankTitle) => {
                Self::InvalidTitle
            }
            other => Self::Repo(other),
        }
    }
}

impl From<DbError> for CategoryServiceError {
    fn from(value: DbError) -> Self {
        Self::Repo(RepoError::from(value))
    }
}

impl From<CategoryValidationError> for CategoryServiceError {
    fn from(value: CategoryValidationError) -> Self {
        match value {
            CategoryValidationError::BlankTitle => Self::InvalidTitle,
            other => Self::Repo(RepoError::from(other)),
        }
    }
}

/// Admin-side category service over one SQLite connection.
pub struct CategoryService<'conn> {
    conn: &'conn Connection,
    categories: SqliteCategoryRepository<'conn>,
    access: SqliteAccessStore<'conn>,
    notifications: SqliteNotificationRepository<'conn>,
}

impl<'conn> CategoryService<'conn> {
    pub fn try_new(conn: &'conn Connection) -> Result<Self, CategoryServiceError> {
        Ok(Self {
            conn,
            categories: SqliteCategoryRepository::try_new(conn)?,
            access: SqliteAccessStore::try_new(conn)?,
            notifications: SqliteNotificationRepository::try_new(conn)?,
        })
    }

    /// Read access to the underlying tree.
    pub fn tree(&self) -> &SqliteCategoryRepository<'conn> {
        &self.categories
    }

    /// Creates one category, seeds a denied grant for every existing user,
    /// and announces it when active.
    pub fn create_category(&self, input: &NewCategory) -> Result<Category, CategoryServiceError> {
        let title = normalize_category_title(&input.title)?;
        let image = normalize_image(input.image.as_deref());

        let uow = UnitOfWork::begin(self.conn)?;
        let level = match input.parent_id {
            None => CategoryLevel::Main,
            Some(parent_id) => self.child_level_under(parent_id)?,
        };
        let category = self.categories.create_category(
            &uow,
            &title,
            image,
            input.parent_id,
            level,
            input.is_active,
        )?;
        let seeded = self.access.seed_category_for_all_users(&uow, category.id)?;
        if category.is_active {
            self.notifications
                .create_notification(&category_announcement(&category))?;
        }
        uow.commit()?;

        info!(
            "event=category_create module=category status=ok category_id={} level={} seeded_grants={seeded}",
            category.id,
            category.level.depth()
        );
        Ok(category)
    }

    /// Applies title/image/active edits. Level and parent are untouched.
    pub fn update_category(
        &self,
        id: CategoryId,
        patch: &CategoryPatch,
    ) -> Result<Category, CategoryServiceError> {
        let normalized = CategoryPatch {
            title: patch
                .title
                .as_deref()
                .map(normalize_category_title)
                .transpose()?,
            image: patch
                .image
                .as_ref()
                .map(|image| normalize_image(image.as_deref()).map(str::to_string)),
            is_active: patch.is_active,
        };
        Ok(self.categories.update_category(id, &normalized)?)
    }

    /// Re-parents `id` (or detaches it to a root) and re-levels its subtree.
    ///
    /// Cycle and depth checks run inside the unit of work, after the write
    /// lock is taken, so a concurrent writer cannot invalidate them.
    pub fn move_category(
        &self,
        id: CategoryId,
        new_parent_id: Option<CategoryId>,
    ) -> Result<Category, CategoryServiceError> {
        let uow = UnitOfWork::begin(self.conn)?;
        let current = self.categories.require(id)?;
        if current.parent_id == new_parent_id {
            return Ok(current);
        }

        let new_level = match new_parent_id {
            None => CategoryLevel::Main,
            Some(parent_id) => {
                if self.would_create_cycle(id, parent_id)? {
                    return Err(CategoryServiceError::CycleDetected {
                        category_id: id,
                        parent_id,
                    });
                }
                self.child_level_under(parent_id)?
            }
        };

        let height = self.categories.subtree_height(id)?;
        if new_level.depth() + height - 1 > MAX_CATEGORY_DEPTH {
            return Err(CategoryServiceError::DepthExceeded {
                parent_id: new_parent_id.unwrap_or(id),
            });
        }

        self.categories
            .reparent_category(&uow, id, new_parent_id, new_level)?;
        let moved = self.categories.require(id)?;
        uow.commit()?;

        info!(
            "event=category_move module=category status=ok category_id={id} level={}",
            new_level.depth()
        );
        Ok(moved)
    }

    /// Deletes a childless category. Grants, content and scoped
    /// notifications go with it.
    pub fn delete_category(&self, id: CategoryId) -> Result<(), CategoryServiceError> {
        self.categories.delete_category(id)?;
        info!("event=category_delete module=category status=ok category_id={id}");
        Ok(())
    }

    fn child_level_under(&self, parent_id: CategoryId) -> Result<CategoryLevel, CategoryServiceError> {
        let parent = self
            .categories
            .get(parent_id)?
            .ok_or(CategoryServiceError::ParentNotFound(parent_id))?;
        parent
            .level
            .child()
            .ok_or(CategoryServiceError::DepthExceeded { parent_id })
    }

    fn would_create_cycle(
        &self,
        id: CategoryId,
        parent_id: CategoryId,
    ) -> Result<bool, CategoryServiceError> {
        if id == parent_id {
            return Ok(true);
        }
        if self.categories.get(parent_id)?.is_none() {
            return Err(CategoryServiceError::ParentNotFound(parent_id));
        }
        Ok(self
            .categories
            .ancestors(parent_id)?
            .iter()
            .any(|ancestor| ancestor.id == id))
    }
}

fn normalize_image(image: Option<&str>) -> Option<&str> {
    image.map(str::trim).filter(|value| !value.is_empty())
}

fn category_announcement(category: &Category) -> NewNotification {
    let level_name = category.level.display_name();
    let mut notification = NewNotification::global(
        format!("New {level_name} Added"),
        format!(
            "A new {level_name} '{}' has been added. Check it out in the app!",
            category.title
        ),
    );
    notification.kind = NotificationType::Success;
    notification.priority = CATEGORY_ANNOUNCEMENT_PRIORITY;
    notification
}
