//! Content administration.
//!
//! Creating active content also posts a category-scoped announcement, so
//! only users who can read the category ever see it.

use crate::db::{DbError, UnitOfWork};
use crate::model::category::{Category, CategoryId};
use crate::model::content::{Content, ContentId, ContentValidationError, NewContent};
use crate::model::notification::{NewNotification, NotificationType};
use crate::repo::category_repo::{CategoryTree, SqliteCategoryRepository};
use crate::repo::content_repo::{ContentListQuery, ContentRepository, SqliteContentRepository};
use crate::repo::notification_repo::{NotificationRepository, SqliteNotificationRepository};
use crate::repo::RepoError;
use log::info;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Priority of the automatic "new material" announcement.
pub const CONTENT_ANNOUNCEMENT_PRIORITY: i64 = 20;

#[derive(Debug)]
pub enum ContentServiceError {
    Validation(ContentValidationError),
    CategoryNotFound(CategoryId),
    ContentNotFound(ContentId),
    Repo(RepoError),
}

impl Display for ContentServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::CategoryNotFound(id) => write!(f, "category not found: {id}"),
            Self::ContentNotFound(id) => write!(f, "content not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ContentServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ContentServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound {
                entity: "category",
                id,
            } => Self::CategoryNotFound(id),
            RepoError::NotFound {
                entity: "content",
                id,
            } => Self::ContentNotFound(id),
            RepoError::ContentValidation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<DbError> for ContentServiceError {
    fn from(value: DbError) -> Self {
        Self::Repo(RepoError::from(value))
    }
}

pub struct ContentAdminService<'conn> {
    conn: &'conn Connection,
    categories: SqliteCategoryRepository<'conn>,
    contents: SqliteContentRepository<'conn>,
    notifications: SqliteNotificationRepository<'conn>,
}

impl<'conn> ContentAdminService<'conn> {
    pub fn try_new(conn: &'conn Connection) -> Result<Self, ContentServiceError> {
        Ok(Self {
            conn,
            categories: SqliteCategoryRepository::try_new(conn)?,
            contents: SqliteContentRepository::try_new(conn)?,
            notifications: SqliteNotificationRepository::try_new(conn)?,
        })
    }

    pub fn create_content(&self, input: &NewContent) -> Result<Content, ContentServiceError> {
        let uow = UnitOfWork::begin(self.conn)?;
        let content = self.contents.create_content(input)?;
        if content.is_active {
            let category = self.categories.require(content.category_id)?;
            self.notifications
                .create_notification(&content_announcement(&content, &category))?;
        }
        uow.commit()?;

        info!(
            "event=content_create module=content status=ok content_id={} category_id={}",
            content.id, content.category_id
        );
        Ok(content)
    }

    pub fn update_content(&self, id: ContentId, input: &NewContent) -> Result<Content, ContentServiceError> {
        Ok(self.contents.update_content(id, input)?)
    }

    pub fn delete_content(&self, id: ContentId) -> Result<(), ContentServiceError> {
        self.contents.delete_content(id)?;
        info!("event=content_delete module=content status=ok content_id={id}");
        Ok(())
    }

    /// Admin listing; includes inactive rows.
    pub fn list_contents(&self, query: &ContentListQuery) -> Result<Vec<Content>, ContentServiceError> {
        Ok(self.contents.list_contents(query)?)
    }
}

fn content_announcement(content: &Content, category: &Category) -> NewNotification {
    let mut notification = NewNotification::global(
        format!(
            "New {} Material Available",
            content.content_type.as_str().to_ascii_uppercase()
        ),
        format!(
            "New material '{}' has been added to {}. Download it now!",
            content.title, category.title
        ),
    );
    notification.category_id = Some(content.category_id);
    notification.kind = NotificationType::Success;
    notification.priority = CONTENT_ANNOUNCEMENT_PRIORITY;
    notification
}

#[cfg(test)]
mod tests {
    use super::content_announcement;
    use crate::model::category::{Category, CategoryLevel};
    use crate::model::content::{Content, ContentType};

    #[test]
    fn announcement_is_scoped_to_the_category() {
        let category = Category {
            id: 4,
            title: "Pharmacology".to_string(),
            image: None,
            parent_id: None,
            level: CategoryLevel::Main,
            is_active: true,
            created_at: 0,
            updated_at: 0,
        };
        let content = Content {
            id: 1,
            category_id: 4,
            content_type: ContentType::Pdf,
            url: "https://cdn.example.com/week1.pdf".to_string(),
            title: "Week 1".to_string(),
            is_active: true,
            created_at: 0,
        };
        let notification = content_announcement(&content, &category);
        assert_eq!(notification.title, "New PDF Material Available");
        assert_eq!(
            notification.message,
            "New material 'Week 1' has been added to Pharmacology. Download it now!"
        );
        assert_eq!(notification.category_id, Some(4));
        assert_eq!(notification.priority, 20);
    }
}
