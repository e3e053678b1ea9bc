//! App-facing catalog reads.
//!
//! # Responsibility
//! - Serve categories and content to one user, filtered by grants.
//! - Hide inactive categories together with everything below them.
//!
//! # Invariants
//! - A category is visible iff `can_access` holds and it and every
//!   ancestor are active.
//! - Rows that exist but are not visible are reported per `DenialPolicy`;
//!   rows that do not exist are always `NotFound`.
//! - One grant snapshot per call.

use crate::access::{AccessError, AccessResolver, UserAccessView};
use crate::config::DenialPolicy;
use crate::model::category::{Category, CategoryId};
use crate::model::content::{Content, ContentId, ContentType};
use crate::model::user::UserId;
use crate::repo::access_repo::SqliteAccessStore;
use crate::repo::category_repo::{CategoryTree, SqliteCategoryRepository};
use crate::repo::content_repo::{ContentListQuery, ContentRepository, SqliteContentRepository};
use crate::repo::RepoResult;
use rusqlite::Connection;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashMap;

/// Category with its visible neighbourhood.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryDetail {
    pub category: Category,
    pub parent: Option<Category>,
    pub children: Vec<Category>,
    /// Active content rows attached directly to this category.
    pub content_count: usize,
}

/// One node of the user's visible tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryNode {
    pub category: Category,
    pub children: Vec<CategoryNode>,
}

type CategoryRepo<'conn> = SqliteCategoryRepository<'conn>;

pub struct CatalogService<'conn> {
    categories: CategoryRepo<'conn>,
    access: SqliteAccessStore<'conn>,
    contents: SqliteContentRepository<'conn>,
    policy: DenialPolicy,
}

impl<'conn> CatalogService<'conn> {
    pub fn try_new(conn: &'conn Connection, policy: DenialPolicy) -> RepoResult<Self> {
        Ok(Self {
            categories: SqliteCategoryRepository::try_new(conn)?,
            access: SqliteAccessStore::try_new(conn)?,
            contents: SqliteContentRepository::try_new(conn)?,
            policy,
        })
    }

    /// Visible level-1 categories.
    pub fn main_categories(&self, user_id: UserId) -> Result<Vec<Category>, AccessError> {
        let visibility = self.visibility(user_id)?;
        visibility.retain(self.categories.roots()?)
    }

    /// Visible children of a visible parent.
    pub fn subcategories(
        &self,
        user_id: UserId,
        parent_id: CategoryId,
    ) -> Result<Vec<Category>, AccessError> {
        let visibility = self.visibility(user_id)?;
        self.require_visible(&visibility, parent_id)?;
        visibility.retain(self.categories.children(parent_id)?)
    }

    pub fn category(
        &self,
        user_id: UserId,
        category_id: CategoryId,
    ) -> Result<CategoryDetail, AccessError> {
        let visibility = self.visibility(user_id)?;
        let category = self.require_visible(&visibility, category_id)?;
        let parent = match category.parent_id {
            Some(parent_id) => self.categories.get(parent_id)?,
            None => None,
        };
        let children = visibility.retain(self.categories.children(category_id)?)?;
        let content_count = self.contents.count_active_in_category(category_id)?;
        Ok(CategoryDetail {
            category,
            parent,
            children,
            content_count,
        })
    }

    /// Every visible category as a forest, children in `id ASC` order.
    pub fn tree(&self, user_id: UserId) -> Result<Vec<CategoryNode>, AccessError> {
        let visibility = self.visibility(user_id)?;
        let mut forest = Vec::new();
        for root in visibility.retain(self.categories.roots()?)? {
            forest.push(self.build_node(&visibility, root)?);
        }
        Ok(forest)
    }

    pub fn contents(
        &self,
        user_id: UserId,
        category_id: CategoryId,
    ) -> Result<Vec<Content>, AccessError> {
        let visibility = self.visibility(user_id)?;
        self.require_visible(&visibility, category_id)?;
        let items = self.contents.list_contents(&ContentListQuery {
            category_id: Some(category_id),
            ..ContentListQuery::default()
        })?;
        visibility.retain_content(items)
    }

    pub fn content(&self, user_id: UserId, content_id: ContentId) -> Result<Content, AccessError> {
        let content = self
            .contents
            .get_content(content_id)?
            .filter(|content| content.is_active)
            .ok_or(AccessError::not_found("content", content_id))?;
        let visibility = self.visibility(user_id)?;
        if !visibility.is_visible_id(content.category_id)? {
            return Err(AccessError::denied(self.policy, "content", content_id));
        }
        Ok(content)
    }

    pub fn all_contents(&self, user_id: UserId) -> Result<Vec<Content>, AccessError> {
        self.filtered_contents(user_id, ContentListQuery::default())
    }

    /// Case-insensitive title substring search over visible content.
    pub fn search_contents(&self, user_id: UserId, query: &str) -> Result<Vec<Content>, AccessError> {
        let needle = query.trim();
        if needle.is_empty() {
            return Err(AccessError::InvalidQuery(
                "search query must not be blank".to_string(),
            ));
        }
        self.filtered_contents(
            user_id,
            ContentListQuery {
                title_contains: Some(needle.to_string()),
                ..ContentListQuery::default()
            },
        )
    }

    pub fn contents_by_type(
        &self,
        user_id: UserId,
        content_type: ContentType,
    ) -> Result<Vec<Content>, AccessError> {
        self.filtered_contents(
            user_id,
            ContentListQuery {
                content_type: Some(content_type),
                ..ContentListQuery::default()
            },
        )
    }

    fn filtered_contents(
        &self,
        user_id: UserId,
        query: ContentListQuery,
    ) -> Result<Vec<Content>, AccessError> {
        let visibility = self.visibility(user_id)?;
        visibility.retain_content(self.contents.list_contents(&query)?)
    }

    fn visibility(&self, user_id: UserId) -> RepoResult<Visibility<'_, 'conn>> {
        let view = AccessResolver::new(&self.categories, &self.access).view(user_id)?;
        Ok(Visibility {
            categories: &self.categories,
            view,
            active: RefCell::new(HashMap::new()),
        })
    }

    fn require_visible(
        &self,
        visibility: &Visibility<'_, 'conn>,
        category_id: CategoryId,
    ) -> Result<Category, AccessError> {
        let category = self
            .categories
            .get(category_id)?
            .ok_or(AccessError::not_found("category", category_id))?;
        if !visibility.is_visible(&category)? {
            return Err(AccessError::denied(self.policy, "category", category_id));
        }
        Ok(category)
    }

    fn build_node(
        &self,
        visibility: &Visibility<'_, 'conn>,
        category: Category,
    ) -> Result<CategoryNode, AccessError> {
        let mut children = Vec::new();
        if category.level.child().is_some() {
            for child in visibility.retain(self.categories.children(category.id)?)? {
                children.push(self.build_node(visibility, child)?);
            }
        }
        Ok(CategoryNode { category, children })
    }
}

/// Grant snapshot plus memoized active-chain checks.
struct Visibility<'a, 'conn> {
    categories: &'a CategoryRepo<'conn>,
    view: UserAccessView<'a, CategoryRepo<'conn>>,
    active: RefCell<HashMap<CategoryId, bool>>,
}

impl Visibility<'_, '_> {
    fn is_visible(&self, category: &Category) -> RepoResult<bool> {
        if !category.is_active || !self.view.can_access(category.id)? {
            return Ok(false);
        }
        self.active_chain(category.id)
    }

    fn is_visible_id(&self, category_id: CategoryId) -> RepoResult<bool> {
        if !self.view.can_access(category_id)? {
            return Ok(false);
        }
        self.active_chain(category_id)
    }

    fn active_chain(&self, category_id: CategoryId) -> RepoResult<bool> {
        if let Some(known) = self.active.borrow().get(&category_id) {
            return Ok(*known);
        }
        let active = self.categories.is_active_chain(category_id)?;
        self.active.borrow_mut().insert(category_id, active);
        Ok(active)
    }

    fn retain(&self, items: Vec<Category>) -> Result<Vec<Category>, AccessError> {
        let mut kept = Vec::with_capacity(items.len());
        for item in items {
            if self.is_visible(&item)? {
                kept.push(item);
            }
        }
        Ok(kept)
    }

    fn retain_content(&self, items: Vec<Content>) -> Result<Vec<Content>, AccessError> {
        let mut kept = Vec::with_capacity(items.len());
        for item in items {
            if item.is_active && self.is_visible_id(item.category_id)? {
                kept.push(item);
            }
        }
        Ok(kept)
    }
}
