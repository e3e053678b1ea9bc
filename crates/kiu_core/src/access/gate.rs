//! Collection filtering on top of `AccessResolver`.
//!
//! # Invariants
//! - Content is kept iff it is active and its category resolves readable.
//! - Notifications are kept iff they are live at `now_ms` and either global
//!   or scoped to a readable category.
//! - One grant snapshot per call; per-category results are memoized.

use super::resolver::{AccessResolver, UserAccessView};
use crate::model::content::Content;
use crate::model::notification::Notification;
use crate::model::user::UserId;
use crate::repo::access_repo::AccessStore;
use crate::repo::category_repo::CategoryTree;
use crate::repo::RepoResult;
use std::cmp::Ordering;

pub struct ContentGate<'a, T: CategoryTree + ?Sized, S: AccessStore + ?Sized> {
    resolver: AccessResolver<'a, T, S>,
}

impl<'a, T: CategoryTree + ?Sized, S: AccessStore + ?Sized> ContentGate<'a, T, S> {
    pub fn new(tree: &'a T, store: &'a S) -> Self {
        Self {
            resolver: AccessResolver::new(tree, store),
        }
    }

    pub fn resolver(&self) -> &AccessResolver<'a, T, S> {
        &self.resolver
    }

    /// Keeps active content whose category the user can read.
    pub fn filter_content(&self, user_id: UserId, items: Vec<Content>) -> RepoResult<Vec<Content>> {
        let view = self.resolver.view(user_id)?;
        filter_content_with(&view, items)
    }

    /// Keeps live notifications the user can see, in display order.
    pub fn filter_notifications(
        &self,
        user_id: UserId,
        items: Vec<Notification>,
        now_ms: i64,
    ) -> RepoResult<Vec<Notification>> {
        let view = self.resolver.view(user_id)?;
        filter_notifications_with(&view, items, now_ms)
    }
}

pub(crate) fn filter_content_with<T: CategoryTree + ?Sized>(
    view: &UserAccessView<'_, T>,
    items: Vec<Content>,
) -> RepoResult<Vec<Content>> {
    let mut kept = Vec::with_capacity(items.len());
    for item in items {
        if item.is_active && view.can_access(item.category_id)? {
            kept.push(item);
        }
    }
    Ok(kept)
}

pub(crate) fn notification_visible<T: CategoryTree + ?Sized>(
    view: &UserAccessView<'_, T>,
    item: &Notification,
    now_ms: i64,
) -> RepoResult<bool> {
    if !item.is_live_at(now_ms) {
        return Ok(false);
    }
    match item.category_id {
        None => Ok(true),
        Some(category_id) => view.can_access(category_id),
    }
}

pub(crate) fn filter_notifications_with<T: CategoryTree + ?Sized>(
    view: &UserAccessView<'_, T>,
    items: Vec<Notification>,
    now_ms: i64,
) -> RepoResult<Vec<Notification>> {
    let mut kept = Vec::with_capacity(items.len());
    for item in items {
        if notification_visible(view, &item, now_ms)? {
            kept.push(item);
        }
    }
    kept.sort_by(display_order);
    Ok(kept)
}

/// `priority DESC, created_at DESC, id DESC`.
pub fn display_order(left: &Notification, right: &Notification) -> Ordering {
    right
        .priority
        .cmp(&left.priority)
        .then_with(|| right.created_at.cmp(&left.created_at))
        .then_with(|| right.id.cmp(&left.id))
}
