//! Per-user notification inbox.
//!
//! # Responsibility
//! - List the notifications one user can see right now, with read state.
//! - Record read markers only for notifications the user can see.
//!
//! # Invariants
//! - Visibility is computed through the content gate at the given `now_ms`;
//!   nothing is written when a notification becomes live or expires.
//! - `mark_all_read` computes the visible set and writes the markers inside
//!   one unit of work.
//! - `unread_count` only counts visible notifications.

use crate::access::gate::{filter_notifications_with, notification_visible};
use crate::access::{AccessError, AccessResolver, UserAccessView};
use crate::config::{
    clamp_notification_limit, CoreConfig, DenialPolicy, DEFAULT_NOTIFICATION_LIMIT,
};
use crate::db::UnitOfWork;
use crate::model::notification::{Notification, NotificationId};
use crate::model::user::UserId;
use crate::repo::access_repo::SqliteAccessStore;
use crate::repo::category_repo::SqliteCategoryRepository;
use crate::repo::notification_repo::{
    NotificationRepository, ReadStateStore, SqliteNotificationRepository,
};
use crate::repo::RepoResult;
use log::info;
use rusqlite::Connection;
use serde::Serialize;

/// Notification as seen by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserNotification {
    #[serde(flatten)]
    pub notification: Notification,
    pub is_read: bool,
    pub read_at: Option<i64>,
}

pub struct NotificationReadTracker<'conn> {
    conn: &'conn Connection,
    categories: SqliteCategoryRepository<'conn>,
    access: SqliteAccessStore<'conn>,
    notifications: SqliteNotificationRepository<'conn>,
    policy: DenialPolicy,
    default_limit: usize,
}

impl<'conn> NotificationReadTracker<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        Ok(Self {
            conn,
            categories: SqliteCategoryRepository::try_new(conn)?,
            access: SqliteAccessStore::try_new(conn)?,
            notifications: SqliteNotificationRepository::try_new(conn)?,
            policy: DenialPolicy::default(),
            default_limit: DEFAULT_NOTIFICATION_LIMIT,
        })
    }

    /// Tracker using the configured denial policy and default page size.
    pub fn from_config(conn: &'conn Connection, config: &CoreConfig) -> RepoResult<Self> {
        Ok(Self::try_new(conn)?
            .with_policy(config.denial_policy)
            .with_default_limit(config.notification_limit))
    }

    pub fn with_policy(mut self, policy: DenialPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = clamp_notification_limit(Some(limit), DEFAULT_NOTIFICATION_LIMIT);
        self
    }

    /// Visible notifications in display order, annotated with read state.
    pub fn list_for_user(
        &self,
        user_id: UserId,
        now_ms: i64,
        limit: Option<usize>,
    ) -> Result<Vec<UserNotification>, AccessError> {
        let limit = clamp_notification_limit(limit, self.default_limit);
        let markers = self.notifications.read_markers(user_id)?;
        let mut visible = self.visible(user_id, now_ms)?;
        visible.truncate(limit);

        Ok(visible
            .into_iter()
            .map(|notification| {
                let marker = markers.get(&notification.id);
                UserNotification {
                    is_read: marker.is_some(),
                    read_at: marker.copied().flatten(),
                    notification,
                }
            })
            .collect())
    }

    pub fn get_for_user(
        &self,
        user_id: UserId,
        notification_id: NotificationId,
        now_ms: i64,
    ) -> Result<UserNotification, AccessError> {
        let notification = self.require_visible(user_id, notification_id, now_ms)?;
        let state = self.notifications.read_state(user_id, notification_id)?;
        Ok(UserNotification {
            notification,
            is_read: state.is_some_and(|state| state.is_read),
            read_at: state.and_then(|state| state.read_at),
        })
    }

    /// Visible minus visible-and-read.
    pub fn unread_count(&self, user_id: UserId, now_ms: i64) -> Result<usize, AccessError> {
        let markers = self.notifications.read_markers(user_id)?;
        Ok(self
            .visible(user_id, now_ms)?
            .iter()
            .filter(|notification| !markers.contains_key(&notification.id))
            .count())
    }

    /// Marks one visible notification read. Repeats keep the first `read_at`.
    pub fn mark_read(
        &self,
        user_id: UserId,
        notification_id: NotificationId,
        now_ms: i64,
    ) -> Result<(), AccessError> {
        self.require_visible(user_id, notification_id, now_ms)?;
        self.notifications.mark_read(user_id, notification_id, now_ms)?;
        Ok(())
    }

    /// Marks every currently visible notification read; returns how many.
    pub fn mark_all_read(&self, user_id: UserId, now_ms: i64) -> Result<usize, AccessError> {
        let uow = UnitOfWork::begin(self.conn)?;
        let ids: Vec<NotificationId> = self
            .visible(user_id, now_ms)?
            .iter()
            .map(|notification| notification.id)
            .collect();
        let marked = self
            .notifications
            .mark_many_read(&uow, user_id, &ids, now_ms)?;
        uow.commit()?;

        info!("event=notifications_mark_all_read module=notification status=ok user_id={user_id} marked={marked}");
        Ok(marked)
    }

    fn view(&self, user_id: UserId) -> RepoResult<UserAccessView<'_, SqliteCategoryRepository<'conn>>> {
        AccessResolver::new(&self.categories, &self.access).view(user_id)
    }

    fn visible(&self, user_id: UserId, now_ms: i64) -> Result<Vec<Notification>, AccessError> {
        let view = self.view(user_id)?;
        let candidates = self.notifications.list_notifications(false)?;
        Ok(filter_notifications_with(&view, candidates, now_ms)?)
    }

    fn require_visible(
        &self,
        user_id: UserId,
        notification_id: NotificationId,
        now_ms: i64,
    ) -> Result<Notification, AccessError> {
        let notification = self
            .notifications
            .get_notification(notification_id)?
            .filter(|notification| notification.is_live_at(now_ms))
            .ok_or(AccessError::not_found("notification", notification_id))?;
        let view = self.view(user_id)?;
        if !notification_visible(&view, &notification, now_ms)? {
            return Err(AccessError::denied(
                self.policy,
                "notification",
                notification_id,
            ));
        }
        Ok(notification)
    }
}
