//! Notification and per-user read-state repositories.
//!
//! # Responsibility
//! - Persist admin-authored notifications.
//! - Persist `(user, notification) -> read` markers with idempotent upserts.
//!
//! # Invariants
//! - Listing order is `priority DESC, created_at DESC, id DESC`.
//! - Re-marking an already-read notification keeps the first `read_at`.
//! - Read-state writes never check visibility; callers must only pass ids
//!   the user can currently see.

use super::schema::{bool_to_int, ensure_connection_ready, int_to_bool, TableSpec};
use super::{RepoError, RepoResult};
use crate::db::UnitOfWork;
use crate::model::notification::{
    NewNotification, Notification, NotificationId, NotificationType, ReadState,
};
use crate::model::user::UserId;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;

const NOTIFICATION_SELECT_SQL: &str = "SELECT
    id,
    title,
    message,
    category_id,
    type,
    action_url,
    action_text,
    is_active,
    scheduled_at,
    expires_at,
    priority,
    created_at
FROM notifications";

const NOTIFICATION_TABLES: &[TableSpec] = &[
    (
        "notifications",
        &[
            "id",
            "title",
            "message",
            "category_id",
            "type",
            "action_url",
            "action_text",
            "is_active",
            "scheduled_at",
            "expires_at",
            "priority",
            "created_at",
        ],
    ),
    (
        "user_notifications",
        &["user_id", "notification_id", "is_read", "read_at"],
    ),
];

const MARK_READ_SQL: &str = "INSERT INTO user_notifications (
        user_id,
        notification_id,
        is_read,
        read_at
    ) VALUES (?1, ?2, 1, ?3)
    ON CONFLICT (user_id, notification_id) DO UPDATE
    SET read_at = CASE
            WHEN user_notifications.is_read = 1 THEN user_notifications.read_at
            ELSE excluded.read_at
        END,
        is_read = 1;";

pub trait NotificationRepository {
    fn create_notification(&self, input: &NewNotification) -> RepoResult<Notification>;
    fn update_notification(
        &self,
        id: NotificationId,
        input: &NewNotification,
    ) -> RepoResult<Notification>;
    fn get_notification(&self, id: NotificationId) -> RepoResult<Option<Notification>>;
    /// Lists notifications in display order.
    fn list_notifications(&self, include_inactive: bool) -> RepoResult<Vec<Notification>>;
    fn delete_notification(&self, id: NotificationId) -> RepoResult<()>;
}

/// Per-user read markers.
pub trait ReadStateStore {
    fn read_state(
        &self,
        user_id: UserId,
        notification_id: NotificationId,
    ) -> RepoResult<Option<ReadState>>;
    /// Every notification the user has marked read, with its `read_at`.
    fn read_markers(&self, user_id: UserId) -> RepoResult<BTreeMap<NotificationId, Option<i64>>>;
    /// Upserts one read marker.
    fn mark_read(
        &self,
        user_id: UserId,
        notification_id: NotificationId,
        now_ms: i64,
    ) -> RepoResult<()>;
    /// Upserts read markers for every id inside the caller's unit of work.
    fn mark_many_read(
        &self,
        uow: &UnitOfWork<'_>,
        user_id: UserId,
        notification_ids: &[NotificationId],
        now_ms: i64,
    ) -> RepoResult<usize>;
}

/// SQLite-backed notification and read-state repository.
pub struct SqliteNotificationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNotificationRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, NOTIFICATION_TABLES)?;
        Ok(Self { conn })
    }
}

impl NotificationRepository for SqliteNotificationRepository<'_> {
    fn create_notification(&self, input: &NewNotification) -> RepoResult<Notification> {
        input.validate()?;
        self.conn.execute(
            "INSERT INTO notifications (
                title,
                message,
                category_id,
                type,
                action_url,
                action_text,
                is_active,
                scheduled_at,
                expires_at,
                priority
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                input.title.trim(),
                input.message.trim(),
                input.category_id,
                input.kind.as_str(),
                input.action_url.as_deref(),
                input.action_text.as_deref(),
                bool_to_int(input.is_active),
                input.scheduled_at,
                input.expires_at,
                input.priority,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_notification(id)?
            .ok_or_else(|| RepoError::not_found("notification", id))
    }

    fn update_notification(
        &self,
        id: NotificationId,
        input: &NewNotification,
    ) -> RepoResult<Notification> {
        input.validate()?;
        let changed = self.conn.execute(
            "UPDATE notifications
             SET title = ?2,
                 message = ?3,
                 category_id = ?4,
                 type = ?5,
                 action_url = ?6,
                 action_text = ?7,
                 is_active = ?8,
                 scheduled_at = ?9,
                 expires_at = ?10,
                 priority = ?11,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                id,
                input.title.trim(),
                input.message.trim(),
                input.category_id,
                input.kind.as_str(),
                input.action_url.as_deref(),
                input.action_text.as_deref(),
                bool_to_int(input.is_active),
                input.scheduled_at,
                input.expires_at,
                input.priority,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("notification", id));
        }
        self.get_notification(id)?
            .ok_or_else(|| RepoError::not_found("notification", id))
    }

    fn get_notification(&self, id: NotificationId) -> RepoResult<Option<Notification>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{NOTIFICATION_SELECT_SQL} WHERE id = ?1;"))?;
        stmt.query_row([id], |row| Ok(parse_notification_row(row)))
            .optional()?
            .transpose()
    }

    fn list_notifications(&self, include_inactive: bool) -> RepoResult<Vec<Notification>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NOTIFICATION_SELECT_SQL}
             WHERE (?1 = 1 OR is_active = 1)
             ORDER BY priority DESC, created_at DESC, id DESC;"
        ))?;
        let mut rows = stmt.query([bool_to_int(include_inactive)])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_notification_row(row)?);
        }
        Ok(items)
    }

    fn delete_notification(&self, id: NotificationId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM notifications WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::not_found("notification", id));
        }
        Ok(())
    }
}

impl ReadStateStore for SqliteNotificationRepository<'_> {
    fn read_state(
        &self,
        user_id: UserId,
        notification_id: NotificationId,
    ) -> RepoResult<Option<ReadState>> {
        let row: Option<(i64, Option<i64>)> = self
            .conn
            .query_row(
                "SELECT is_read, read_at
                 FROM user_notifications
                 WHERE user_id = ?1
                   AND notification_id = ?2;",
                params![user_id, notification_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        row.map(|(is_read, read_at)| {
            Ok(ReadState {
                is_read: int_to_bool(is_read, "user_notifications.is_read")?,
                read_at,
            })
        })
        .transpose()
    }

    fn read_markers(&self, user_id: UserId) -> RepoResult<BTreeMap<NotificationId, Option<i64>>> {
        let mut stmt = self.conn.prepare(
            "SELECT notification_id, read_at
             FROM user_notifications
             WHERE user_id = ?1
               AND is_read = 1;",
        )?;
        let mut rows = stmt.query([user_id])?;
        let mut markers = BTreeMap::new();
        while let Some(row) = rows.next()? {
            markers.insert(row.get(0)?, row.get(1)?);
        }
        Ok(markers)
    }

    fn mark_read(
        &self,
        user_id: UserId,
        notification_id: NotificationId,
        now_ms: i64,
    ) -> RepoResult<()> {
        self.conn
            .execute(MARK_READ_SQL, params![user_id, notification_id, now_ms])?;
        Ok(())
    }

    fn mark_many_read(
        &self,
        uow: &UnitOfWork<'_>,
        user_id: UserId,
        notification_ids: &[NotificationId],
        now_ms: i64,
    ) -> RepoResult<usize> {
        let mut stmt = uow.conn().prepare(MARK_READ_SQL)?;
        for notification_id in notification_ids {
            stmt.execute(params![user_id, notification_id, now_ms])?;
        }
        Ok(notification_ids.len())
    }
}

fn parse_notification_row(row: &Row<'_>) -> RepoResult<Notification> {
    let type_text: String = row.get("type")?;
    let kind = NotificationType::parse(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid notification type `{type_text}` in notifications.type"
        ))
    })?;

    Ok(Notification {
        id: row.get("id")?,
        title: row.get("title")?,
        message: row.get("message")?,
        category_id: row.get("category_id")?,
        kind,
        action_url: row.get("action_url")?,
        action_text: row.get("action_text")?,
        is_active: int_to_bool(row.get("is_active")?, "notifications.is_active")?,
        scheduled_at: row.get("scheduled_at")?,
        expires_at: row.get("expires_at")?,
        priority: row.get("priority")?,
        created_at: row.get("created_at")?,
    })
}
