//! Per-user category grant storage.
//!
//! # Responsibility
//! - Answer "does this user hold an explicit grant on this category".
//! - Replace a user's whole grant matrix atomically.
//! - Seed default-deny rows for new users and new categories.
//!
//! # Invariants
//! - A missing row reads as `GrantState::Unset`, which never allows access.
//! - `set_access_matrix` validates the payload before deleting anything and
//!   rewrites one row per existing category inside the caller's unit of work.
//! - `granted_category_ids` is one SELECT, so callers get a consistent
//!   snapshot of the user's grants even while a replace is in flight.

use super::category_repo::category_ids;
use super::schema::{bool_to_int, ensure_connection_ready, int_to_bool, TableSpec};
use super::{RepoError, RepoResult};
use crate::db::UnitOfWork;
use crate::model::category::CategoryId;
use crate::model::user::UserId;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeMap, BTreeSet};

const ACCESS_TABLES: &[TableSpec] = &[
    (
        "user_category_access",
        &["user_id", "category_id", "has_access"],
    ),
    ("categories", &["id"]),
    ("users", &["id"]),
];

/// Desired grant per category id. Absent ids mean "no access".
pub type AccessMatrix = BTreeMap<CategoryId, bool>;

/// Stored grant for one (user, category) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantState {
    /// Row exists with `has_access = 1`.
    Granted,
    /// Row exists with `has_access = 0`.
    Denied,
    /// No row.
    Unset,
}

impl GrantState {
    /// Collapses the tri-state to a decision; only `Granted` allows.
    pub fn allows(self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// Read side of the grant table.
pub trait AccessStore {
    /// Loads the stored grant for one pair.
    fn grant_state(&self, user_id: UserId, category_id: CategoryId) -> RepoResult<GrantState>;

    /// Whether the user holds an explicit `true` grant.
    fn grant(&self, user_id: UserId, category_id: CategoryId) -> RepoResult<bool> {
        Ok(self.grant_state(user_id, category_id)?.allows())
    }

    /// All category ids the user holds an explicit `true` grant on.
    fn granted_category_ids(&self, user_id: UserId) -> RepoResult<BTreeSet<CategoryId>>;

    /// Stored rows for the user, both granted and denied.
    fn access_matrix(&self, user_id: UserId) -> RepoResult<AccessMatrix>;
}

/// Write side of the grant table. Every write runs inside a caller-owned
/// unit of work.
pub trait AccessWriter {
    /// Replaces the user's grants with `matrix` over the full category set.
    ///
    /// Returns the number of rows written. Fails with
    /// `RepoError::UnknownCategories` before any write when `matrix` names
    /// ids that do not exist.
    fn set_access_matrix(
        &self,
        uow: &UnitOfWork<'_>,
        user_id: UserId,
        matrix: &AccessMatrix,
    ) -> RepoResult<usize>;

    /// Inserts one `has_access = 0` row per given category.
    fn initialize_for_new_user(
        &self,
        uow: &UnitOfWork<'_>,
        user_id: UserId,
        all_category_ids: &[CategoryId],
    ) -> RepoResult<usize>;

    /// Inserts a `has_access = 0` row for every existing user on a new category.
    fn seed_category_for_all_users(
        &self,
        uow: &UnitOfWork<'_>,
        category_id: CategoryId,
    ) -> RepoResult<usize>;
}

/// SQLite-backed grant store.
pub struct SqliteAccessStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAccessStore<'conn> {
    /// Creates store from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, ACCESS_TABLES)?;
        Ok(Self { conn })
    }
}

impl AccessStore for SqliteAccessStore<'_> {
    fn grant_state(&self, user_id: UserId, category_id: CategoryId) -> RepoResult<GrantState> {
        let value: Option<i64> = self
            .conn
            .query_row(
                "SELECT has_access
                 FROM user_category_access
                 WHERE user_id = ?1
                   AND category_id = ?2;",
                params![user_id, category_id],
                |row| row.get(0),
            )
            .optional()?;

        match value {
            None => Ok(GrantState::Unset),
            Some(raw) => {
                if int_to_bool(raw, "user_category_access.has_access")? {
                    Ok(GrantState::Granted)
                } else {
                    Ok(GrantState::Denied)
                }
            }
        }
    }

    fn granted_category_ids(&self, user_id: UserId) -> RepoResult<BTreeSet<CategoryId>> {
        let mut stmt = self.conn.prepare(
            "SELECT category_id
             FROM user_category_access
             WHERE user_id = ?1
               AND has_access = 1;",
        )?;
        let mut rows = stmt.query([user_id])?;
        let mut ids = BTreeSet::new();
        while let Some(row) = rows.next()? {
            ids.insert(row.get(0)?);
        }
        Ok(ids)
    }

    fn access_matrix(&self, user_id: UserId) -> RepoResult<AccessMatrix> {
        let mut stmt = self.conn.prepare(
            "SELECT category_id, has_access
             FROM user_category_access
             WHERE user_id = ?1
             ORDER BY category_id ASC;",
        )?;
        let mut rows = stmt.query([user_id])?;
        let mut matrix = AccessMatrix::new();
        while let Some(row) = rows.next()? {
            let category_id: CategoryId = row.get(0)?;
            let has_access = int_to_bool(row.get(1)?, "user_category_access.has_access")?;
            matrix.insert(category_id, has_access);
        }
        Ok(matrix)
    }
}

impl AccessWriter for SqliteAccessStore<'_> {
    fn set_access_matrix(
        &self,
        uow: &UnitOfWork<'_>,
        user_id: UserId,
        matrix: &AccessMatrix,
    ) -> RepoResult<usize> {
        let conn = uow.conn();
        ensure_user_exists(conn, user_id)?;

        let universe = category_ids(conn)?;
        let known: BTreeSet<CategoryId> = universe.iter().copied().collect();
        let unknown: Vec<CategoryId> = matrix
            .keys()
            .filter(|id| !known.contains(id))
            .copied()
            .collect();
        if !unknown.is_empty() {
            return Err(RepoError::UnknownCategories(unknown));
        }

        conn.execute(
            "DELETE FROM user_category_access WHERE user_id = ?1;",
            [user_id],
        )?;

        let mut stmt = conn.prepare(
            "INSERT INTO user_category_access (user_id, category_id, has_access)
             VALUES (?1, ?2, ?3);",
        )?;
        for category_id in &universe {
            let has_access = matrix.get(category_id).copied().unwrap_or(false);
            stmt.execute(params![user_id, category_id, bool_to_int(has_access)])?;
        }
        Ok(universe.len())
    }

    fn initialize_for_new_user(
        &self,
        uow: &UnitOfWork<'_>,
        user_id: UserId,
        all_category_ids: &[CategoryId],
    ) -> RepoResult<usize> {
        let conn = uow.conn();
        ensure_user_exists(conn, user_id)?;

        let mut stmt = conn.prepare(
            "INSERT OR IGNORE INTO user_category_access (user_id, category_id, has_access)
             VALUES (?1, ?2, 0);",
        )?;
        let mut inserted = 0;
        for category_id in all_category_ids {
            inserted += stmt.execute(params![user_id, category_id])?;
        }
        Ok(inserted)
    }

    fn seed_category_for_all_users(
        &self,
        uow: &UnitOfWork<'_>,
        category_id: CategoryId,
    ) -> RepoResult<usize> {
        let inserted = uow.conn().execute(
            "INSERT OR IGNORE INTO user_category_access (user_id, category_id, has_access)
             SELECT id, ?1, 0
             FROM users;",
            [category_id],
        )?;
        Ok(inserted)
    }
}

fn ensure_user_exists(conn: &Connection, user_id: UserId) -> RepoResult<()> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1);",
        [user_id],
        |row| row.get(0),
    )?;
    if exists == 1 {
        Ok(())
    } else {
        Err(RepoError::not_found("user", user_id))
    }
}
