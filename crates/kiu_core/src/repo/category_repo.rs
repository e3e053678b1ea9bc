//! Category tree contracts and SQLite implementation.
//!
//! # Responsibility
//! - Expose read access to the category forest (`CategoryTree`).
//! - Persist admin edits to categories (`CategoryRepository`).
//!
//! # Invariants
//! - Child listing is deterministic: `id ASC`.
//! - Every walk up or down the tree is bounded by `MAX_CATEGORY_DEPTH`; a
//!   chain that does not terminate within the bound is reported as
//!   `RepoError::CorruptHierarchy` rather than followed.
//! - Re-parenting rewrites the level of the whole moved subtree in the
//!   same transaction as the parent change.

use super::schema::{bool_to_int, ensure_connection_ready, int_to_bool, TableSpec};
use super::{RepoError, RepoResult};
use crate::db::UnitOfWork;
use crate::model::category::{
    Category, CategoryId, CategoryLevel, CategoryPatch, MAX_CATEGORY_DEPTH,
};
use rusqlite::{params, Connection, OptionalExtension, Row};

const CATEGORY_SELECT_SQL: &str = "SELECT
    id,
    title,
    image,
    parent_id,
    level,
    is_active,
    created_at,
    updated_at
FROM categories";

const CATEGORY_TABLES: &[TableSpec] = &[(
    "categories",
    &[
        "id",
        "title",
        "image",
        "parent_id",
        "level",
        "is_active",
        "created_at",
        "updated_at",
    ],
)];

/// Read-only view of the category forest.
///
/// Implementors provide row lookups; the tree walks (`parent`, `ancestors`,
/// `is_active_chain`, `subtree_height`) are shared default methods so every
/// store gets the same depth guard.
pub trait CategoryTree {
    /// Loads one category by id.
    fn get(&self, id: CategoryId) -> RepoResult<Option<Category>>;
    /// Lists direct children of an existing category.
    fn children(&self, id: CategoryId) -> RepoResult<Vec<Category>>;
    /// Lists level-1 categories.
    fn roots(&self) -> RepoResult<Vec<Category>>;
    /// Lists every category ordered by `level ASC, id ASC`.
    fn list_all(&self) -> RepoResult<Vec<Category>>;

    /// Ids of every category.
    fn all_ids(&self) -> RepoResult<Vec<CategoryId>> {
        Ok(self
            .list_all()?
            .into_iter()
            .map(|category| category.id)
            .collect())
    }

    /// Loads one category or fails with `NotFound`.
    fn require(&self, id: CategoryId) -> RepoResult<Category> {
        self.get(id)?
            .ok_or_else(|| RepoError::not_found("category", id))
    }

    /// Returns the parent of an existing category, `None` for roots.
    fn parent(&self, id: CategoryId) -> RepoResult<Option<Category>> {
        match self.require(id)?.parent_id {
            Some(parent_id) => Ok(Some(self.require(parent_id)?)),
            None => Ok(None),
        }
    }

    /// Returns the chain from the immediate parent up to the level-1 root.
    fn ancestors(&self, id: CategoryId) -> RepoResult<Vec<Category>> {
        let category = self.require(id)?;
        let mut chain = Vec::new();
        let mut cursor = category.parent_id;
        while let Some(current) = cursor {
            if chain.len() + 1 >= usize::from(MAX_CATEGORY_DEPTH) {
                return Err(RepoError::CorruptHierarchy(id));
            }
            let ancestor = self
                .get(current)?
                .ok_or(RepoError::CorruptHierarchy(id))?;
            cursor = ancestor.parent_id;
            chain.push(ancestor);
        }
        Ok(chain)
    }

    /// Returns the admin active flag of an existing category.
    fn is_active(&self, id: CategoryId) -> RepoResult<bool> {
        Ok(self.require(id)?.is_active)
    }

    /// Returns whether the category and every ancestor are active.
    fn is_active_chain(&self, id: CategoryId) -> RepoResult<bool> {
        if !self.is_active(id)? {
            return Ok(false);
        }
        Ok(self
            .ancestors(id)?
            .iter()
            .all(|ancestor| ancestor.is_active))
    }

    /// Number of levels in the subtree rooted at `id` (1 for a leaf).
    fn subtree_height(&self, id: CategoryId) -> RepoResult<u8> {
        self.require(id)?;
        let mut height = 1u8;
        let mut frontier = vec![id];
        loop {
            let mut next = Vec::new();
            for current in &frontier {
                next.extend(self.children(*current)?.into_iter().map(|child| child.id));
            }
            if next.is_empty() {
                return Ok(height);
            }
            height += 1;
            if height > MAX_CATEGORY_DEPTH {
                return Err(RepoError::CorruptHierarchy(id));
            }
            frontier = next;
        }
    }
}

/// Admin write operations over categories.
pub trait CategoryRepository: CategoryTree {
    /// Inserts one category. `level` must already be derived from the parent.
    fn create_category(
        &self,
        uow: &UnitOfWork<'_>,
        title: &str,
        image: Option<&str>,
        parent_id: Option<CategoryId>,
        level: CategoryLevel,
        is_active: bool,
    ) -> RepoResult<Category>;
    /// Applies title/image/active edits.
    fn update_category(&self, id: CategoryId, patch: &CategoryPatch) -> RepoResult<Category>;
    /// Moves one category under `new_parent_id` and shifts the level of the
    /// whole subtree so that the moved node lands on `new_level`.
    fn reparent_category(
        &self,
        uow: &UnitOfWork<'_>,
        id: CategoryId,
        new_parent_id: Option<CategoryId>,
        new_level: CategoryLevel,
    ) -> RepoResult<()>;
    /// Deletes one childless category.
    fn delete_category(&self, id: CategoryId) -> RepoResult<()>;
    /// Number of direct children.
    fn count_children(&self, id: CategoryId) -> RepoResult<usize>;
}

/// SQLite-backed category repository.
pub struct SqliteCategoryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCategoryRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, CATEGORY_TABLES)?;
        Ok(Self { conn })
    }

    fn query_categories(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> RepoResult<Vec<Category>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_category_row(row)?);
        }
        Ok(items)
    }
}

impl CategoryTree for SqliteCategoryRepository<'_> {
    fn get(&self, id: CategoryId) -> RepoResult<Option<Category>> {
        load_category(self.conn, id)
    }

    fn children(&self, id: CategoryId) -> RepoResult<Vec<Category>> {
        self.require(id)?;
        self.query_categories(
            &format!("{CATEGORY_SELECT_SQL} WHERE parent_id = ?1 ORDER BY id ASC;"),
            [id],
        )
    }

    fn roots(&self) -> RepoResult<Vec<Category>> {
        self.query_categories(
            &format!("{CATEGORY_SELECT_SQL} WHERE parent_id IS NULL ORDER BY id ASC;"),
            [],
        )
    }

    fn list_all(&self) -> RepoResult<Vec<Category>> {
        self.query_categories(
            &format!("{CATEGORY_SELECT_SQL} ORDER BY level ASC, id ASC;"),
            [],
        )
    }

    fn all_ids(&self) -> RepoResult<Vec<CategoryId>> {
        category_ids(self.conn)
    }
}

impl CategoryRepository for SqliteCategoryRepository<'_> {
    fn create_category(
        &self,
        uow: &UnitOfWork<'_>,
        title: &str,
        image: Option<&str>,
        parent_id: Option<CategoryId>,
        level: CategoryLevel,
        is_active: bool,
    ) -> RepoResult<Category> {
        let conn = uow.conn();
        conn.execute(
            "INSERT INTO categories (
                title,
                image,
                parent_id,
                level,
                is_active
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                title,
                image,
                parent_id,
                i64::from(level.depth()),
                bool_to_int(is_active),
            ],
        )?;
        let id = conn.last_insert_rowid();
        load_category(conn, id)?.ok_or_else(|| RepoError::not_found("category", id))
    }

    fn update_category(&self, id: CategoryId, patch: &CategoryPatch) -> RepoResult<Category> {
        let current = self.require(id)?;
        let title = patch.title.as_deref().unwrap_or(current.title.as_str());
        let image = match &patch.image {
            Some(value) => value.as_deref(),
            None => current.image.as_deref(),
        };
        let is_active = patch.is_active.unwrap_or(current.is_active);

        self.conn.execute(
            "UPDATE categories
             SET title = ?2,
                 image = ?3,
                 is_active = ?4,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id, title, image, bool_to_int(is_active)],
        )?;
        self.require(id)
    }

    fn reparent_category(
        &self,
        uow: &UnitOfWork<'_>,
        id: CategoryId,
        new_parent_id: Option<CategoryId>,
        new_level: CategoryLevel,
    ) -> RepoResult<()> {
        let conn = uow.conn();
        let current =
            load_category(conn, id)?.ok_or_else(|| RepoError::not_found("category", id))?;
        let delta = i64::from(new_level.depth()) - i64::from(current.level.depth());

        conn.execute(
            "UPDATE categories
             SET parent_id = ?2,
                 level = ?3,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id, new_parent_id, i64::from(new_level.depth())],
        )?;

        if delta != 0 {
            conn.execute(
                "WITH RECURSIVE subtree(id, depth) AS (
                    SELECT id, 0
                    FROM categories
                    WHERE parent_id = ?1
                    UNION ALL
                    SELECT child.id, parent.depth + 1
                    FROM categories child
                    INNER JOIN subtree parent ON child.parent_id = parent.id
                    WHERE parent.depth < ?3
                )
                UPDATE categories
                SET level = level + ?2,
                    updated_at = (strftime('%s', 'now') * 1000)
                WHERE id IN (SELECT id FROM subtree);",
                params![id, delta, i64::from(MAX_CATEGORY_DEPTH)],
            )?;
        }
        Ok(())
    }

    fn delete_category(&self, id: CategoryId) -> RepoResult<()> {
        self.require(id)?;
        if self.count_children(id)? > 0 {
            return Err(RepoError::HasChildren(id));
        }
        self.conn
            .execute("DELETE FROM categories WHERE id = ?1;", [id])?;
        Ok(())
    }

    fn count_children(&self, id: CategoryId) -> RepoResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM categories WHERE parent_id = ?1;",
            [id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

/// Loads every category id. Shared with the access store, which validates
/// matrix payloads against the same universe.
pub(crate) fn category_ids(conn: &Connection) -> RepoResult<Vec<CategoryId>> {
    let mut stmt = conn.prepare("SELECT id FROM categories ORDER BY id ASC;")?;
    let mut rows = stmt.query([])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        ids.push(row.get(0)?);
    }
    Ok(ids)
}

fn load_category(conn: &Connection, id: CategoryId) -> RepoResult<Option<Category>> {
    let mut stmt = conn.prepare(&format!("{CATEGORY_SELECT_SQL} WHERE id = ?1;"))?;
    stmt.query_row([id], |row| Ok(parse_category_row(row)))
        .optional()?
        .transpose()
}

fn parse_category_row(row: &Row<'_>) -> RepoResult<Category> {
    let id: CategoryId = row.get("id")?;
    let level_value: i64 = row.get("level")?;
    let level = CategoryLevel::from_depth(level_value).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid level `{level_value}` in categories.level for id {id}"
        ))
    })?;

    let category = Category {
        id,
        title: row.get("title")?,
        image: row.get("image")?,
        parent_id: row.get("parent_id")?,
        level,
        is_active: int_to_bool(row.get("is_active")?, "categories.is_active")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    category.validate()?;
    Ok(category)
}
