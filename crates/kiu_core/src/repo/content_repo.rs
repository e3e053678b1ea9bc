//! Content repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Listing order is `created_at DESC, id DESC`.
//! - Title search is a case-insensitive substring match, nothing more.
//! - Writes validate `NewContent` and require an existing category.

use super::schema::{bool_to_int, ensure_connection_ready, int_to_bool, TableSpec};
use super::{contains_ignore_case, RepoError, RepoResult};
use crate::model::category::CategoryId;
use crate::model::content::{Content, ContentId, ContentType, NewContent};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const CONTENT_SELECT_SQL: &str = "SELECT
    id,
    category_id,
    content_type,
    url,
    title,
    is_active,
    created_at
FROM contents";

const CONTENT_TABLES: &[TableSpec] = &[
    (
        "contents",
        &[
            "id",
            "category_id",
            "content_type",
            "url",
            "title",
            "is_active",
            "created_at",
        ],
    ),
    ("categories", &["id"]),
];

/// Filters for content listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentListQuery {
    pub category_id: Option<CategoryId>,
    pub content_type: Option<ContentType>,
    /// Case-insensitive title substring.
    pub title_contains: Option<String>,
    pub include_inactive: bool,
}

pub trait ContentRepository {
    fn create_content(&self, input: &NewContent) -> RepoResult<Content>;
    fn update_content(&self, id: ContentId, input: &NewContent) -> RepoResult<Content>;
    fn get_content(&self, id: ContentId) -> RepoResult<Option<Content>>;
    fn list_contents(&self, query: &ContentListQuery) -> RepoResult<Vec<Content>>;
    fn delete_content(&self, id: ContentId) -> RepoResult<()>;
    /// Number of active content rows owned by one category.
    fn count_active_in_category(&self, category_id: CategoryId) -> RepoResult<usize>;
}

/// SQLite-backed content repository.
pub struct SqliteContentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteContentRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, CONTENT_TABLES)?;
        Ok(Self { conn })
    }

    fn ensure_category_exists(&self, category_id: CategoryId) -> RepoResult<()> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM categories WHERE id = ?1);",
            [category_id],
            |row| row.get(0),
        )?;
        if exists == 1 {
            Ok(())
        } else {
            Err(RepoError::not_found("category", category_id))
        }
    }
}

impl ContentRepository for SqliteContentRepository<'_> {
    fn create_content(&self, input: &NewContent) -> RepoResult<Content> {
        input.validate()?;
        self.ensure_category_exists(input.category_id)?;

        self.conn.execute(
            "INSERT INTO contents (
                category_id,
                content_type,
                url,
                title,
                is_active
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                input.category_id,
                input.content_type.as_str(),
                input.url.trim(),
                input.title.trim(),
                bool_to_int(input.is_active),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_content(id)?
            .ok_or_else(|| RepoError::not_found("content", id))
    }

    fn update_content(&self, id: ContentId, input: &NewContent) -> RepoResult<Content> {
        input.validate()?;
        self.ensure_category_exists(input.category_id)?;

        let changed = self.conn.execute(
            "UPDATE contents
             SET category_id = ?2,
                 content_type = ?3,
                 url = ?4,
                 title = ?5,
                 is_active = ?6,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                id,
                input.category_id,
                input.content_type.as_str(),
                input.url.trim(),
                input.title.trim(),
                bool_to_int(input.is_active),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("content", id));
        }
        self.get_content(id)?
            .ok_or_else(|| RepoError::not_found("content", id))
    }

    fn get_content(&self, id: ContentId) -> RepoResult<Option<Content>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CONTENT_SELECT_SQL} WHERE id = ?1;"))?;
        stmt.query_row([id], |row| Ok(parse_content_row(row)))
            .optional()?
            .transpose()
    }

    fn list_contents(&self, query: &ContentListQuery) -> RepoResult<Vec<Content>> {
        let mut sql = format!("{CONTENT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if !query.include_inactive {
            sql.push_str(" AND is_active = 1");
        }
        if let Some(category_id) = query.category_id {
            sql.push_str(" AND category_id = ?");
            bind_values.push(Value::Integer(category_id));
        }
        if let Some(content_type) = query.content_type {
            sql.push_str(" AND content_type = ?");
            bind_values.push(Value::Text(content_type.as_str().to_string()));
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            let item = parse_content_row(row)?;
            if let Some(needle) = query.title_contains.as_deref() {
                if !contains_ignore_case(&item.title, needle) {
                    continue;
                }
            }
            items.push(item);
        }
        Ok(items)
    }

    fn delete_content(&self, id: ContentId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM contents WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::not_found("content", id));
        }
        Ok(())
    }

    fn count_active_in_category(&self, category_id: CategoryId) -> RepoResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*)
             FROM contents
             WHERE category_id = ?1
               AND is_active = 1;",
            [category_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

fn parse_content_row(row: &Row<'_>) -> RepoResult<Content> {
    let type_text: String = row.get("content_type")?;
    let content_type = ContentType::parse(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid content type `{type_text}` in contents.content_type"
        ))
    })?;

    Ok(Content {
        id: row.get("id")?,
        category_id: row.get("category_id")?,
        content_type,
        url: row.get("url")?,
        title: row.get("title")?,
        is_active: int_to_bool(row.get("is_active")?, "contents.is_active")?,
        created_at: row.get("created_at")?,
    })
}
