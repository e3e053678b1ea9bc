//! User repository contracts and SQLite implementation.

use super::schema::{ensure_connection_ready, TableSpec};
use super::{contains_ignore_case, RepoError, RepoResult};
use crate::db::UnitOfWork;
use crate::model::user::{NewUser, User, UserId, UserRole};
use rusqlite::{params, Connection, OptionalExtension, Row};

const USER_SELECT_SQL: &str = "SELECT
    id,
    kiu_id,
    name,
    whatsapp_number,
    role,
    created_at
FROM users";

const USER_TABLES: &[TableSpec] = &[(
    "users",
    &[
        "id",
        "kiu_id",
        "name",
        "whatsapp_number",
        "role",
        "created_at",
    ],
)];

pub trait UserRepository {
    /// Inserts one user; fails with `Conflict` when the KIU id is taken.
    fn create_user(&self, uow: &UnitOfWork<'_>, input: &NewUser) -> RepoResult<User>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    fn find_by_kiu_id(&self, kiu_id: &str) -> RepoResult<Option<User>>;
    /// Lists users, optionally filtered by a name/KIU id substring.
    fn list_users(&self, search: Option<&str>) -> RepoResult<Vec<User>>;
    fn delete_user(&self, id: UserId) -> RepoResult<()>;
}

pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, USER_TABLES)?;
        Ok(Self { conn })
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, uow: &UnitOfWork<'_>, input: &NewUser) -> RepoResult<User> {
        let input = input.normalized()?;
        let conn = uow.conn();
        let taken: i64 = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE kiu_id = ?1);",
            [input.kiu_id.as_str()],
            |row| row.get(0),
        )?;
        if taken == 1 {
            return Err(RepoError::Conflict(format!(
                "kiu id `{}` is already registered",
                input.kiu_id
            )));
        }

        conn.execute(
            "INSERT INTO users (kiu_id, name, whatsapp_number, role)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                input.kiu_id.as_str(),
                input.name.as_str(),
                input.whatsapp_number.as_deref(),
                input.role.as_str(),
            ],
        )?;
        let id = conn.last_insert_rowid();
        load_user(conn, id)?.ok_or_else(|| RepoError::not_found("user", id))
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        load_user(self.conn, id)
    }

    fn find_by_kiu_id(&self, kiu_id: &str) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE kiu_id = ?1;"))?;
        stmt.query_row([kiu_id.trim()], |row| Ok(parse_user_row(row)))
            .optional()?
            .transpose()
    }

    fn list_users(&self, search: Option<&str>) -> RepoResult<Vec<User>> {
        let needle = search.map(str::trim).filter(|value| !value.is_empty());
        let mut stmt = self.conn.prepare(&format!(
            "{USER_SELECT_SQL}
             ORDER BY created_at DESC, id DESC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            let user = parse_user_row(row)?;
            if let Some(needle) = needle {
                if !contains_ignore_case(&user.name, needle) && !user.kiu_id.contains(needle) {
                    continue;
                }
            }
            items.push(user);
        }
        Ok(items)
    }

    fn delete_user(&self, id: UserId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM users WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::not_found("user", id));
        }
        Ok(())
    }
}

fn load_user(conn: &Connection, id: UserId) -> RepoResult<Option<User>> {
    let mut stmt = conn.prepare(&format!("{USER_SELECT_SQL} WHERE id = ?1;"))?;
    stmt.query_row([id], |row| Ok(parse_user_row(row)))
        .optional()?
        .transpose()
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let role_text: String = row.get("role")?;
    let role = UserRole::parse(&role_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid role `{role_text}` in users.role"))
    })?;

    Ok(User {
        id: row.get("id")?,
        kiu_id: row.get("kiu_id")?,
        name: row.get("name")?,
        whatsapp_number: row.get("whatsapp_number")?,
        role,
        created_at: row.get("created_at")?,
    })
}
