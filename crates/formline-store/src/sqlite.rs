//! Durable SQLite backend for forms and users.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

use formline_session::FormIndex;
use formline_types::{Form, FormState, FormView, User};

use crate::repo::{
    ExternalProvider, FormQuery, FormsRepository, UserStore, project_views, suffixed_username,
};
use crate::{Result, StoreError};

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// SQLite-backed store for forms and users.
///
/// Thread-safe via internal `Mutex<Connection>`; statements are short-lived
/// and the lock is never held across an await point.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    index: FormIndex,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and run pending migrations.
    pub fn open(path: &Path, index: FormIndex) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        info!(path = %path.display(), "opened forms database");

        let mut store = Self {
            conn: Mutex::new(conn),
            index,
        };
        store.run_migrations()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory(index: FormIndex) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        let mut store = Self {
            conn: Mutex::new(conn),
            index,
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&mut self) -> Result<()> {
        let conn = self.conn.get_mut();
        embedded::migrations::runner()
            .run(conn)
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    fn fetch_form(conn: &Connection, id: i64) -> Result<Form> {
        conn.query_row(
            "SELECT id, description, category, urgency, state, created_at, user_id
             FROM forms WHERE id = ?1",
            params![id],
            row_to_form,
        )
        .optional()?
        .ok_or(StoreError::FormNotFound(id))
    }

    fn find_by_external(
        conn: &Connection,
        provider: ExternalProvider,
        external_id: &str,
    ) -> Result<Option<User>> {
        let sql = format!(
            "SELECT id, username, password_hash, role, github_id, google_id, email, created_at
             FROM users WHERE {} = ?1",
            provider.column()
        );
        Ok(conn
            .query_row(&sql, params![external_id], row_to_user)
            .optional()?)
    }
}

#[async_trait]
impl FormsRepository for SqliteStore {
    async fn save(&self, mut form: Form, session_id: Option<&str>) -> Result<Form> {
        {
            let conn = self.conn();
            conn.execute(
                "INSERT INTO forms (description, category, urgency, state, created_at, user_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    form.description,
                    form.category.as_str(),
                    form.urgency.as_str(),
                    form.state.as_str(),
                    form.created_at.to_rfc3339(),
                    form.user_id,
                ],
            )?;
            form.id = conn.last_insert_rowid();
        }

        if let Some(session_id) = session_id {
            self.index.append(session_id, form.id).await?;
        }
        Ok(form)
    }

    async fn get_by_id(&self, id: i64) -> Result<Form> {
        Self::fetch_form(&self.conn(), id)
    }

    async fn get_by_ids(&self, ids: &[i64]) -> Result<Vec<Form>> {
        let conn = self.conn();
        let mut forms = Vec::with_capacity(ids.len());
        for &id in ids {
            match Self::fetch_form(&conn, id) {
                Ok(form) => forms.push(form),
                Err(StoreError::FormNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(forms)
    }

    async fn query(&self, query: &FormQuery) -> Result<Vec<FormView>> {
        // Everything touching the connection (and the non-Send parameter
        // boxes) stays inside this block; only plain forms cross the await.
        let forms = {
            let mut sql = String::from(
                "SELECT id, description, category, urgency, state, created_at, user_id FROM forms",
            );
            let mut clauses = Vec::new();
            let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

            if let Some(state) = query.state {
                values.push(Box::new(state.as_str()));
                clauses.push(format!("state = ?{}", values.len()));
            }
            if let Some(category) = query.category {
                values.push(Box::new(category.as_str()));
                clauses.push(format!("category = ?{}", values.len()));
            }
            if let Some(urgency) = query.urgency {
                values.push(Box::new(urgency.as_str()));
                clauses.push(format!("urgency = ?{}", values.len()));
            }
            if let Some(keyword) = &query.keyword {
                values.push(Box::new(like_pattern(keyword)));
                clauses.push(format!(
                    "LOWER(description) LIKE ?{} ESCAPE '\\'",
                    values.len()
                ));
            }
            if !clauses.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&clauses.join(" AND "));
            }
            sql.push_str(&format!(
                " ORDER BY created_at DESC, id DESC LIMIT {} OFFSET {}",
                query.page_size,
                query.offset()
            ));

            let conn = self.conn();
            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> =
                values.iter().map(|v| v.as_ref()).collect();
            let iter = stmt.query_map(params.as_slice(), row_to_form)?;

            let mut forms = Vec::new();
            for form in iter {
                forms.push(form?);
            }
            forms
        };

        self.to_views(&forms).await
    }

    async fn to_views(&self, forms: &[Form]) -> Result<Vec<FormView>> {
        project_views(forms, self).await
    }

    async fn update_state(&self, id: i64, state: FormState) -> Result<Form> {
        let conn = self.conn();
        let updated = conn.execute(
            "UPDATE forms SET state = ?1 WHERE id = ?2",
            params![state.as_str(), id],
        )?;
        if updated == 0 {
            return Err(StoreError::FormNotFound(id));
        }
        Self::fetch_form(&conn, id)
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn get_by_id(&self, id: i64) -> Result<User> {
        self.conn()
            .query_row(
                "SELECT id, username, password_hash, role, github_id, google_id, email, created_at
                 FROM users WHERE id = ?1",
                params![id],
                row_to_user,
            )
            .optional()?
            .ok_or(StoreError::UserNotFound(id))
    }

    async fn get_by_ids(&self, ids: &[i64]) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut users = Vec::with_capacity(ids.len());
        for &id in ids {
            let user = conn
                .query_row(
                    "SELECT id, username, password_hash, role, github_id, google_id, email, created_at
                     FROM users WHERE id = ?1",
                    params![id],
                    row_to_user,
                )
                .optional()?;
            if let Some(user) = user {
                users.push(user);
            }
        }
        Ok(users)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT id, username, password_hash, role, github_id, google_id, email, created_at
                 FROM users WHERE username = ?1",
                params![username],
                row_to_user,
            )
            .optional()?)
    }

    async fn username_exists(&self, username: &str) -> Result<bool> {
        Ok(self.conn().query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
            params![username],
            |row| row.get(0),
        )?)
    }

    async fn create_local(&self, username: &str, password_hash: &str) -> Result<User> {
        let mut user = User::new(username, Some(password_hash.to_string()));
        let conn = self.conn();
        conn.execute(
            "INSERT INTO users (username, password_hash, role, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                user.username,
                user.password_hash,
                user.role.as_str(),
                user.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateUsername(username.to_string())
            } else {
                e.into()
            }
        })?;
        user.id = conn.last_insert_rowid();
        Ok(user)
    }

    async fn get_or_create_external(
        &self,
        provider: ExternalProvider,
        external_id: &str,
        username: &str,
        email: Option<&str>,
    ) -> Result<User> {
        let conn = self.conn();

        if let Some(user) = Self::find_by_external(&conn, provider, external_id)? {
            return Ok(user);
        }

        let taken: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
            params![username],
            |row| row.get(0),
        )?;
        let name = if taken {
            suffixed_username(username, external_id)
        } else {
            username.to_string()
        };

        let mut user = User::new(name, None);
        user.email = email.map(String::from);
        match provider {
            ExternalProvider::GitHub => user.github_id = Some(external_id.to_string()),
            ExternalProvider::Google => user.google_id = Some(external_id.to_string()),
        }

        conn.execute(
            "INSERT INTO users (username, role, github_id, google_id, email, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user.username,
                user.role.as_str(),
                user.github_id,
                user.google_id,
                user.email,
                user.created_at.to_rfc3339(),
            ],
        )?;
        user.id = conn.last_insert_rowid();
        info!(user_id = user.id, provider = %provider, "created user from external identity");
        Ok(user)
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a case-folded `LIKE` pattern matching `keyword` literally.
///
/// `%`, `_` and the escape character itself are escaped so a keyword like
/// `"50%"` matches the text `50%` and nothing else, same as the in-memory
/// backend's substring check.
fn like_pattern(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len() + 2);
    for ch in keyword.to_lowercase().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    format!("%{escaped}%")
}

fn parse_dt(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_form(row: &rusqlite::Row<'_>) -> rusqlite::Result<Form> {
    Ok(Form {
        id: row.get(0)?,
        description: row.get(1)?,
        category: row.get::<_, String>(2)?.parse().unwrap_or_default(),
        urgency: row.get::<_, String>(3)?.parse().unwrap_or_default(),
        state: row.get::<_, String>(4)?.parse().unwrap_or_default(),
        created_at: parse_dt(&row.get::<_, String>(5)?),
        user_id: row.get(6)?,
    })
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        role: row.get::<_, String>(3)?.parse().unwrap_or_default(),
        github_id: row.get(4)?,
        google_id: row.get(5)?,
        email: row.get(6)?,
        created_at: parse_dt(&row.get::<_, String>(7)?),
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
