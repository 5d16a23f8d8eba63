//! User repository
//!
//! - `UserRepository`: data access interface injected into services
//! - `SqlxUserRepository`: SQLite and MySQL implementation

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Role, User};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user, returning it with its assigned id
    async fn create(&self, user: &User) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Lookup by (already normalised) email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn count(&self) -> Result<i64>;

    /// Page through users, newest first. Returns the page and the total.
    async fn list(&self, page: i64, per_page: i64) -> Result<(Vec<User>, i64)>;
}

/// SQLx-based user repository
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a shared repository for dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }

    fn sqlite(&self) -> Result<&SqlitePool> {
        self.pool.as_sqlite().context("SQLite pool unavailable")
    }

    fn mysql(&self) -> Result<&MySqlPool> {
        self.pool.as_mysql().context("MySQL pool unavailable")
    }
}

const SELECT_USER: &str =
    "SELECT id, name, email, password_hash, role, created_at, updated_at FROM users";

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        let insert = r#"
            INSERT INTO users (name, email, password_hash, role, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
        "#;

        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let result = sqlx::query(insert)
                    .bind(&user.name)
                    .bind(&user.email)
                    .bind(&user.password_hash)
                    .bind(user.role.as_str())
                    .bind(user.created_at)
                    .bind(user.updated_at)
                    .execute(self.sqlite()?)
                    .await
                    .context("Failed to create user")?;
                result.last_insert_rowid()
            }
            DatabaseDriver::Mysql => {
                let result = sqlx::query(insert)
                    .bind(&user.name)
                    .bind(&user.email)
                    .bind(&user.password_hash)
                    .bind(user.role.as_str())
                    .bind(user.created_at)
                    .bind(user.updated_at)
                    .execute(self.mysql()?)
                    .await
                    .context("Failed to create user")?;
                result.last_insert_id() as i64
            }
        };

        let mut created = user.clone();
        created.id = id;
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("{} WHERE id = ?", SELECT_USER);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(self.sqlite()?)
                .await
                .context("Failed to get user by ID")?
                .map(|row| row_to_user_sqlite(&row))
                .transpose(),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(self.mysql()?)
                .await
                .context("Failed to get user by ID")?
                .map(|row| row_to_user_mysql(&row))
                .transpose(),
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("{} WHERE email = ?", SELECT_USER);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(email)
                .fetch_optional(self.sqlite()?)
                .await
                .context("Failed to get user by email")?
                .map(|row| row_to_user_sqlite(&row))
                .transpose(),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .bind(email)
                .fetch_optional(self.mysql()?)
                .await
                .context("Failed to get user by email")?
                .map(|row| row_to_user_mysql(&row))
                .transpose(),
        }
    }

    async fn count(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM users";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar(sql)
                .fetch_one(self.sqlite()?)
                .await
                .context("Failed to count users")?,
            DatabaseDriver::Mysql => sqlx::query_scalar(sql)
                .fetch_one(self.mysql()?)
                .await
                .context("Failed to count users")?,
        };
        Ok(count)
    }

    async fn list(&self, page: i64, per_page: i64) -> Result<(Vec<User>, i64)> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, 100);
        let offset = (page - 1).saturating_mul(per_page);
        let sql = format!("{} ORDER BY id DESC LIMIT ? OFFSET ?", SELECT_USER);

        let users = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(per_page)
                .bind(offset)
                .fetch_all(self.sqlite()?)
                .await
                .context("Failed to list users")?
                .iter()
                .map(row_to_user_sqlite)
                .collect::<Result<Vec<_>>>()?,
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .bind(per_page)
                .bind(offset)
                .fetch_all(self.mysql()?)
                .await
                .context("Failed to list users")?
                .iter()
                .map(row_to_user_mysql)
                .collect::<Result<Vec<_>>>()?,
        };

        let total = self.count().await?;
        Ok((users, total))
    }
}

fn parse_role(raw: &str) -> Result<Role> {
    Role::from_str(raw).with_context(|| format!("Invalid role in database: {}", raw))
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role: parse_role(&role)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> Result<User> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role: parse_role(&role)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
