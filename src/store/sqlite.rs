use super::CredentialStore;
use crate::error::{AppError, AppResult};
use crate::model::{CredentialRecord, Identity, InsertOutcome, Secret};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use sqlx::{FromRow, Pool, Sqlite};
use tracing::{debug, info};

pub type DbPool = Pool<Sqlite>;

#[derive(Debug, FromRow)]
struct CredentialRow {
    identity: String,
    secret: String,
}

impl From<CredentialRow> for CredentialRecord {
    fn from(row: CredentialRow) -> Self {
        CredentialRecord::new(Identity::new(row.identity), Secret::new(row.secret))
    }
}

/// Credential store backed by SQLite. The autoincrement id keeps
/// insertion order; the unique identity column enforces write-once.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Connect and run migrations
    pub async fn connect(url: &str, max_connections: u32) -> AppResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        init_db(&pool).await?;
        Ok(Self::new(pool))
    }

    /// Open an existing database without creating it or touching the schema.
    /// Any `mode=` in the URL is overridden.
    pub async fn connect_read_only(url: &str) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .read_only(true)
            .create_if_missing(false);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl CredentialStore for SqliteStore {
    async fn get(&self, identity: &Identity) -> AppResult<Option<Secret>> {
        let secret = sqlx::query_scalar::<_, String>(
            "SELECT secret FROM credentials WHERE identity = ?",
        )
        .bind(identity.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(secret.map(Secret::new))
    }

    async fn put_if_absent(&self, identity: &Identity, secret: Secret) -> AppResult<InsertOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO credentials (identity, secret)
            VALUES (?, ?)
            ON CONFLICT(identity) DO NOTHING
            "#,
        )
        .bind(identity.as_str())
        .bind(secret.expose())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::store_unavailable(e.to_string()))?;

        if result.rows_affected() == 1 {
            return Ok(InsertOutcome::Inserted);
        }

        debug!("Identity {} already holds a secret, not overwriting", identity);
        let existing = self
            .get(identity)
            .await
            .map_err(|e| AppError::store_unavailable(e.to_string()))?
            .ok_or_else(|| AppError::internal("conflicting credential row vanished"))?;
        Ok(InsertOutcome::AlreadyPresent(existing))
    }

    async fn snapshot(&self) -> AppResult<Vec<CredentialRecord>> {
        let rows = sqlx::query_as::<_, CredentialRow>(
            "SELECT identity, secret FROM credentials ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
pub async fn setup_test_db() -> DbPool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    init_db(&pool).await.expect("Failed to init database");
    pool
}

/// Initialize database with migrations
pub async fn init_db(pool: &DbPool) -> AppResult<()> {
    info!("Running database migrations");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS credentials (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            identity TEXT UNIQUE NOT NULL,
            secret TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
