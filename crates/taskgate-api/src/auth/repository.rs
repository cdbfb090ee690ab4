//! Identity storage
//!
//! [`UserStore`] is the persistence seam for onboarding. Two implementations
//! ship with the service:
//! - [`InMemoryUserStore`]: process-local, used when no database is configured
//! - [`PgUserStore`]: PostgreSQL via sqlx
//!
//! Username uniqueness and the bootstrap role are decided by the store
//! itself, so concurrent registrations can neither share a name nor both
//! become the first, privileged identity.

use super::models::{Identity, Role};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Username already exists")]
    Duplicate,

    #[error("Record not found")]
    NotFound,

    #[error("Stored record is invalid: {0}")]
    Corrupt(String),
}

/// Persistence operations required by onboarding and the HTTP layer
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, StoreError>;

    /// Total number of stored identities
    async fn count(&self) -> Result<u64, StoreError>;

    /// Persist a new identity and return it as stored
    ///
    /// The stored role is `Privileged` when the store holds no identity yet and
    /// `Standard` otherwise, whatever role `identity` carries. The emptiness
    /// check and the write are atomic. Fails with `Duplicate` when the username
    /// is already taken.
    async fn enroll(&self, identity: Identity) -> Result<Identity, StoreError>;

    /// Replace the role of an existing identity
    ///
    /// Fails with `NotFound` when no identity has this id.
    async fn update_role(&self, id: Uuid, role: Role, at: DateTime<Utc>)
        -> Result<(), StoreError>;

    /// All identities, oldest first
    async fn list(&self) -> Result<Vec<Identity>, StoreError>;
}

/// Run a store call, failing with `Timeout` when it does not finish within `limit`
///
/// Nothing is assumed committed after a timeout.
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(timeout = ?limit, "Store call timed out");
            Err(StoreError::Timeout(limit))
        }
    }
}

fn bootstrap_role(store_is_empty: bool) -> Role {
    if store_is_empty {
        Role::Privileged
    } else {
        Role::Standard
    }
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Default)]
struct Tables {
    by_id: HashMap<Uuid, Identity>,
    by_username: HashMap<String, Uuid>,
}

/// Process-local store backed by two hash maps under one lock
#[derive(Default)]
pub struct InMemoryUserStore {
    tables: RwLock<Tables>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_username
            .get(username)
            .and_then(|id| tables.by_id.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, StoreError> {
        Ok(self.tables.read().await.by_id.get(&id).cloned())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.tables.read().await.by_id.len() as u64)
    }

    async fn enroll(&self, mut identity: Identity) -> Result<Identity, StoreError> {
        // Check and insert under the same write guard
        let mut tables = self.tables.write().await;
        if tables.by_username.contains_key(&identity.username) {
            return Err(StoreError::Duplicate);
        }

        identity.role = bootstrap_role(tables.by_id.is_empty());

        tables
            .by_username
            .insert(identity.username.clone(), identity.id);
        tables.by_id.insert(identity.id, identity.clone());
        Ok(identity)
    }

    async fn update_role(
        &self,
        id: Uuid,
        role: Role,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let identity = tables.by_id.get_mut(&id).ok_or(StoreError::NotFound)?;
        identity.role = role;
        identity.updated_at = at;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Identity>, StoreError> {
        let mut identities: Vec<Identity> =
            self.tables.read().await.by_id.values().cloned().collect();
        identities.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.username.cmp(&b.username))
        });
        Ok(identities)
    }
}

// ============================================================================
// PostgreSQL store
// ============================================================================

const CREATE_IDENTITIES_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS identities (
        id UUID PRIMARY KEY,
        username TEXT NOT NULL,
        secret_digest TEXT NOT NULL,
        role TEXT NOT NULL CHECK (role IN ('standard', 'privileged')),
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        CONSTRAINT identities_username_key UNIQUE (username)
    )
"#;

/// Row as stored in the `identities` table
#[derive(Debug, sqlx::FromRow)]
struct IdentityRecord {
    id: Uuid,
    username: String,
    secret_digest: String,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<IdentityRecord> for Identity {
    type Error = StoreError;

    fn try_from(record: IdentityRecord) -> Result<Self, Self::Error> {
        let role = record
            .role
            .parse::<Role>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        Ok(Identity {
            id: record.id,
            username: record.username,
            secret_digest: record.secret_digest,
            role,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

pub(crate) fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate,
        sqlx::Error::PoolTimedOut => StoreError::Unavailable("connection pool timed out".into()),
        other => StoreError::Unavailable(other.to_string()),
    }
}

/// Open a PostgreSQL pool with at most `max_connections` connections
///
/// The pool is shared by every PostgreSQL-backed store.
pub async fn connect_pool(
    url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<PgPool, StoreError> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect(url)
        .await
        .map_err(map_sqlx_error)
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    /// Wrap an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `identities` table if it does not exist yet
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_IDENTITIES_TABLE)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, StoreError> {
        let record = sqlx::query_as::<_, IdentityRecord>(
            r#"
            SELECT id, username, secret_digest, role, created_at, updated_at
            FROM identities
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        record.map(Identity::try_from).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, StoreError> {
        let record = sqlx::query_as::<_, IdentityRecord>(
            r#"
            SELECT id, username, secret_digest, role, created_at, updated_at
            FROM identities
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        record.map(Identity::try_from).transpose()
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM identities")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(count.max(0) as u64)
    }

    async fn enroll(&self, mut identity: Identity) -> Result<Identity, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        // Serializes concurrent enrollments so only one can see an empty table
        sqlx::query("LOCK TABLE identities IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM identities)")
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        identity.role = bootstrap_role(!exists);

        sqlx::query(
            r#"
            INSERT INTO identities (id, username, secret_digest, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(identity.id)
        .bind(&identity.username)
        .bind(&identity.secret_digest)
        .bind(identity.role.as_str())
        .bind(identity.created_at)
        .bind(identity.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(identity)
    }

    async fn update_role(
        &self,
        id: Uuid,
        role: Role,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE identities SET role = $1, updated_at = $2 WHERE id = $3")
            .bind(role.as_str())
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Identity>, StoreError> {
        let records = sqlx::query_as::<_, IdentityRecord>(
            r#"
            SELECT id, username, secret_digest, role, created_at, updated_at
            FROM identities
            ORDER BY created_at ASC, username ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        records.into_iter().map(Identity::try_from).collect()
    }
}
