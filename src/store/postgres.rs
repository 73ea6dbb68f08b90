//! PostgreSQL family store for production use.
//!
//! ## Configuration
//!
//! All settings can be configured via environment variables:
//! - `DATABASE_URL`: PostgreSQL connection string (required)
//! - `DB_MAX_CONNECTIONS`: Maximum pool size (default: 10)
//! - `DB_MIN_CONNECTIONS`: Minimum idle connections (default: 2)
//! - `DB_CONNECT_TIMEOUT_SECS`: Connection timeout (default: 10)
//! - `DB_IDLE_TIMEOUT_SECS`: Idle connection timeout (default: 300)
//! - `DB_MAX_LIFETIME_SECS`: Max connection lifetime (default: 1800)
//!
//! ## Versioning
//!
//! Writers own the tables and bump `family_graph_version.version` in the same
//! transaction as any edge change. The store reads the counter and every
//! table under one `REPEATABLE READ` transaction, so a snapshot never mixes
//! two versions, and rebuilds only when the counter moves.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use uuid::Uuid;

use crate::types::{GraphVersion, KinshipError, ParentEdge, ParentKind, PartnershipEdge, PartnershipKind, PersonId};
use super::snapshot::{FamilyRecords, FamilySnapshot};
use super::{FamilyGraph, FamilyStore};

/// DDL for the tables this store reads.
pub const FAMILY_TABLE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS family_people (
    id UUID PRIMARY KEY
);
CREATE TABLE IF NOT EXISTS family_parent_edges (
    child_id UUID NOT NULL REFERENCES family_people(id) ON DELETE CASCADE,
    parent_id UUID NOT NULL REFERENCES family_people(id) ON DELETE CASCADE,
    kind TEXT NOT NULL DEFAULT 'biological',
    parent_set INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (child_id, parent_id)
);
CREATE TABLE IF NOT EXISTS family_partnerships (
    person_a UUID NOT NULL REFERENCES family_people(id) ON DELETE CASCADE,
    person_b UUID NOT NULL REFERENCES family_people(id) ON DELETE CASCADE,
    kind TEXT NOT NULL DEFAULT 'marriage',
    ordinal INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (person_a, person_b, ordinal)
);
CREATE TABLE IF NOT EXISTS family_graph_version (
    id BOOLEAN PRIMARY KEY DEFAULT TRUE CHECK (id),
    version BIGINT NOT NULL DEFAULT 0
);
INSERT INTO family_graph_version (id, version) VALUES (TRUE, 0) ON CONFLICT DO NOTHING;
"#;

/// Configuration for PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL.
    pub database_url: String,
    /// Maximum connections in pool (default: 10).
    pub max_connections: u32,
    /// Minimum idle connections to keep warm (default: 2).
    pub min_connections: u32,
    /// Connection acquire timeout in seconds (default: 10).
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds (default: 300 = 5 min).
    pub idle_timeout_secs: u64,
    /// Maximum connection lifetime in seconds (default: 1800 = 30 min).
    pub max_lifetime_secs: u64,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl PostgresConfig {
    /// Load configuration from environment variables with production defaults.
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/family".to_string()),
            max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            min_connections: env_or("DB_MIN_CONNECTIONS", 2),
            connect_timeout_secs: env_or("DB_CONNECT_TIMEOUT_SECS", 10),
            idle_timeout_secs: env_or("DB_IDLE_TIMEOUT_SECS", 300),
            max_lifetime_secs: env_or("DB_MAX_LIFETIME_SECS", 1800),
        }
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Error type for PostgreSQL store.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    /// A row holds a kind string this crate does not know.
    #[error("Unknown {column} value: {value}")]
    UnknownKind {
        /// Column the value came from.
        column: &'static str,
        /// Offending value.
        value: String,
    },
    /// The stored graph violates an invariant.
    #[error("Invalid family graph: {0}")]
    Graph(#[from] KinshipError),
}

/// Pool statistics for monitoring.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PoolStats {
    /// Current pool size.
    pub size: u32,
    /// Number of idle connections.
    pub idle: usize,
    /// Maximum pool size.
    pub max: u32,
}

/// PostgreSQL family store.
pub struct PostgresFamilyStore {
    pool: PgPool,
    memo: Mutex<Option<Arc<FamilySnapshot>>>,
}

impl PostgresFamilyStore {
    /// Create a new store with the given configuration.
    pub async fn new(config: PostgresConfig) -> Result<Self, sqlx::Error> {
        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            connect_timeout_secs = config.connect_timeout_secs,
            idle_timeout_secs = config.idle_timeout_secs,
            max_lifetime_secs = config.max_lifetime_secs,
            "Initializing PostgreSQL connection pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .test_before_acquire(true)
            .connect(&config.database_url)
            .await?;

        Ok(Self::with_pool(pool))
    }

    /// Wrap an existing pool.
    pub fn with_pool(pool: PgPool) -> Self {
        Self {
            pool,
            memo: Mutex::new(None),
        }
    }

    /// Create a store from environment variables.
    pub async fn from_env() -> Result<Self, sqlx::Error> {
        Self::new(PostgresConfig::from_env()).await
    }

    /// Create the family tables if they do not exist.
    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        for statement in FAMILY_TABLE_SCHEMA
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Get the connection pool for health checks.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check if the database is reachable.
    pub async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }

    /// Get pool statistics for monitoring.
    pub fn pool_stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
            max: self.pool.options().get_max_connections(),
        }
    }

    fn memoized(&self, version: GraphVersion) -> Option<Arc<FamilySnapshot>> {
        self.memo
            .lock()
            .as_ref()
            .filter(|s| s.version() == version)
            .cloned()
    }

    async fn load(&self) -> Result<Arc<FamilySnapshot>, PostgresError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await?;

        let version = read_version(&mut tx).await?;
        if let Some(snapshot) = self.memoized(version) {
            tx.commit().await?;
            return Ok(snapshot);
        }

        let mut records = FamilyRecords::new();

        let rows = sqlx::query("SELECT id FROM family_people ORDER BY id")
            .fetch_all(&mut *tx)
            .await?;
        for row in &rows {
            let id: Uuid = row.try_get("id")?;
            records.people.insert(PersonId::new(id));
        }

        let rows = sqlx::query(
            r#"
            SELECT child_id, parent_id, kind, parent_set
            FROM family_parent_edges
            ORDER BY child_id, parent_id
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;
        for row in &rows {
            records.parent_edges.insert(parse_parent_row(row)?);
        }

        let rows = sqlx::query(
            r#"
            SELECT person_a, person_b, kind, ordinal
            FROM family_partnerships
            ORDER BY person_a, person_b, ordinal
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;
        for row in &rows {
            records.partnerships.insert(parse_partnership_row(row)?);
        }

        tx.commit().await?;

        let snapshot = Arc::new(FamilySnapshot::build(&records, version)?);
        tracing::info!(
            version = %version,
            people = snapshot.person_count(),
            edges = snapshot.edge_count(),
            fingerprint = snapshot.fingerprint(),
            "Loaded family graph snapshot"
        );

        *self.memo.lock() = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }
}

async fn read_version(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
) -> Result<GraphVersion, sqlx::Error> {
    let row = sqlx::query("SELECT version FROM family_graph_version WHERE id")
        .fetch_optional(&mut **tx)
        .await?;
    let raw: i64 = match row {
        Some(r) => r.try_get("version")?,
        None => 0,
    };
    Ok(GraphVersion::new(raw.max(0) as u64))
}

fn parse_parent_row(row: &sqlx::postgres::PgRow) -> Result<ParentEdge, PostgresError> {
    let child: Uuid = row.try_get("child_id")?;
    let parent: Uuid = row.try_get("parent_id")?;
    let kind: String = row.try_get("kind")?;
    let parent_set: i32 = row.try_get("parent_set")?;

    let kind = ParentKind::from_str(&kind).ok_or(PostgresError::UnknownKind {
        column: "family_parent_edges.kind",
        value: kind.clone(),
    })?;

    Ok(ParentEdge::new(
        PersonId::new(child),
        PersonId::new(parent),
        kind,
        parent_set.max(0) as u32,
    ))
}

fn parse_partnership_row(row: &sqlx::postgres::PgRow) -> Result<PartnershipEdge, PostgresError> {
    let a: Uuid = row.try_get("person_a")?;
    let b: Uuid = row.try_get("person_b")?;
    let kind: String = row.try_get("kind")?;
    let ordinal: i32 = row.try_get("ordinal")?;

    let kind = PartnershipKind::from_str(&kind).ok_or(PostgresError::UnknownKind {
        column: "family_partnerships.kind",
        value: kind.clone(),
    })?;

    Ok(PartnershipEdge::new(
        PersonId::new(a),
        PersonId::new(b),
        kind,
        ordinal.max(0) as u32,
    ))
}

#[async_trait]
impl FamilyStore for PostgresFamilyStore {
    type Error = PostgresError;
    type Graph = FamilySnapshot;

    async fn current_version(&self) -> Result<GraphVersion, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let version = read_version(&mut tx).await?;
        tx.commit().await?;
        Ok(version)
    }

    async fn snapshot(&self) -> Result<Arc<FamilySnapshot>, Self::Error> {
        self.load().await
    }
}
