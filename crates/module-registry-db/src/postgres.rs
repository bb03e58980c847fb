//! PostgreSQL implementation of VersionRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use module_registry_core::{ModuleCoordinate, Version, VersionRecord};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};

use crate::error::{DbError, DbResult};
use crate::repository::VersionRepository;

/// PostgreSQL implementation of VersionRepository
#[derive(Debug, Clone)]
pub struct PostgresVersionRepository {
    pool: PgPool,
}

impl PostgresVersionRepository {
    /// Create a new PostgreSQL version repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl VersionRepository for PostgresVersionRepository {
    #[instrument(skip(self, record), fields(module = %record.coordinate, version = %record.version))]
    async fn put(&self, record: VersionRecord) -> DbResult<VersionRecord> {
        debug!("Upserting version record");

        let row = sqlx::query(
            r#"
            INSERT INTO module_versions (
                module_id, version, organization, repository, provider,
                artifact_location, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            ON CONFLICT (module_id, version) DO UPDATE
                SET artifact_location = EXCLUDED.artifact_location,
                    updated_at = EXCLUDED.updated_at
            RETURNING organization, repository, provider, version, artifact_location, created_at
            "#,
        )
        .bind(record.coordinate.id())
        .bind(record.version.as_str())
        .bind(&record.coordinate.organization)
        .bind(&record.coordinate.repository)
        .bind(&record.coordinate.provider)
        .bind(&record.artifact_location)
        .bind(record.created_at)
        .fetch_one(&self.pool)
        .await?;

        row_to_record(row)
    }

    #[instrument(skip(self), fields(module = %coordinate))]
    async fn list_versions(&self, coordinate: &ModuleCoordinate) -> DbResult<Vec<VersionRecord>> {
        debug!("Listing module versions");

        let rows = sqlx::query(
            r#"
            SELECT organization, repository, provider, version, artifact_location, created_at
            FROM module_versions
            WHERE module_id = $1
            ORDER BY version COLLATE "C" DESC
            "#,
        )
        .bind(coordinate.id())
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Err(DbError::NotFound(format!("module {}", coordinate)));
        }

        rows.into_iter().map(row_to_record).collect()
    }

    #[instrument(skip(self), fields(module = %coordinate, version = %version))]
    async fn get(
        &self,
        coordinate: &ModuleCoordinate,
        version: &Version,
    ) -> DbResult<VersionRecord> {
        let row = sqlx::query(
            r#"
            SELECT organization, repository, provider, version, artifact_location, created_at
            FROM module_versions
            WHERE module_id = $1 AND version = $2
            "#,
        )
        .bind(coordinate.id())
        .bind(version.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_record(row),
            None => Err(DbError::NotFound(format!(
                "module {} version {}",
                coordinate, version
            ))),
        }
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> DbResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(Into::into)
    }
}

/// Convert a database row to a VersionRecord
fn row_to_record(row: PgRow) -> DbResult<VersionRecord> {
    let organization: String = row.try_get("organization")?;
    let repository: String = row.try_get("repository")?;
    let provider: String = row.try_get("provider")?;
    let coordinate = ModuleCoordinate::new(organization, repository, provider)
        .map_err(|e| DbError::InvalidData(format!("Invalid stored coordinate: {}", e)))?;

    let version: String = row.try_get("version")?;
    let artifact_location: String = row.try_get("artifact_location")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;

    Ok(VersionRecord {
        coordinate,
        version: Version::new(version),
        artifact_location,
        created_at,
    })
}
