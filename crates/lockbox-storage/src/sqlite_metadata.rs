use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use lockbox_core::records::{FileRecord, MetadataError, MetadataStore};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use tracing::{debug, instrument};
use uuid::Uuid;

/// Internal row type for sqlx mapping.
#[derive(sqlx::FromRow)]
struct FileRecordRow {
    id: String,
    name: String,
    file_key: String,
    location: String,
    created_at: String,
}

impl TryFrom<FileRecordRow> for FileRecord {
    type Error = MetadataError;

    fn try_from(r: FileRecordRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&r.id).map_err(backend_err)?,
            name: r.name,
            key: r.file_key,
            location: r.location,
            created_at: DateTime::parse_from_rfc3339(&r.created_at)
                .map_err(backend_err)?
                .with_timezone(&Utc),
        })
    }
}

/// SQLite-backed metadata store. `name` carries a unique constraint.
#[derive(Debug, Clone)]
pub struct SqliteMetadataStore {
    pool: SqlitePool,
}

impl SqliteMetadataStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database at `url` and ensure the schema.
    pub async fn connect(url: &str) -> Result<Self, MetadataError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(backend_err)?
            .create_if_missing(true);

        // Every connection to `:memory:` is a separate database.
        let pool_options = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
        };
        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(backend_err)?;

        Self::init(&pool).await?;
        debug!(url, "metadata store ready");
        Ok(Self::new(pool))
    }

    /// Create the `file_records` table if it does not exist.
    pub async fn init(pool: &SqlitePool) -> Result<(), MetadataError> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS file_records (
                id         TEXT PRIMARY KEY,
                name       TEXT NOT NULL UNIQUE,
                file_key   TEXT NOT NULL,
                location   TEXT NOT NULL,
                created_at TEXT NOT NULL
            )"#,
        )
        .execute(pool)
        .await
        .map_err(backend_err)?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    #[instrument(skip_all, fields(name = %record.name))]
    async fn create(&self, record: &FileRecord) -> Result<(), MetadataError> {
        sqlx::query(
            r#"INSERT INTO file_records (id, name, file_key, location, created_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(record.id.to_string())
        .bind(&record.name)
        .bind(&record.key)
        .bind(&record.location)
        .bind(record.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true))
        .execute(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(db) if db.is_unique_violation() => MetadataError::Duplicate {
                name: record.name.clone(),
            },
            other => backend_err(other),
        })?;
        Ok(())
    }

    #[instrument(skip_all, fields(name = %name))]
    async fn find_by_name(&self, name: &str) -> Result<Option<FileRecord>, MetadataError> {
        let row = sqlx::query_as::<_, FileRecordRow>("SELECT * FROM file_records WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?;
        row.map(TryInto::try_into).transpose()
    }
}

fn backend_err<E: ToString>(err: E) -> MetadataError {
    MetadataError::Backend {
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn file_store(dir: &tempfile::TempDir) -> SqliteMetadataStore {
        let url = format!("sqlite://{}", dir.path().join("metadata.db").display());
        SqliteMetadataStore::connect(&url).await.expect("connect")
    }

    #[tokio::test]
    async fn create_and_find_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = file_store(&dir).await;
        let record = FileRecord::new(
            "test.txt".into(),
            "a2V5".into(),
            "encrypted_files/test.txt".into(),
        );

        store.create(&record).await.expect("create");
        let found = store
            .find_by_name("test.txt")
            .await
            .expect("find")
            .expect("present");
        assert_eq!(found, record);
    }

    #[tokio::test]
    async fn missing_name_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = file_store(&dir).await;
        assert!(store
            .find_by_name("nonexistent.txt")
            .await
            .expect("find")
            .is_none());
    }

    #[tokio::test]
    async fn duplicate_name_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = file_store(&dir).await;
        store
            .create(&FileRecord::new("a".into(), "k1".into(), "l1".into()))
            .await
            .expect("create");

        let err = store
            .create(&FileRecord::new("a".into(), "k2".into(), "l2".into()))
            .await
            .expect_err("duplicate");
        assert_eq!(err, MetadataError::Duplicate { name: "a".into() });
    }

    #[tokio::test]
    async fn records_survive_reconnect() {
        let dir = tempfile::tempdir().expect("tempdir");
        let record = FileRecord::new("kept.bin".into(), "k".into(), "l".into());
        {
            let store = file_store(&dir).await;
            store.create(&record).await.expect("create");
            store.pool().close().await;
        }
        let reopened = file_store(&dir).await;
        let found = reopened.find_by_name("kept.bin").await.expect("find");
        assert_eq!(found, Some(record));
    }

    #[tokio::test]
    async fn in_memory_database_keeps_schema() {
        let store = SqliteMetadataStore::connect("sqlite::memory:")
            .await
            .expect("connect");
        store
            .create(&FileRecord::new("m".into(), "k".into(), "l".into()))
            .await
            .expect("create");
        assert!(store.find_by_name("m").await.expect("find").is_some());
    }
}
