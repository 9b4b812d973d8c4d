use crate::domain::model::{DraftFileRecord, DraftSummary};
use crate::domain::ports::DraftFileBackend;
use crate::utils::error::{DraftStoreError, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::OnceCell;

/// Schema generation written to `PRAGMA user_version`.
pub const SCHEMA_VERSION: i32 = 1;

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Durable backend keeping every draft file in one SQLite database file.
///
/// The database is opened on first use and the connection is reused by
/// every later call. Each operation runs as one statement or transaction on
/// the blocking pool.
pub struct SqliteBackend {
    path: PathBuf,
    busy_timeout: Duration,
    conn: OnceCell<Arc<Mutex<Connection>>>,
}

impl SqliteBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            conn: OnceCell::new(),
        }
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    /// Where the store lives when nothing else is configured:
    /// - Linux: ~/.local/share/draft-store/drafts.db
    /// - macOS: ~/Library/Application Support/draft-store/drafts.db
    /// - Windows: %APPDATA%\draft-store\drafts.db
    pub fn default_path() -> Option<PathBuf> {
        let mut path = dirs::data_dir().or_else(dirs::home_dir)?;
        path.push("draft-store");
        path.push("drafts.db");
        Some(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn connection(&self) -> Result<Arc<Mutex<Connection>>> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                let path = self.path.clone();
                let busy_timeout = self.busy_timeout;
                let conn =
                    tokio::task::spawn_blocking(move || open_connection(&path, busy_timeout))
                        .await??;
                tracing::info!("Draft store opened at {}", self.path.display());
                Ok::<_, DraftStoreError>(Arc::new(Mutex::new(conn)))
            })
            .await?;
        Ok(Arc::clone(conn))
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.connection().await?;
        tokio::task::spawn_blocking(move || {
            // A panicked operation leaves no open transaction behind, so the
            // connection is still usable after poisoning.
            let mut guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut *guard)
        })
        .await?
    }
}

fn open_connection(path: &Path, busy_timeout: Duration) -> Result<Connection> {
    let unavailable = |reason: String| DraftStoreError::StorageUnavailable {
        path: path.display().to_string(),
        reason,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| unavailable(e.to_string()))?;
    }

    let mut conn = Connection::open(path).map_err(|e| unavailable(e.to_string()))?;
    conn.busy_timeout(busy_timeout)
        .map_err(|e| unavailable(e.to_string()))?;

    match init_schema(&mut conn) {
        Ok(()) => Ok(conn),
        Err(DraftStoreError::Database(e)) => Err(unavailable(e.to_string())),
        Err(e) => Err(e),
    }
}

/// Create the table and the per-draft index if they are missing. Safe to
/// run on every open.
fn init_schema(conn: &mut Connection) -> Result<()> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if version > SCHEMA_VERSION {
        let path = conn.path().unwrap_or_default().to_string();
        return Err(DraftStoreError::StorageUnavailable {
            path,
            reason: format!(
                "schema generation {} is newer than supported generation {}",
                version, SCHEMA_VERSION
            ),
        });
    }

    let tx = conn.transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS draft_files (
            draft_id    TEXT NOT NULL,
            field_name  TEXT NOT NULL,
            file_index  INTEGER NOT NULL CHECK (file_index >= 0),
            file_name   TEXT NOT NULL,
            file_type   TEXT NOT NULL,
            file_data   BLOB NOT NULL,
            saved_at    TEXT NOT NULL,
            PRIMARY KEY (draft_id, field_name, file_index)
        );
        CREATE INDEX IF NOT EXISTS idx_draft_files_by_draft ON draft_files(draft_id);",
    )?;
    tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    tx.commit()?;

    tracing::debug!("Draft store schema at generation {}", SCHEMA_VERSION);
    Ok(())
}

#[async_trait]
impl DraftFileBackend for SqliteBackend {
    async fn put(&self, record: DraftFileRecord) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO draft_files
                    (draft_id, field_name, file_index, file_name, file_type, file_data, saved_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.draft_id,
                    record.field_name,
                    record.file_index,
                    record.file_name,
                    record.file_type,
                    record.file_data,
                    record.saved_at,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn records_for_draft(&self, draft_id: &str) -> Result<Vec<DraftFileRecord>> {
        let draft_id = draft_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT draft_id, field_name, file_index, file_name, file_type, file_data, saved_at
                 FROM draft_files
                 WHERE draft_id = ?1",
            )?;

            let rows = stmt.query_map([&draft_id], |row| {
                Ok(DraftFileRecord {
                    draft_id: row.get(0)?,
                    field_name: row.get(1)?,
                    file_index: row.get(2)?,
                    file_name: row.get(3)?,
                    file_type: row.get(4)?,
                    file_data: row.get(5)?,
                    saved_at: row.get(6)?,
                })
            })?;

            let mut records = Vec::new();
            for record in rows {
                records.push(record?);
            }
            Ok(records)
        })
        .await
    }

    async fn delete_field(&self, draft_id: &str, field_name: &str) -> Result<usize> {
        let draft_id = draft_id.to_string();
        let field_name = field_name.to_string();
        self.with_conn(move |conn| {
            let removed = conn.execute(
                "DELETE FROM draft_files WHERE draft_id = ?1 AND field_name = ?2",
                params![draft_id, field_name],
            )?;
            Ok(removed)
        })
        .await
    }

    async fn delete_draft(&self, draft_id: &str) -> Result<usize> {
        let draft_id = draft_id.to_string();
        self.with_conn(move |conn| {
            let removed =
                conn.execute("DELETE FROM draft_files WHERE draft_id = ?1", [&draft_id])?;
            Ok(removed)
        })
        .await
    }

    async fn clear(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM draft_files", [])?;
            Ok(removed)
        })
        .await
    }

    async fn count_for_draft(&self, draft_id: &str) -> Result<u64> {
        let draft_id = draft_id.to_string();
        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM draft_files WHERE draft_id = ?1",
                [&draft_id],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
        .await
    }

    async fn summaries(&self) -> Result<Vec<DraftSummary>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT draft_id, COUNT(*), COALESCE(SUM(LENGTH(file_data)), 0)
                 FROM draft_files
                 GROUP BY draft_id
                 ORDER BY draft_id",
            )?;

            let rows = stmt.query_map([], |row| {
                Ok(DraftSummary {
                    draft_id: row.get(0)?,
                    file_count: row.get::<_, i64>(1)? as u64,
                    total_bytes: row.get::<_, i64>(2)? as u64,
                })
            })?;

            let mut summaries = Vec::new();
            for summary in rows {
                summaries.push(summary?);
            }
            Ok(summaries)
        })
        .await
    }
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("path", &self.path)
            .field("busy_timeout", &self.busy_timeout)
            .field("open", &self.conn.initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn record(draft_id: &str, field_name: &str, file_index: u32, data: &[u8]) -> DraftFileRecord {
        DraftFileRecord {
            draft_id: draft_id.to_string(),
            field_name: field_name.to_string(),
            file_index,
            file_name: format!("{}-{}.jpg", field_name, file_index),
            file_type: "image/jpeg".to_string(),
            file_data: data.to_vec(),
            saved_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_opens_lazily_and_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("drafts.db");
        let backend = SqliteBackend::new(&path);

        assert!(!path.exists());
        assert_eq!(backend.count_for_draft("d1").await.unwrap(), 0);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_put_then_read_back() {
        let temp_dir = TempDir::new().unwrap();
        let backend = SqliteBackend::new(temp_dir.path().join("drafts.db"));

        backend.put(record("d1", "mainImage", 0, b"jpeg")).await.unwrap();
        let records = backend.records_for_draft("d1").await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].file_name, "mainImage-0.jpg");
        assert_eq!(records[0].file_type, "image/jpeg");
        assert_eq!(records[0].file_data, b"jpeg");
    }

    #[tokio::test]
    async fn test_put_same_key_replaces() {
        let temp_dir = TempDir::new().unwrap();
        let backend = SqliteBackend::new(temp_dir.path().join("drafts.db"));

        backend.put(record("d1", "mainImage", 0, b"old")).await.unwrap();
        backend.put(record("d1", "mainImage", 0, b"new")).await.unwrap();

        let records = backend.records_for_draft("d1").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].file_data, b"new");
    }

    #[tokio::test]
    async fn test_delete_counts() {
        let temp_dir = TempDir::new().unwrap();
        let backend = SqliteBackend::new(temp_dir.path().join("drafts.db"));

        backend.put(record("d1", "section-0", 0, b"a")).await.unwrap();
        backend.put(record("d1", "section-0", 1, b"b")).await.unwrap();
        backend.put(record("d1", "mainImage", 0, b"c")).await.unwrap();
        backend.put(record("d2", "mainImage", 0, b"d")).await.unwrap();

        assert_eq!(backend.delete_field("d1", "section-0").await.unwrap(), 2);
        assert_eq!(backend.delete_draft("d1").await.unwrap(), 1);
        assert_eq!(backend.delete_draft("d1").await.unwrap(), 0);
        assert_eq!(backend.clear().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_summaries_group_by_draft() {
        let temp_dir = TempDir::new().unwrap();
        let backend = SqliteBackend::new(temp_dir.path().join("drafts.db"));

        backend.put(record("b", "mainImage", 0, b"12345")).await.unwrap();
        backend.put(record("a", "mainImage", 0, b"12")).await.unwrap();
        backend.put(record("a", "section-0", 0, b"123")).await.unwrap();

        let summaries = backend.summaries().await.unwrap();
        assert_eq!(
            summaries,
            vec![
                DraftSummary {
                    draft_id: "a".to_string(),
                    file_count: 2,
                    total_bytes: 5,
                },
                DraftSummary {
                    draft_id: "b".to_string(),
                    file_count: 1,
                    total_bytes: 5,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_rejects_newer_schema_generation() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("drafts.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1)
                .unwrap();
        }

        let backend = SqliteBackend::new(&path);
        let err = backend.count_for_draft("d1").await.unwrap_err();
        assert!(matches!(err, DraftStoreError::StorageUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_unopenable_path_is_storage_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        // A directory cannot be opened as a database file.
        let backend = SqliteBackend::new(temp_dir.path());

        let err = backend.count_for_draft("d1").await.unwrap_err();
        assert!(matches!(err, DraftStoreError::StorageUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_failed_open_is_retried_on_next_call() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let backend = SqliteBackend::new(blocker.join("drafts.db"));

        let err = backend.count_for_draft("d1").await.unwrap_err();
        assert!(matches!(err, DraftStoreError::StorageUnavailable { .. }));

        std::fs::remove_file(&blocker).unwrap();
        backend.put(record("d1", "mainImage", 0, b"jpeg")).await.unwrap();
        assert_eq!(backend.count_for_draft("d1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_panicked_operation_does_not_wedge_the_connection() {
        let temp_dir = TempDir::new().unwrap();
        let backend = SqliteBackend::new(temp_dir.path().join("drafts.db"));
        backend.put(record("d1", "mainImage", 0, b"jpeg")).await.unwrap();

        let err = backend
            .with_conn(|_conn| -> Result<()> { panic!("operation blew up") })
            .await
            .unwrap_err();
        assert!(matches!(err, DraftStoreError::TaskJoin(_)));

        assert_eq!(backend.count_for_draft("d1").await.unwrap(), 1);
        backend.put(record("d1", "mainImage", 1, b"png")).await.unwrap();
        assert_eq!(backend.count_for_draft("d1").await.unwrap(), 2);
    }
}
