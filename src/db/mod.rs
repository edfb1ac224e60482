mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, ErrorCode, OptionalExtension, TransactionBehavior};
use uuid::Uuid;

use crate::models::*;
use crate::store::{apply, ProjectStore, SetFields, StoreError};

/// SQLite-backed document store. Each project is one JSON document in the
/// `projects` table; `name` and `status` are mirrored into columns for listing.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(Duration::from_secs(2))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("", "", "project-ledger")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        let db_path = dirs.data_dir().join("ledger.db");
        Self::open(db_path)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database lock poisoned"))?;
        schema::run_migrations(&conn)
    }

    /// Runs `f` against the connection on the blocking pool. rusqlite calls
    /// are synchronous and may wait out `busy_timeout`, which must not stall
    /// a runtime worker.
    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|_| StoreError::Internal("database lock poisoned".to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Internal(format!("database task failed: {e}")))?
    }
}

#[async_trait]
impl ProjectStore for Database {
    async fn get(&self, id: Uuid) -> Result<Option<Project>, StoreError> {
        self.blocking(move |conn| {
            let document: Option<String> = conn
                .query_row(
                    "SELECT document FROM projects WHERE id = ?",
                    [id.to_string()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(classify)?;

            document.map(|doc| decode(id, &doc)).transpose()
        })
        .await
    }

    async fn list(&self, status: Option<ProjectStatus>) -> Result<Vec<Project>, StoreError> {
        self.blocking(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, document FROM projects
                     WHERE ?1 IS NULL OR status = ?1
                     ORDER BY name",
                )
                .map_err(classify)?;

            let rows = stmt
                .query_map([status.map(|s| s.as_str())], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })
                .map_err(classify)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(classify)?;

            rows.into_iter()
                .map(|(id, doc)| decode(parse_uuid(&id)?, &doc))
                .collect()
        })
        .await
    }

    async fn insert(&self, project: &Project) -> Result<(), StoreError> {
        let project = project.clone();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO projects (id, name, status, document, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
                (
                    project.id.to_string(),
                    &project.name,
                    project.status.as_str(),
                    encode(&project)?,
                    project.created_at.to_rfc3339(),
                    project.updated_at.to_rfc3339(),
                ),
            )
            .map_err(classify)?;
            Ok(())
        })
        .await
    }

    async fn conditional_update(
        &self,
        id: Uuid,
        fields: SetFields,
        history: Vec<HistoryEntry>,
    ) -> Result<Option<Project>, StoreError> {
        self.blocking(move |conn| {
            // IMMEDIATE takes the write lock up front so the read below cannot
            // go stale before the write.
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(classify)?;

            let document: Option<String> = tx
                .query_row(
                    "SELECT document FROM projects WHERE id = ?",
                    [id.to_string()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(classify)?;
            let Some(document) = document else {
                return Ok(None);
            };

            let mut project = decode(id, &document)?;
            apply(&mut project, fields, history, Utc::now());

            tx.execute(
                "UPDATE projects SET name = ?, status = ?, document = ?, updated_at = ? WHERE id = ?",
                (
                    &project.name,
                    project.status.as_str(),
                    encode(&project)?,
                    project.updated_at.to_rfc3339(),
                    id.to_string(),
                ),
            )
            .map_err(classify)?;
            tx.commit().map_err(classify)?;

            Ok(Some(project))
        })
        .await
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        self.blocking(move |conn| {
            let rows = conn
                .execute("DELETE FROM projects WHERE id = ?", [id.to_string()])
                .map_err(classify)?;
            Ok(rows > 0)
        })
        .await
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
        }
    }
}

/// Busy and locked databases clear up on their own; everything else is a
/// real failure.
fn classify(e: rusqlite::Error) -> StoreError {
    match e.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
            StoreError::Busy(e.to_string())
        }
        Some(ErrorCode::CannotOpen) | Some(ErrorCode::SystemIoFailure) => {
            StoreError::Unavailable(e.to_string())
        }
        _ => StoreError::Internal(e.to_string()),
    }
}

fn decode(id: Uuid, document: &str) -> Result<Project, StoreError> {
    serde_json::from_str(document).map_err(|e| StoreError::Corrupt {
        id,
        reason: e.to_string(),
    })
}

fn encode(project: &Project) -> Result<String, StoreError> {
    serde_json::to_string(project).map_err(|e| StoreError::Corrupt {
        id: project.id,
        reason: e.to_string(),
    })
}

fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(s).map_err(|e| StoreError::Internal(format!("bad project id {s:?}: {e}")))
}
