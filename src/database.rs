use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};
use tracing::{error, warn};

use chrono::Utc;
use rusqlite::Error::InvalidParameterName;

use crate::models::{
    Chronograph, ChronographInput, ChronographKind, ChronographState, ChronographUpdate, Theme,
    UserSettings, UserSettingsUpdate, Workspace, WorkspaceInput,
};

/// Log IO-related DB errors for easier diagnosis (disk full, permission denied).
/// Does not change error propagation — caller still returns Err.
fn log_io_error_if_any(context: &str, e: &rusqlite::Error) {
    use rusqlite::ffi::ErrorCode;
    if let rusqlite::Error::SqliteFailure(ffi_err, _) = e {
        match ffi_err.code {
            ErrorCode::DiskFull => {
                error!(
                    "[DB] {}: Disk full. Free space on drive or check app data directory.",
                    context
                );
            }
            ErrorCode::ReadOnly | ErrorCode::CannotOpen => {
                error!(
                    "[DB] {}: Permission denied or read-only. Check app data directory is writable.",
                    context
                );
            }
            ErrorCode::SystemIoFailure => {
                error!("[DB] {}: I/O error. Check disk and permissions.", context);
            }
            _ => {}
        }
    }
}

fn conversion_error(index: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        index,
        rusqlite::types::Type::Text,
        message.into(),
    )
}

fn row_to_chronograph(row: &Row<'_>) -> SqliteResult<Chronograph> {
    let kind: String = row.get(3)?;
    let state: String = row.get(4)?;
    Ok(Chronograph {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        name: row.get(2)?,
        kind: ChronographKind::parse(&kind).map_err(|e| conversion_error(3, e))?,
        state: ChronographState::parse(&state).map_err(|e| conversion_error(4, e))?,
        duration: row.get(5)?,
        is_favourite: row.get(6)?,
        created_at: row.get(7)?,
        modified_at: row.get(8)?,
    })
}

fn row_to_workspace(row: &Row<'_>) -> SqliteResult<Workspace> {
    Ok(Workspace {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        is_favourite: row.get(3)?,
        is_selected: row.get(4)?,
        created_at: row.get(5)?,
        modified_at: row.get(6)?,
        deleted_at: row.get(7)?,
    })
}

fn row_to_settings(row: &Row<'_>) -> SqliteResult<UserSettings> {
    let theme: String = row.get(0)?;
    Ok(UserSettings {
        theme: Theme::parse(&theme).map_err(|e| conversion_error(0, e))?,
        show_app_in_system_tray: row.get(1)?,
        notify_on_timer_complete: row.get(2)?,
        created_at: row.get(3)?,
        modified_at: row.get(4)?,
    })
}

const CHRONOGRAPH_COLUMNS: &str =
    "id, workspace_id, name, kind, state, duration, is_favourite, created_at, modified_at";
const WORKSPACE_COLUMNS: &str =
    "id, title, description, is_favourite, is_selected, created_at, modified_at, deleted_at";

pub struct Database {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Lock the connection, mapping a poisoned mutex to an error instead of
    /// propagating the panic.
    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, rusqlite::Error> {
        self.conn.lock().map_err(|e| {
            InvalidParameterName(format!(
                "Database mutex poisoned: {}. A panic occurred while holding the lock. \
                 Please restart the application to recover.",
                e
            ))
        })
    }

    pub fn new(db_path: &str) -> SqliteResult<Self> {
        let conn = Connection::open(db_path)?;

        // Integrity check on startup — detect corruption before init
        let integrity: String = conn
            .query_row("PRAGMA integrity_check", [], |r| r.get(0))
            .map_err(|e| InvalidParameterName(format!("Integrity check failed: {}", e)))?;
        if integrity.to_lowercase() != "ok" {
            return Err(InvalidParameterName(format!(
                "Database corruption detected: {}",
                integrity
            )));
        }

        // WAL for crash safety; non-critical if unavailable
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| {
                warn!(
                    "[DB] Failed to enable WAL mode: {}. Continuing with default journal mode.",
                    e
                );
            })
            .ok();

        let _ = conn.pragma_update(None, "synchronous", "NORMAL");
        let _ = conn.pragma_update(None, "temp_store", "MEMORY");

        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| {
                warn!("[DB] Failed to enable foreign keys: {}. Continuing.", e);
            })
            .ok();

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Current schema version (PRAGMA user_version). Bump when adding migrations.
    const SCHEMA_VERSION: i32 = 1;

    /// Versioned migrations using SQLite user_version pragma.
    fn run_migrations(&self) -> SqliteResult<()> {
        let conn = self.lock_conn()?;
        let current: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
        let now = Utc::now().to_rfc3339();

        if current < 1 {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS workspaces (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                is_favourite INTEGER NOT NULL DEFAULT 0,
                is_selected INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                modified_at TEXT NOT NULL,
                deleted_at TEXT
            )",
                [],
            )?;
            conn.execute(
                "CREATE TABLE IF NOT EXISTS chronographs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                workspace_id INTEGER NOT NULL REFERENCES workspaces(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                kind TEXT NOT NULL CHECK (kind IN ('timer', 'stopwatch')),
                state TEXT NOT NULL DEFAULT 'paused' CHECK (state IN ('paused', 'active')),
                duration INTEGER NOT NULL DEFAULT 0 CHECK (duration >= 0),
                is_favourite INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                modified_at TEXT NOT NULL
            )",
                [],
            )?;
            conn.execute(
                "CREATE TABLE IF NOT EXISTS settings (
                id INTEGER PRIMARY KEY CHECK (id = 0),
                theme TEXT NOT NULL DEFAULT 'system',
                show_app_in_system_tray INTEGER NOT NULL DEFAULT 0,
                notify_on_timer_complete INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                modified_at TEXT NOT NULL
            )",
                [],
            )?;
            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_chronographs_workspace_kind
                 ON chronographs(workspace_id, kind)",
                [],
            )?;

            // Seed: fetch_current_workspace and fetch_settings must be total
            // on a fresh install.
            conn.execute(
                "INSERT INTO workspaces (title, description, is_favourite, is_selected, created_at, modified_at)
                 SELECT 'Default', '', 0, 1, ?1, ?1
                 WHERE NOT EXISTS (SELECT 1 FROM workspaces)",
                params![now],
            )?;
            conn.execute(
                "INSERT INTO settings (id, theme, show_app_in_system_tray, notify_on_timer_complete, created_at, modified_at)
                 SELECT 0, 'system', 0, 0, ?1, ?1
                 WHERE NOT EXISTS (SELECT 1 FROM settings WHERE id = 0)",
                params![now],
            )?;
        }

        conn.pragma_update(None, "user_version", Self::SCHEMA_VERSION)?;
        Ok(())
    }

    // ============================================
    // CHRONOGRAPHS
    // ============================================

    /// Ordered list for one (workspace, kind) pair; newest first.
    pub fn fetch_chronographs(
        &self,
        workspace_id: i64,
        kind: ChronographKind,
    ) -> SqliteResult<Vec<Chronograph>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM chronographs
             WHERE workspace_id = ?1 AND kind = ?2
             ORDER BY id DESC",
            CHRONOGRAPH_COLUMNS
        ))?;

        let rows = stmt.query_map(params![workspace_id, kind.as_str()], row_to_chronograph)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Insert and return the stored row, with the DB-assigned id and timestamps.
    pub fn insert_chronograph(&self, input: &ChronographInput) -> SqliteResult<Chronograph> {
        let conn = self.lock_conn()?;
        let now = Utc::now().to_rfc3339();

        conn.execute("BEGIN IMMEDIATE TRANSACTION", []).map_err(|e| {
            log_io_error_if_any("insert_chronograph begin", &e);
            e
        })?;

        let result = conn.execute(
            "INSERT INTO chronographs
             (workspace_id, name, kind, state, duration, is_favourite, created_at, modified_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                input.workspace_id,
                input.name,
                input.kind.as_str(),
                input.state.as_str(),
                input.duration.max(0),
                input.is_favourite,
                now
            ],
        );

        match result {
            Ok(_) => {
                let id = conn.last_insert_rowid();
                conn.execute("COMMIT", []).map_err(|e| {
                    log_io_error_if_any("insert_chronograph commit", &e);
                    let _ = conn.execute("ROLLBACK", []);
                    e
                })?;
                conn.query_row(
                    &format!(
                        "SELECT {} FROM chronographs WHERE id = ?1",
                        CHRONOGRAPH_COLUMNS
                    ),
                    params![id],
                    row_to_chronograph,
                )
            }
            Err(e) => {
                log_io_error_if_any("insert_chronograph", &e);
                error!("[DB] Failed to insert chronograph: {}. Rolling back.", e);
                let _ = conn.execute("ROLLBACK", []);
                Err(e)
            }
        }
    }

    /// Returns false when no row matched (already deleted or wrong workspace).
    pub fn update_chronograph(
        &self,
        workspace_id: i64,
        id: i64,
        update: &ChronographUpdate,
    ) -> SqliteResult<bool> {
        let conn = self.lock_conn()?;
        let now = Utc::now().to_rfc3339();

        let affected = conn
            .execute(
                "UPDATE chronographs
                 SET name = ?1, kind = ?2, state = ?3, duration = ?4, is_favourite = ?5,
                     modified_at = ?6
                 WHERE id = ?7 AND workspace_id = ?8",
                params![
                    update.name,
                    update.kind.as_str(),
                    update.state.as_str(),
                    update.duration.max(0),
                    update.is_favourite,
                    now,
                    id,
                    workspace_id
                ],
            )
            .map_err(|e| {
                log_io_error_if_any("update_chronograph", &e);
                e
            })?;

        Ok(affected > 0)
    }

    pub fn delete_chronograph(&self, workspace_id: i64, id: i64) -> SqliteResult<bool> {
        let conn = self.lock_conn()?;
        let affected = conn
            .execute(
                "DELETE FROM chronographs WHERE workspace_id = ?1 AND id = ?2",
                params![workspace_id, id],
            )
            .map_err(|e| {
                log_io_error_if_any("delete_chronograph", &e);
                e
            })?;
        Ok(affected > 0)
    }

    // ============================================
    // WORKSPACES
    // ============================================

    pub fn fetch_workspaces(&self) -> SqliteResult<Vec<Workspace>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM workspaces ORDER BY id DESC",
            WORKSPACE_COLUMNS
        ))?;

        let rows = stmt.query_map([], row_to_workspace)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// The single selected workspace. Migration 1 seeds one, so this is
    /// total unless the user data was tampered with.
    pub fn fetch_current_workspace(&self) -> SqliteResult<Workspace> {
        let conn = self.lock_conn()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM workspaces WHERE is_selected = 1 LIMIT 1",
                WORKSPACE_COLUMNS
            ),
            [],
            row_to_workspace,
        )
    }

    /// Insert a workspace; when the new row is selected, the previous
    /// selection is cleared in the same transaction.
    pub fn insert_workspace(&self, input: &WorkspaceInput) -> SqliteResult<Workspace> {
        let conn = self.lock_conn()?;
        let now = Utc::now().to_rfc3339();

        conn.execute("BEGIN IMMEDIATE TRANSACTION", []).map_err(|e| {
            log_io_error_if_any("insert_workspace begin", &e);
            e
        })?;

        let result = (|| -> SqliteResult<i64> {
            if input.is_selected {
                conn.execute("UPDATE workspaces SET is_selected = 0 WHERE is_selected = 1", [])?;
            }
            conn.execute(
                "INSERT INTO workspaces
                 (title, description, is_favourite, is_selected, created_at, modified_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![
                    input.title,
                    input.description,
                    input.is_favourite,
                    input.is_selected,
                    now
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })();

        match result {
            Ok(id) => {
                conn.execute("COMMIT", []).map_err(|e| {
                    log_io_error_if_any("insert_workspace commit", &e);
                    let _ = conn.execute("ROLLBACK", []);
                    e
                })?;
                conn.query_row(
                    &format!("SELECT {} FROM workspaces WHERE id = ?1", WORKSPACE_COLUMNS),
                    params![id],
                    row_to_workspace,
                )
            }
            Err(e) => {
                log_io_error_if_any("insert_workspace", &e);
                error!("[DB] Failed to insert workspace: {}. Rolling back.", e);
                let _ = conn.execute("ROLLBACK", []);
                Err(e)
            }
        }
    }

    pub fn update_workspace(&self, id: i64, input: &WorkspaceInput) -> SqliteResult<bool> {
        let conn = self.lock_conn()?;
        let now = Utc::now().to_rfc3339();

        conn.execute("BEGIN IMMEDIATE TRANSACTION", []).map_err(|e| {
            log_io_error_if_any("update_workspace begin", &e);
            e
        })?;

        let result = (|| -> SqliteResult<usize> {
            if input.is_selected {
                conn.execute(
                    "UPDATE workspaces SET is_selected = 0 WHERE is_selected = 1 AND id != ?1",
                    params![id],
                )?;
            }
            conn.execute(
                "UPDATE workspaces
                 SET title = ?1, description = ?2, is_favourite = ?3, is_selected = ?4,
                     modified_at = ?5
                 WHERE id = ?6",
                params![
                    input.title,
                    input.description,
                    input.is_favourite,
                    input.is_selected,
                    now,
                    id
                ],
            )
        })();

        match result {
            Ok(affected) => {
                conn.execute("COMMIT", []).map_err(|e| {
                    log_io_error_if_any("update_workspace commit", &e);
                    let _ = conn.execute("ROLLBACK", []);
                    e
                })?;
                Ok(affected > 0)
            }
            Err(e) => {
                log_io_error_if_any("update_workspace", &e);
                error!("[DB] Failed to update workspace: {}. Rolling back.", e);
                let _ = conn.execute("ROLLBACK", []);
                Err(e)
            }
        }
    }

    /// Cascade removes the workspace's chronographs (FK ON DELETE CASCADE).
    pub fn delete_workspace(&self, id: i64) -> SqliteResult<bool> {
        let conn = self.lock_conn()?;
        let affected = conn
            .execute("DELETE FROM workspaces WHERE id = ?1", params![id])
            .map_err(|e| {
                log_io_error_if_any("delete_workspace", &e);
                e
            })?;
        Ok(affected > 0)
    }

    // ============================================
    // SETTINGS
    // ============================================

    pub fn fetch_settings(&self) -> SqliteResult<UserSettings> {
        let conn = self.lock_conn()?;
        conn.query_row(
            "SELECT theme, show_app_in_system_tray, notify_on_timer_complete,
                    created_at, modified_at
             FROM settings WHERE id = 0",
            [],
            row_to_settings,
        )
    }

    /// Partial read-modify-write on the singleton row; absent fields keep
    /// their stored value.
    pub fn update_settings(&self, update: &UserSettingsUpdate) -> SqliteResult<bool> {
        let conn = self.lock_conn()?;
        let now = Utc::now().to_rfc3339();

        conn.execute("BEGIN IMMEDIATE TRANSACTION", []).map_err(|e| {
            log_io_error_if_any("update_settings begin", &e);
            e
        })?;

        let result = (|| -> SqliteResult<usize> {
            let current = conn.query_row(
                "SELECT theme, show_app_in_system_tray, notify_on_timer_complete,
                        created_at, modified_at
                 FROM settings WHERE id = 0",
                [],
                row_to_settings,
            )?;

            let theme = update.theme.unwrap_or(current.theme);
            let show_tray = update
                .show_app_in_system_tray
                .unwrap_or(current.show_app_in_system_tray);
            let notify = update
                .notify_on_timer_complete
                .unwrap_or(current.notify_on_timer_complete);

            conn.execute(
                "UPDATE settings
                 SET theme = ?1, show_app_in_system_tray = ?2, notify_on_timer_complete = ?3,
                     modified_at = ?4
                 WHERE id = 0",
                params![theme.as_str(), show_tray, notify, now],
            )
        })();

        match result {
            Ok(affected) => {
                conn.execute("COMMIT", []).map_err(|e| {
                    log_io_error_if_any("update_settings commit", &e);
                    let _ = conn.execute("ROLLBACK", []);
                    e
                })?;
                Ok(affected > 0)
            }
            Err(e) => {
                log_io_error_if_any("update_settings", &e);
                error!("[DB] Failed to update settings: {}. Rolling back.", e);
                let _ = conn.execute("ROLLBACK", []);
                Err(e)
            }
        }
    }
}
