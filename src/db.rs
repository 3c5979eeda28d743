use crate::gradebook::GradeBook;
use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DB_FILE_NAME: &str = "gradecalc.sqlite3";
const GRADEBOOK_KEY: &str = "gradebook";
const PREFERENCES_KEY: &str = "preferences";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default)]
    pub theme: Theme,
}

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv_store(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;

    // Workspaces created before updated_at existed.
    if !table_has_column(&conn, "kv_store", "updated_at")? {
        conn.execute("ALTER TABLE kv_store ADD COLUMN updated_at TEXT", [])?;
    }

    Ok(conn)
}

pub fn store_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM kv_store WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        None => Ok(None),
        Some(text) => Ok(Some(
            serde_json::from_str(&text).with_context(|| format!("stored {} is invalid JSON", key))?,
        )),
    }
}

pub fn store_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    let text = serde_json::to_string(value)?;
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO kv_store(key, value_json, updated_at) VALUES(?, ?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json, updated_at = excluded.updated_at",
        (key, text, now),
    )?;
    Ok(())
}

/// Loads the stored grade book. Missing or unreadable state yields a fresh
/// book with the default subjects, which is written back.
pub fn load_gradebook(conn: &Connection) -> anyhow::Result<GradeBook> {
    let stored = match store_get_json(conn, GRADEBOOK_KEY) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("failed to load saved data: {e:#}");
            None
        }
    };
    if let Some(v) = stored {
        match serde_json::from_value::<GradeBook>(v) {
            Ok(book) => return Ok(book),
            Err(e) => log::warn!("failed to load saved data: {e}"),
        }
    }
    let book = GradeBook::with_default_subjects();
    save_gradebook(conn, &book)?;
    Ok(book)
}

pub fn save_gradebook(conn: &Connection, book: &GradeBook) -> anyhow::Result<()> {
    store_set_json(conn, GRADEBOOK_KEY, &serde_json::to_value(book)?)
}

pub fn load_preferences(conn: &Connection) -> anyhow::Result<Preferences> {
    Ok(store_get_json(conn, PREFERENCES_KEY)?
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default())
}

pub fn save_preferences(conn: &Connection, prefs: &Preferences) -> anyhow::Result<()> {
    store_set_json(conn, PREFERENCES_KEY, &serde_json::to_value(prefs)?)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
