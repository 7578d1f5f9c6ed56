use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

use crate::types::Settings;

pub const KEY_BASE_URL: &str = "omnisearchBaseUrl";
pub const KEY_PORT: &str = "omnisearchPort";
pub const KEY_VAULT_NAME: &str = "obsidianVaultName";
pub const KEY_SIDEBAR_WIDTH: &str = "sidebarWidth";

/// Environment variable that overrides the settings database location.
pub const SETTINGS_PATH_ENV: &str = "KAGI_OBSIDIAN_BRIDGE_SETTINGS";

const APP_DIR: &str = "kagi-obsidian-bridge";
const DB_FILE: &str = "settings.sqlite";

/// Resolve where the settings database lives.
/// Order: environment override, per-user config dir, working directory.
pub fn detect_settings_path() -> PathBuf {
    if let Some(path) = std::env::var(SETTINGS_PATH_ENV)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
    {
        return PathBuf::from(path);
    }

    #[cfg(not(target_os = "windows"))]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".config").join(APP_DIR).join(DB_FILE);
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(app_data) = std::env::var("APPDATA") {
            return PathBuf::from(app_data).join(APP_DIR).join(DB_FILE);
        }
    }

    PathBuf::from(DB_FILE)
}

/// Key-value settings storage shared by every component.
/// Each field is one row; values are JSON-encoded. A connection is opened per
/// operation so the store can be cloned freely across tasks.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all settings. Missing or undecodable entries fall back to defaults.
    pub fn load(&self) -> Result<Settings> {
        let conn = open_settings_db(&self.path)?;
        let defaults = Settings::default();
        Ok(Settings {
            omnisearch_base_url: read_or(&conn, KEY_BASE_URL, defaults.omnisearch_base_url)?,
            omnisearch_port: read_or(&conn, KEY_PORT, defaults.omnisearch_port)?,
            obsidian_vault_name: read_or(&conn, KEY_VAULT_NAME, defaults.obsidian_vault_name)?,
            sidebar_width: read_or(&conn, KEY_SIDEBAR_WIDTH, defaults.sidebar_width)?,
        })
    }

    /// Persist all four fields in one transaction.
    pub fn save(&self, settings: &Settings) -> Result<()> {
        let mut conn = open_settings_db(&self.path)?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO settings (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )?;
            stmt.execute(params![KEY_BASE_URL, serde_json::to_string(&settings.omnisearch_base_url)?])?;
            stmt.execute(params![KEY_PORT, serde_json::to_string(&settings.omnisearch_port)?])?;
            stmt.execute(params![KEY_VAULT_NAME, serde_json::to_string(&settings.obsidian_vault_name)?])?;
            stmt.execute(params![KEY_SIDEBAR_WIDTH, serde_json::to_string(&settings.sidebar_width)?])?;
        }
        tx.commit()?;
        tracing::info!("Settings saved to {}", self.path.display());
        Ok(())
    }
}

/// Open (creating if needed) the settings database and make sure the table exists.
pub fn open_settings_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch(
        "PRAGMA busy_timeout = 5000;
         CREATE TABLE IF NOT EXISTS settings (
             key   TEXT PRIMARY KEY,
             value TEXT NOT NULL
         );",
    )?;
    Ok(conn)
}

fn read_or<T: DeserializeOwned>(conn: &Connection, key: &str, default: T) -> Result<T> {
    let raw: Option<String> = conn
        .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| row.get(0))
        .optional()?;
    let Some(raw) = raw else {
        return Ok(default);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(value),
        Err(e) => {
            tracing::warn!("Ignoring malformed setting {key}: {e}");
            Ok(default)
        }
    }
}
