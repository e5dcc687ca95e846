//! Settings repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist extraction settings as one JSON value per settings key.
//!
//! # Invariants
//! - Loading settings that were never saved returns defaults.
//! - Saved settings are normalized first.

use crate::db::DbError;
use crate::model::settings::ExtractionSettings;
use rusqlite::{params, Connection, OptionalExtension};
use std::error::Error;
use std::fmt::{Display, Formatter};

const EXTRACTION_SETTINGS_KEY: &str = "extraction";

pub type SettingsResult<T> = Result<T, SettingsError>;

#[derive(Debug)]
pub enum SettingsError {
    Db(DbError),
    InvalidData(String),
}

impl Display for SettingsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid stored settings: {message}"),
        }
    }
}

impl Error for SettingsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<rusqlite::Error> for SettingsError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for user settings.
pub trait SettingsRepository {
    fn load_extraction_settings(&self) -> SettingsResult<ExtractionSettings>;
    fn save_extraction_settings(&self, settings: &ExtractionSettings) -> SettingsResult<()>;
}

/// SQLite-backed settings repository.
pub struct SqliteSettingsRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSettingsRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl SettingsRepository for SqliteSettingsRepository<'_> {
    fn load_extraction_settings(&self) -> SettingsResult<ExtractionSettings> {
        let stored: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1;",
                [EXTRACTION_SETTINGS_KEY],
                |row| row.get(0),
            )
            .optional()?;

        match stored {
            Some(value) => serde_json::from_str::<ExtractionSettings>(&value)
                .map(ExtractionSettings::normalized)
                .map_err(|err| SettingsError::InvalidData(err.to_string())),
            None => Ok(ExtractionSettings::default()),
        }
    }

    fn save_extraction_settings(&self, settings: &ExtractionSettings) -> SettingsResult<()> {
        let normalized = settings.clone().normalized();
        let value = serde_json::to_string(&normalized)
            .map_err(|err| SettingsError::InvalidData(err.to_string()))?;

        self.conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![EXTRACTION_SETTINGS_KEY, value],
        )?;
        Ok(())
    }
}
