//! SQLite storage bootstrap for the marks store.
//!
//! # Responsibility
//! - Open and configure SQLite connections used by the record store.
//! - Apply schema migrations before any mark data is read or written.
//!
//! # Invariants
//! - Schema version is tracked via `PRAGMA user_version`.
//! - Every returned connection enforces foreign keys.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Storage transport and bootstrap failures.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl DbError {
    /// Returns whether SQLite rejected a write because of a table constraint
    /// (`UNIQUE`, `CHECK`, `FOREIGN KEY` or a `RAISE` inside a trigger).
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            Self::Sqlite(err) => {
                err.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation)
            }
            Self::UnsupportedSchemaVersion { .. } => false,
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "marks schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
