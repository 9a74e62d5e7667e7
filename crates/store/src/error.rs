//! Storage-local errors and their mapping onto the domain taxonomy.

use coordination::{CoordinationError, MatterId};
use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors raised inside the SQLite adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("payload encoding: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported schema version {found}; this build supports up to {supported}")]
    UnsupportedSchemaVersion { supported: u32, found: u32 },

    #[error("corrupt row in {table}: {reason}")]
    Corrupt { table: &'static str, reason: String },

    #[error("matter {0} already exists")]
    DuplicateMatter(MatterId),
}

impl StoreError {
    /// `true` when SQLite reported a busy or locked database.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Sql(rusqlite::Error::SqliteFailure(err, _))
                if matches!(err.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
        )
    }

    /// `true` when a UNIQUE index rejected a row.
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            Self::Sql(rusqlite::Error::SqliteFailure(err, _))
                if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        )
    }

    /// `true` when a row reused an existing primary key.
    pub fn is_primary_key_violation(&self) -> bool {
        matches!(
            self,
            Self::Sql(rusqlite::Error::SqliteFailure(err, _))
                if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        )
    }
}

impl From<StoreError> for CoordinationError {
    fn from(err: StoreError) -> Self {
        if let StoreError::DuplicateMatter(id) = &err {
            return CoordinationError::validation(format!("matter {id} already exists"));
        }
        let transient = err.is_transient();
        CoordinationError::Storage {
            message: err.to_string(),
            transient,
        }
    }
}
