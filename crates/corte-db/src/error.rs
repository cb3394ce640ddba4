//! # Database Error Types
//!
//! Error types for database operations, wrapping sqlx errors with context.
//!
//! ## Error Flow
//! ```text
//! sqlx::Error → DbError (this module) → EngineError (corte-engine) → caller
//! ```

use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found: `fetch_one` returned no rows or a guarded UPDATE
    /// matched nothing.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// UNIQUE index violation (e.g. duplicate SKU within a tenant).
    #[error("duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation (e.g. return referencing a deleted
    /// sale).
    #[error("foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A CHECK constraint rejected the write. The ceilings validated in
    /// corte-core are re-enforced by the schema; hitting this means a race
    /// the SQL guard caught.
    #[error("check constraint violation: {message}")]
    CheckViolation { message: String },

    /// Database file missing, permissions, disk full.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Invalid SQL in a migration or a version conflict.
    #[error("migration failed: {0}")]
    MigrationFailed(String),

    /// Runtime SQL error.
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// All pool connections in use.
    #[error("connection pool exhausted")]
    PoolExhausted,

    /// Anything else.
    #[error("internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

/// Maps sqlx errors onto the taxonomy. SQLite reports constraint failures
/// only through the message text, so we sniff it.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("CHECK constraint failed") {
                    DbError::CheckViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
