use thiserror::Error;

use crate::datecalc::DateExprError;
use crate::period::ParsePeriodError;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Malformed task record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Task not found: {0}")]
    NotFound(String),

    /// A root task was created without the fields recurrence needs.
    #[error("You need to specify the {0} parameters")]
    MissingParameter(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error(transparent)]
    InvalidPeriod(#[from] ParsePeriodError),

    #[error(transparent)]
    InvalidDate(#[from] DateExprError),

    /// The store refused to reload a record by its cached working-set id.
    #[error("Stale task id {0}")]
    StaleId(u64),

    /// Another record already holds this `(rparent, due)` slot.
    #[error("Conflicting instance: {0}")]
    Conflict(String),

    #[error("Task store command failed: {0}")]
    Store(String),

    #[error("Periodic backfill exceeded {0} iterations")]
    BackfillLimit(usize),
}
