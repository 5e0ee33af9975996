use std::path::PathBuf;

use feedkit_core::error::CoreError;
use feedkit_db::ConfigError;

/// Errors that abort a maintenance job before it can run.
///
/// Failures on a single subject type are logged and recorded in the job's
/// report instead.
#[derive(Debug, thiserror::Error)]
pub enum JobsError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to read entity registry {path}: {source}")]
    Registry {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type JobsResult<T> = Result<T, JobsError>;
