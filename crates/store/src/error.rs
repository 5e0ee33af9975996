use feedkit_core::error::CoreError;

/// Error type returned by [`EventStore`](crate::EventStore) operations.
///
/// Wraps [`CoreError`] for domain errors. Database errors that are unique
/// violations on a `uq_*` constraint are classified as
/// [`CoreError::Conflict`] on conversion; everything else stays a
/// [`StoreError::Database`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A domain-level error from `feedkit_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

/// Convenience type alias for store return values.
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// The domain error, if this is one.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            Self::Core(core) => Some(core),
            Self::Database(_) => None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Core(CoreError::Conflict(_)))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match unique_violation(&err) {
            Some(constraint) => Self::Core(CoreError::Conflict(format!(
                "Duplicate value violates unique constraint: {constraint}"
            ))),
            None => Self::Database(err),
        }
    }
}

/// Name of the violated `uq_*` constraint, for PostgreSQL error 23505.
fn unique_violation(err: &sqlx::Error) -> Option<String> {
    let sqlx::Error::Database(db_err) = err else {
        return None;
    };
    if db_err.code().as_deref() != Some("23505") {
        return None;
    }
    db_err
        .constraint()
        .filter(|c| c.starts_with("uq_"))
        .map(str::to_string)
}
