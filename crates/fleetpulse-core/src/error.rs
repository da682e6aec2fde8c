use thiserror::Error;

/// Failure talking to the device store.
///
/// The two variants matter to callers in different ways: `Unavailable`
/// is transient (worth retrying), `Query` is logical (retrying the same
/// statement will fail the same way).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached (connection refused, pool
    /// exhausted, database file locked, ...).
    #[error("device store unavailable: {0}")]
    Unavailable(String),

    /// A statement executed but failed, or returned malformed rows.
    #[error("device store query failed: {0}")]
    Query(String),
}

impl StoreError {
    /// Returns `true` if this error is worth a bounded retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(code, ref msg)
                if matches!(
                    code.code,
                    rusqlite::ErrorCode::DatabaseBusy
                        | rusqlite::ErrorCode::DatabaseLocked
                        | rusqlite::ErrorCode::CannotOpen
                ) =>
            {
                Self::Unavailable(msg.clone().unwrap_or_else(|| code.to_string()))
            }
            other => Self::Query(other.to_string()),
        }
    }
}

/// Top-level error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Device store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A staleness sweep could not run because the store stayed
    /// unreachable through its retry budget.
    #[error("staleness sweep aborted, store unreachable after {attempts} attempts: {source}")]
    SweepUnavailable {
        attempts: u32,
        #[source]
        source: StoreError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_is_transient_query_is_not() {
        assert!(StoreError::Unavailable("refused".into()).is_transient());
        assert!(!StoreError::Query("no such table".into()).is_transient());
    }
}
