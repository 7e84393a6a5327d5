use sea_orm::DbErr;

/// Errors returned by the stores, the tracker and the sweeper.
///
/// Broadcast failures have no variant here. They are reported through
/// [`crate::broadcast::DeliveryReport`] and logged, never surfaced to the
/// operation that triggered them.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The backing database rejected or failed the operation.
    #[error("database error: {0}")]
    Database(#[from] DbErr),

    /// A row addressed by id does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i32 },

    /// The caller supplied input that cannot reach the store.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether this error is a missing-row report rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
