use axum::{http::StatusCode, response::{IntoResponse, Response}};
use thiserror::Error;

/// Outcome of a ledger operation that did not succeed.
///
/// Everything except [`LedgerError::Storage`] is an expected, client-facing
/// result. A non-success result never leaves a recorded transaction behind.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("account {0} not found")]
    NotFound(i64),

    #[error("debit of {amount} takes account {account_id} below its limit of {limit}")]
    LimitExceeded {
        account_id: i32,
        amount: i64,
        limit: i64,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Infrastructure faults raised by a ledger store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("storage deadline elapsed")]
    Timeout,

    #[error("malformed row: {0}")]
    MalformedRow(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

impl LedgerError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidInput(_) | Self::LimitExceeded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<tokio_postgres::Error> for LedgerError {
    fn from(e: tokio_postgres::Error) -> Self {
        Self::Storage(StorageError::Postgres(e))
    }
}

impl From<deadpool_postgres::PoolError> for LedgerError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        Self::Storage(StorageError::Pool(e))
    }
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        match &self {
            Self::Storage(e) => tracing::error!("storage failure: {e}"),
            other => tracing::debug!("request rejected: {other}"),
        }
        (self.status_code(), String::new()).into_response()
    }
}
