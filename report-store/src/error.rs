use thiserror::Error;

/// Enumeration of database-related errors in the report store.
/// Errors originate from sqlx and are wrapped to provide additional context.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("pool creation failed with: {error}")]
    PoolCreationError { error: sqlx::Error },
    #[error("connection failed with: {error}")]
    ConnectionError { error: sqlx::Error },
    #[error("query failed with: {0}")]
    QueryError(#[from] sqlx::Error),
    #[error("transaction {command} failed with: {error}")]
    TransactionError { command: String, error: sqlx::Error },
}
