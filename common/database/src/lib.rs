use std::time::Duration;

use sqlx::{
    postgres::{PgPool, PgPoolOptions},
    Error as SqlxError,
};

// Default database timeouts. Report ingestion is write-heavy but each
// statement is small, so the statement timeout mostly guards against a
// wedged connection rather than slow queries.
pub const DEFAULT_TIMEOUTS: DatabaseTimeouts = DatabaseTimeouts {
    statement_timeout: Duration::from_secs(5),
    lock_timeout: Duration::from_secs(1),
    acquire_timeout: Duration::from_secs(3),
    idle_timeout: Duration::from_secs(300),
    max_lifetime: Duration::from_secs(1800),
};

#[derive(Debug, Clone)]
pub struct DatabaseTimeouts {
    pub statement_timeout: Duration,
    pub lock_timeout: Duration,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

pub async fn get_pool(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    get_pool_with_timeouts(url, max_connections, DEFAULT_TIMEOUTS).await
}

pub async fn get_pool_with_timeouts(
    url: &str,
    max_connections: u32,
    timeouts: DatabaseTimeouts,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(timeouts.acquire_timeout)
        .idle_timeout(timeouts.idle_timeout)
        .max_lifetime(timeouts.max_lifetime)
        // Set PostgreSQL session-level timeouts for all queries on this connection
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                let stmt_ms: i64 = timeouts
                    .statement_timeout
                    .as_millis()
                    .try_into()
                    .expect("statement_timeout too large");
                let lock_ms: i64 = timeouts
                    .lock_timeout
                    .as_millis()
                    .try_into()
                    .expect("lock_timeout too large");

                // SET commands don't accept bind parameters
                sqlx::query(&format!("SET statement_timeout = '{stmt_ms}ms'"))
                    .execute(&mut *conn)
                    .await?;
                sqlx::query(&format!("SET lock_timeout = '{lock_ms}ms'"))
                    .execute(&mut *conn)
                    .await?;

                Ok(())
            })
        })
        .connect(url)
        .await
}

/// Determines if a sqlx::Error represents a unique constraint violation,
/// i.e. another request won a lookup-or-create race for the same key.
pub fn is_unique_violation(error: &SqlxError) -> bool {
    match error {
        SqlxError::Database(db_error) => {
            // Class 23 — Integrity Constraint Violation; 23505 = unique_violation
            // See: https://www.postgresql.org/docs/current/errcodes-appendix.html
            if let Some(code) = db_error.code() {
                code.as_ref() == "23505"
            } else {
                db_error
                    .message()
                    .to_lowercase()
                    .contains("violates unique constraint")
            }
        }
        _ => false,
    }
}
