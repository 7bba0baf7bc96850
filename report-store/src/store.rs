use sqlx::PgPool;

use crate::error::StoreError;

/// Wraps the Postgres pool and the ingest tuning the service was started
/// with. One instance is shared across all requests; every operation
/// draws its connections from the pool.
#[derive(Clone)]
pub struct ReportStore {
    pub(crate) pool: PgPool,
    /// Reports whose parsed version value is below this are dropped
    /// before any resolution happens. None disables the filter.
    pub(crate) min_version_value: Option<i64>,
}

impl ReportStore {
    pub fn new(pool: PgPool, min_version_value: Option<i64>) -> Self {
        Self {
            pool,
            min_version_value,
        }
    }

    /// Initialize a store backed by a new pool.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        min_version_value: Option<i64>,
    ) -> Result<Self, StoreError> {
        let pool = common_database::get_pool(url, max_connections)
            .await
            .map_err(|error| StoreError::PoolCreationError { error })?;
        Ok(Self::new(pool, min_version_value))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
