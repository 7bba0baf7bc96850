//! Report ingestion: noise filter, concurrent canonical resolution, and
//! atomic hit recording.

use std::time::Instant;

use tracing::debug;

use crate::error::StoreError;
use crate::metrics_consts::{
    INGEST_TIME, REPORTS_DROPPED_BELOW_MIN_VERSION, REPORTS_INGESTED,
};
use crate::resolve;
use crate::store::ReportStore;
use crate::types::{RawReport, ResolvedIds, VERSION_TITLE_LENGTH};
use crate::version::version_value;

impl ReportStore {
    /// Ingests one raw report. Returns the message id the report collapsed
    /// into, or None if the report was dropped by the minimum-version
    /// noise filter (a deliberate no-op, not an error).
    ///
    /// Any store failure along the way aborts the whole ingestion; the hit
    /// counter is only incremented once everything else succeeded.
    pub async fn ingest_report(&self, report: &RawReport) -> Result<Option<i64>, StoreError> {
        if let Some(min_value) = self.min_version_value {
            let truncated: String = report.version.chars().take(VERSION_TITLE_LENGTH).collect();
            // Reject older versions right away. Just noise.
            if version_value(&truncated) < min_value {
                debug!(version = %report.version, "dropping report below minimum version");
                metrics::counter!(REPORTS_DROPPED_BELOW_MIN_VERSION).increment(1);
                return Ok(None);
            }
        }

        let start_time = Instant::now();
        let pool = &self.pool;

        // The seven resolutions are independent of each other; fan out and
        // join on all of them. Any failure cancels the rest.
        let (id_version, id_gpu, id_cpu, id_platform, id_game, id_msg_kind, id_config) = tokio::try_join!(
            resolve::version_id(pool, &report.version),
            resolve::gpu_id(pool, &report.gpu, &report.gpu_full),
            resolve::cpu_id(pool, &report.cpu),
            resolve::platform_id(pool, &report.platform),
            resolve::game_id(pool, &report.game, &report.game_title),
            resolve::message_kind_id(pool, &report.message),
            resolve::config_id(pool, &report.config),
        )?;

        let ids = ResolvedIds {
            id_version,
            id_gpu,
            id_cpu,
            id_platform,
            id_game,
            id_config,
            id_msg_kind,
        };

        let formatted = formatted_message(report);
        let id_msg = resolve::message_id(pool, &ids, formatted).await?;

        self.record_hit(id_msg, &ids).await?;

        metrics::counter!(REPORTS_INGESTED).increment(1);
        metrics::histogram!(INGEST_TIME).record(start_time.elapsed().as_secs_f64());

        Ok(Some(id_msg))
    }

    /// Increment the hit counter and refresh the latest-report timestamp
    /// in one transaction, so two concurrent duplicate reports can't lose
    /// an update between the two tables.
    async fn record_hit(&self, id_msg: i64, ids: &ResolvedIds) -> Result<(), StoreError> {
        let mut tx =
            self.pool.begin().await.map_err(|error| StoreError::TransactionError {
                command: "BEGIN".to_owned(),
                error,
            })?;

        sqlx::query(
            r#"
INSERT INTO report_hits
    (id_msg, id_version, id_gpu, id_cpu, id_platform, id_config, hits)
VALUES
    ($1, $2, $3, $4, $5, $6, 1)
ON CONFLICT (id_msg, id_version, id_gpu, id_cpu, id_platform, id_config)
    DO UPDATE SET hits = report_hits.hits + 1
            "#,
        )
        .bind(id_msg)
        .bind(ids.id_version)
        .bind(ids.id_gpu)
        .bind(ids.id_cpu)
        .bind(ids.id_platform)
        .bind(ids.id_config)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
INSERT INTO report_message_versions (id_msg, id_version)
VALUES ($1, $2)
ON CONFLICT (id_msg, id_version)
    DO UPDATE SET latest_report = NOW()
            "#,
        )
        .bind(id_msg)
        .bind(ids.id_version)
        .execute(&mut *tx)
        .await?;

        tx.commit().await.map_err(|error| StoreError::TransactionError {
            command: "COMMIT".to_owned(),
            error,
        })
    }
}

/// The formatted text for the message tuple. Clients send the formatted
/// instance alongside the template; a template with no parameters arrives
/// with an empty value, in which case the template itself is the text.
fn formatted_message(report: &RawReport) -> &str {
    if report.value.is_empty() {
        &report.message
    } else {
        &report.value
    }
}
