//! Per-game compatibility reads. No planning logic here, just direct
//! filtered joins.

use crate::error::StoreError;
use crate::store::ReportStore;
use crate::types::{CompatReport, GameCompat};

impl ReportStore {
    /// Overall compatibility for one game: rating title/identifier and
    /// star total, or None for an unknown game.
    pub async fn game_compat(&self, id_game: i64) -> Result<Option<GameCompat>, StoreError> {
        Ok(sqlx::query_as(
            r#"
SELECT
    g.id_game, g.title, cmpr.title AS compat, cmpr.identifier AS compat_ident,
    cmp.overall_stars
FROM games AS g
    LEFT JOIN compatibility AS cmp USING (id_game)
    LEFT JOIN compat_ratings AS cmpr USING (id_compat_rating)
WHERE g.id_game = $1
LIMIT 1
            "#,
        )
        .bind(id_game)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// Individual compatibility reports for one game, newest first.
    pub async fn compat_reports(&self, id_game: i64) -> Result<Vec<CompatReport>, StoreError> {
        Ok(sqlx::query_as(
            r#"
SELECT
    cmpr.title AS compat, cmpr.identifier AS compat_ident, cpu.summary AS cpu,
    gpu.short_desc AS gpu, p.title AS platform, v.title AS version,
    rcmp.latest_report, rcmp.graphics_stars, rcmp.speed_stars, rcmp.gameplay_stars
FROM report_compatibility AS rcmp
    LEFT JOIN compat_ratings AS cmpr USING (id_compat_rating)
    INNER JOIN cpus AS cpu USING (id_cpu)
    INNER JOIN gpus AS gpu USING (id_gpu)
    INNER JOIN platforms AS p USING (id_platform)
    INNER JOIN versions AS v USING (id_version)
WHERE rcmp.id_game = $1
ORDER BY rcmp.latest_report DESC
            "#,
        )
        .bind(id_game)
        .fetch_all(&self.pool)
        .await?)
    }
}
