//! The recent-messages feed: strategy planning, query construction and
//! row aggregation.
//!
//! The fact table (`report_messages`) is append-only and large, so the
//! planner picks an execution strategy from the validated filter set
//! before touching it. See `RecentStrategy` for the selection rules.

use std::time::Instant;

use sqlx::{Postgres, QueryBuilder};
use tracing::debug;

use crate::error::StoreError;
use crate::filters::{MessageFilters, MessageQuery, RecentStrategy, StatusFilter};
use crate::metrics_consts::RECENT_MESSAGES_TIME;
use crate::store::ReportStore;
use crate::types::{KindSummary, MessageRow, MessageSummary};

/// Cap on aggregated message summaries per response.
pub const MESSAGE_LIST_LIMIT: usize = 100;
/// Cap on kind summary rows per response.
pub const KIND_LIST_LIMIT: i64 = 1000;
/// Candidate id range for the recency-window strategy. A heuristic, not a
/// correctness requirement: with no selective predicate, only the newest
/// slice of the table is worth looking at.
pub const RECENCY_WINDOW: i64 = 1000;
/// Candidate set bound for the materialization and direct-filter
/// strategies.
const CANDIDATE_LIMIT: i64 = 100;

/// Tracks whether a WHERE clause has been opened yet, so predicates can be
/// appended from multiple places without caring which one goes first.
struct WhereSep {
    started: bool,
}

impl WhereSep {
    fn new() -> Self {
        Self { started: false }
    }

    fn next(&mut self) -> &'static str {
        if self.started {
            " AND "
        } else {
            self.started = true;
            " WHERE "
        }
    }
}

/// Predicates on the fact table itself (status, game, kind). These are
/// safe in the joined query, the candidate materialization, and the
/// candidate subquery, which address the fact table under different
/// aliases.
fn push_message_predicates(
    qb: &mut QueryBuilder<'_, Postgres>,
    sep: &mut WhereSep,
    query: &MessageQuery,
    alias: &str,
) {
    match query.status {
        StatusFilter::Any => {}
        // Enum labels, not user input.
        StatusFilter::Default | StatusFilter::Fallback => {
            qb.push(sep.next());
            qb.push(format!("{alias}.status IN ('new', 'reoccurring')"));
        }
        StatusFilter::Only(status) => {
            qb.push(sep.next());
            qb.push(format!("{alias}.status = "));
            qb.push_bind(status);
        }
    }

    if let Some(game_id) = query.game_id {
        qb.push(sep.next());
        qb.push(format!("{alias}.id_game = "));
        qb.push_bind(game_id);
    }

    if let Some(kind_id) = query.message_kind_id {
        qb.push(sep.next());
        qb.push(format!("{alias}.id_msg_kind = "));
        qb.push_bind(kind_id);
    }
}

/// Builds the joined query whose rows feed the aggregator. One row per
/// (message, version) pair, newest message first. With `bound_candidates`
/// the matched ids are restricted to the newest `CANDIDATE_LIMIT` via a
/// limited subquery, so an unselective filter can't pull the whole fact
/// table through the joins.
fn joined_query<'q>(
    query: &'q MessageQuery,
    extra_join: Option<&str>,
    min_id_msg: Option<i64>,
    bound_candidates: bool,
) -> QueryBuilder<'q, Postgres> {
    let mut qb = QueryBuilder::new(
        r#"
SELECT
    m.id_msg, m.id_game, g.title AS game_title, mv.id_version,
    v.title AS version, m.id_msg_kind, m.formatted_message AS message,
    mk.message AS message_template, mv.latest_report
FROM report_messages AS m
        "#,
    );
    if let Some(join) = extra_join {
        qb.push(join);
    }
    qb.push(
        r#"
    INNER JOIN games AS g USING (id_game)
    INNER JOIN report_message_kinds AS mk USING (id_msg_kind)
    INNER JOIN report_message_versions AS mv USING (id_msg)
    INNER JOIN versions AS v ON v.id_version = mv.id_version
        "#,
    );

    let mut sep = WhereSep::new();
    push_message_predicates(&mut qb, &mut sep, query, "m");
    // The version predicate needs the versions join, so it never goes into
    // the candidate materialization.
    if let Some(version) = &query.version {
        qb.push(sep.next());
        qb.push("v.title = ");
        qb.push_bind(version);
    }
    if let Some(min_id) = min_id_msg {
        qb.push(sep.next());
        qb.push("m.id_msg > ");
        qb.push_bind(min_id);
    }
    if bound_candidates {
        push_candidate_bound(&mut qb, &mut sep, query);
    }

    qb.push(" ORDER BY m.id_msg DESC");
    qb
}

/// Restricts the joined query to the newest `CANDIDATE_LIMIT` message ids
/// that match the filters. The subquery joins the version tables only when
/// a version filter is present; (id_msg, id_version) is unique and a title
/// matches one version, so the limit counts distinct messages.
fn push_candidate_bound<'q>(
    qb: &mut QueryBuilder<'q, Postgres>,
    sep: &mut WhereSep,
    query: &'q MessageQuery,
) {
    qb.push(sep.next());
    qb.push("m.id_msg IN (SELECT cm.id_msg FROM report_messages AS cm");
    if query.version.is_some() {
        qb.push(
            r#"
    INNER JOIN report_message_versions AS cmv USING (id_msg)
    INNER JOIN versions AS cv ON cv.id_version = cmv.id_version
            "#,
        );
    }

    let mut inner = WhereSep::new();
    push_message_predicates(qb, &mut inner, query, "cm");
    if let Some(version) = &query.version {
        qb.push(inner.next());
        qb.push("cv.title = ");
        qb.push_bind(version);
    }

    qb.push(" ORDER BY cm.id_msg DESC LIMIT ");
    qb.push_bind(CANDIDATE_LIMIT);
    qb.push(")");
}

/// Folds joined rows (ordered by id_msg descending) into per-message
/// summaries: the maximum version title among a message's rows wins, along
/// with the newest report timestamp. Rows for one message are adjacent, so
/// the fold can stop as soon as the limit would be exceeded by a new
/// message.
pub fn aggregate(rows: Vec<MessageRow>, limit: usize) -> Vec<MessageSummary> {
    let mut summaries: Vec<MessageSummary> = Vec::new();

    for row in rows {
        match summaries.last_mut() {
            Some(last) if last.id_msg == row.id_msg => {
                if row.version > last.version {
                    last.version = row.version;
                    last.id_version = row.id_version;
                }
                if row.latest_report > last.latest_report {
                    last.latest_report = row.latest_report;
                }
            }
            _ => {
                if summaries.len() == limit {
                    break;
                }
                summaries.push(MessageSummary {
                    id_msg: row.id_msg,
                    id_game: row.id_game,
                    game_title: row.game_title,
                    id_version: row.id_version,
                    version: row.version,
                    id_msg_kind: row.id_msg_kind,
                    message: row.message,
                    message_template: row.message_template,
                    latest_report: row.latest_report,
                });
            }
        }
    }

    summaries
}

impl ReportStore {
    /// Serves the recent-messages feed: picks a strategy for the filter
    /// set, fetches the joined rows, and aggregates them per message.
    /// Never returns more than `MESSAGE_LIST_LIMIT` summaries.
    pub async fn recent_messages(
        &self,
        filters: &MessageFilters,
    ) -> Result<Vec<MessageSummary>, StoreError> {
        let query = MessageQuery::from_filters(filters);
        let strategy = RecentStrategy::select(&query);
        debug!(?strategy, "serving recent messages");

        let start_time = Instant::now();
        let rows = match strategy {
            RecentStrategy::RecencyWindow => self.fetch_recency_window(&query).await?,
            RecentStrategy::Materialize => self.fetch_materialized(&query).await?,
            RecentStrategy::DirectFilter => {
                joined_query(&query, None, None, true)
                    .build_query_as::<MessageRow>()
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let labels = [("strategy", strategy.label().to_string())];
        metrics::histogram!(RECENT_MESSAGES_TIME, &labels)
            .record(start_time.elapsed().as_secs_f64());

        Ok(aggregate(rows, MESSAGE_LIST_LIMIT))
    }

    async fn fetch_recency_window(
        &self,
        query: &MessageQuery,
    ) -> Result<Vec<MessageRow>, StoreError> {
        let max_id: Option<i64> = sqlx::query_scalar("SELECT MAX(id_msg) FROM report_messages")
            .fetch_one(&self.pool)
            .await?;
        let min_id = max_id.unwrap_or(0) - RECENCY_WINDOW;

        Ok(joined_query(query, None, Some(min_id), false)
            .build_query_as::<MessageRow>()
            .fetch_all(&self.pool)
            .await?)
    }

    /// Pre-filters a bounded candidate id set into a connection-scoped
    /// working table, then joins the expensive lookup tables only against
    /// that set. All statements run on one explicitly acquired connection:
    /// the working table is session state.
    async fn fetch_materialized(
        &self,
        query: &MessageQuery,
    ) -> Result<Vec<MessageRow>, StoreError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|error| StoreError::ConnectionError { error })?;

        // The connection comes back from the pool in an unknown state; an
        // aborted request may have left its working set behind. Reset
        // unconditionally.
        sqlx::query("DROP TABLE IF EXISTS pg_temp.temp_messages")
            .execute(&mut *conn)
            .await?;
        sqlx::query("CREATE TEMPORARY TABLE temp_messages (id_msg BIGINT PRIMARY KEY)")
            .execute(&mut *conn)
            .await?;

        let mut candidates = QueryBuilder::<Postgres>::new(
            "INSERT INTO temp_messages SELECT m.id_msg FROM report_messages AS m",
        );
        let mut sep = WhereSep::new();
        push_message_predicates(&mut candidates, &mut sep, query, "m");
        candidates.push(" ORDER BY m.id_msg DESC LIMIT ");
        candidates.push_bind(CANDIDATE_LIMIT);
        candidates.build().execute(&mut *conn).await?;

        let rows = joined_query(
            query,
            Some(" INNER JOIN temp_messages USING (id_msg)"),
            None,
            false,
        )
        .build_query_as::<MessageRow>()
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows)
    }

    /// Message kinds with the exact count of distinct games exhibiting
    /// each, newest kind first. Only the status filter applies; capped at
    /// `KIND_LIST_LIMIT` rows.
    pub async fn kind_summary(
        &self,
        filters: &MessageFilters,
    ) -> Result<Vec<KindSummary>, StoreError> {
        let status = StatusFilter::from_raw(filters.status.as_deref());

        let mut qb = QueryBuilder::<Postgres>::new(
            r#"
SELECT mk.id_msg_kind, mk.message, COUNT(DISTINCT m.id_game) AS games
FROM report_message_kinds AS mk
    INNER JOIN report_messages AS m USING (id_msg_kind)
            "#,
        );
        match status {
            StatusFilter::Any => {}
            StatusFilter::Default | StatusFilter::Fallback => {
                qb.push(" WHERE m.status IN ('new', 'reoccurring')");
            }
            StatusFilter::Only(status) => {
                qb.push(" WHERE m.status = ");
                qb.push_bind(status);
            }
        }
        qb.push(" GROUP BY mk.id_msg_kind, mk.message ORDER BY mk.id_msg_kind DESC LIMIT ");
        qb.push_bind(KIND_LIST_LIMIT);

        Ok(qb
            .build_query_as::<KindSummary>()
            .fetch_all(&self.pool)
            .await?)
    }
}

impl RecentStrategy {
    fn label(self) -> &'static str {
        match self {
            RecentStrategy::RecencyWindow => "recency_window",
            RecentStrategy::Materialize => "materialize",
            RecentStrategy::DirectFilter => "direct_filter",
        }
    }
}
