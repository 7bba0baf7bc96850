use serde::Deserialize;

use crate::types::Status;

/// Wire-level filters for the recent-messages feed. Everything is optional
/// and free-form; `MessageQuery::from_filters` turns this into the
/// validated form the planner works with.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct MessageFilters {
    pub status: Option<String>,
    pub game_id: Option<i64>,
    pub version: Option<String>,
    pub message_kind_id: Option<i64>,
}

/// Status predicate after validation.
///
/// An unrecognized value deliberately falls back to the default predicate
/// instead of erroring, but is kept distinct from `Default` because it
/// counts as an explicit filter for strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    /// No status supplied: `status IN ('new', 'reoccurring')`.
    Default,
    /// Unrecognized value supplied: same predicate as `Default`.
    Fallback,
    /// "any": no status predicate at all.
    Any,
    /// A recognized explicit value: exact match.
    Only(Status),
}

impl StatusFilter {
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw {
            None => StatusFilter::Default,
            Some("any") => StatusFilter::Any,
            Some(s) => match s.parse::<Status>() {
                Ok(status) => StatusFilter::Only(status),
                Err(()) => StatusFilter::Fallback,
            },
        }
    }
}

/// Validated query for the recent-messages feed.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageQuery {
    pub status: StatusFilter,
    pub game_id: Option<i64>,
    pub version: Option<String>,
    pub message_kind_id: Option<i64>,
}

impl MessageQuery {
    pub fn from_filters(filters: &MessageFilters) -> Self {
        Self {
            status: StatusFilter::from_raw(filters.status.as_deref()),
            game_id: filters.game_id,
            version: filters.version.clone(),
            message_kind_id: filters.message_kind_id,
        }
    }
}

/// Execution strategy for the recent-messages feed, selected purely from
/// the validated query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecentStrategy {
    /// No selective predicate at all: restrict candidates to the last
    /// ~1000 message ids instead of scanning the whole fact table.
    RecencyWindow,
    /// A game filter is present: materialize a bounded candidate id set
    /// before the expensive joins (the game index alone is not selective
    /// enough once the joins pile on).
    Materialize,
    /// Apply the filters directly as join predicates, with the candidate
    /// ids bounded to the newest matches in SQL.
    DirectFilter,
}

impl RecentStrategy {
    pub fn select(query: &MessageQuery) -> Self {
        let unfiltered = query.game_id.is_none()
            && query.version.is_none()
            && query.message_kind_id.is_none();

        // Only the implicit default predicate (or none at all, via "any")
        // qualifies for the recency window. An explicit status value, even
        // an unrecognized one, is treated as a filter the caller asked for.
        if unfiltered
            && matches!(query.status, StatusFilter::Default | StatusFilter::Any)
        {
            RecentStrategy::RecencyWindow
        } else if query.game_id.is_some() {
            RecentStrategy::Materialize
        } else {
            RecentStrategy::DirectFilter
        }
    }
}
