pub const REPORTS_INGESTED: &str = "reports_ingested_total";
pub const REPORTS_DROPPED_BELOW_MIN_VERSION: &str = "reports_dropped_below_min_version_total";
pub const INGEST_TIME: &str = "report_ingest_time_seconds";
pub const RECENT_MESSAGES_TIME: &str = "recent_messages_query_time_seconds";
