//! # report-store
//!
//! Core library for the game crash/compat report service: canonical
//! entity resolution, deduplicating ingestion, and the adaptive
//! recent-messages retrieval planner, all backed by PostgreSQL.

mod compat;
mod ingest;
mod recent;
mod store;

pub mod error;
pub mod filters;
pub mod metrics_consts;
pub mod resolve;
pub mod types;
pub mod version;

pub use error::StoreError;
pub use filters::{MessageFilters, MessageQuery, RecentStrategy, StatusFilter};
pub use recent::{aggregate, KIND_LIST_LIMIT, MESSAGE_LIST_LIMIT, RECENCY_WINDOW};
pub use store::ReportStore;
pub use types::{
    CompatReport, GameCompat, KindSummary, MessageRow, MessageSummary, RawReport, Status,
};
