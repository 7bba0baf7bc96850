use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Version titles are truncated to this length before resolution, so a
/// garbage submission cannot create unbounded natural keys.
pub const VERSION_TITLE_LENGTH: usize = 32;

/// Moderation status attached to a message. Mutated by the moderation flow
/// (not part of this service), read by the retrieval filters.
#[derive(Debug, Deserialize, Serialize, sqlx::Type, Copy, Clone, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "report_status", rename_all = "lowercase")]
pub enum Status {
    New,
    Reoccurring,
    Resolved,
}

impl FromStr for Status {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Status::New),
            "reoccurring" => Ok(Status::Reoccurring),
            "resolved" => Ok(Status::Resolved),
            _ => Err(()),
        }
    }
}

/// A raw crash/compat report as submitted by a client. Everything here is
/// free-form text until the resolvers canonicalize it.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct RawReport {
    /// Game identifier, e.g. a disc/serial id.
    pub game: String,
    #[serde(default)]
    pub game_title: String,
    pub version: String,
    #[serde(default)]
    pub gpu: String,
    /// Secondary full GPU name, used to disambiguate short names.
    #[serde(default)]
    pub gpu_full: String,
    #[serde(default)]
    pub cpu: String,
    #[serde(default)]
    pub platform: String,
    /// The message template, e.g. "Unknown GE command %08x".
    pub message: String,
    /// The formatted instance of the template for this report.
    #[serde(default)]
    pub value: String,
    /// Environment attribute bundle, normalized into a Config entity.
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
}

/// The canonical ids resolved from one raw report. All of these are
/// resolved concurrently; message resolution joins on the full set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedIds {
    pub id_version: i64,
    pub id_gpu: i64,
    pub id_cpu: i64,
    pub id_platform: i64,
    pub id_game: i64,
    pub id_config: i64,
    pub id_msg_kind: i64,
}

/// One joined row of the recent-messages query, before aggregation.
/// A message appears once per version it was reported under.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MessageRow {
    pub id_msg: i64,
    pub id_game: i64,
    pub game_title: String,
    pub id_version: i64,
    pub version: String,
    pub id_msg_kind: i64,
    pub message: String,
    pub message_template: String,
    pub latest_report: DateTime<Utc>,
}

/// Aggregated per-message view served by the recent-messages feed.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MessageSummary {
    pub id_msg: i64,
    pub id_game: i64,
    pub game_title: String,
    /// Maximum version title among the rows for this message, and its id.
    pub id_version: i64,
    pub version: String,
    pub id_msg_kind: i64,
    pub message: String,
    pub message_template: String,
    pub latest_report: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct KindSummary {
    pub id_msg_kind: i64,
    pub message: String,
    /// Count of distinct games exhibiting this kind.
    pub games: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GameCompat {
    pub id_game: i64,
    pub title: String,
    pub compat: Option<String>,
    pub compat_ident: Option<String>,
    pub overall_stars: Option<i32>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CompatReport {
    pub compat: Option<String>,
    pub compat_ident: Option<String>,
    pub cpu: String,
    pub gpu: String,
    pub platform: String,
    pub version: String,
    pub latest_report: DateTime<Utc>,
    pub graphics_stars: i32,
    pub speed_stars: i32,
    pub gameplay_stars: i32,
}
