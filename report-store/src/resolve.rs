//! Canonical entity resolvers.
//!
//! Every resolver is an idempotent lookup-or-create: look the natural key
//! up, insert it if unseen, and if the insert loses a race against another
//! request (unique violation), re-run the lookup and return the winning
//! id. The store's uniqueness constraints are the source of truth; no
//! in-process coordination is involved.

use common_database::is_unique_violation;
use sqlx::PgPool;

use crate::error::StoreError;
use crate::types::{ResolvedIds, VERSION_TITLE_LENGTH};
use crate::version::version_value;

pub async fn version_id(pool: &PgPool, title: &str) -> Result<i64, StoreError> {
    let title: String = title.chars().take(VERSION_TITLE_LENGTH).collect();
    let id: Option<i64> = sqlx::query_scalar("SELECT id_version FROM versions WHERE title = $1")
        .bind(&title)
        .fetch_optional(pool)
        .await?;
    if let Some(id) = id {
        return Ok(id);
    }

    let insert =
        sqlx::query_scalar("INSERT INTO versions (title, value) VALUES ($1, $2) RETURNING id_version")
            .bind(&title)
            .bind(version_value(&title))
            .fetch_one(pool)
            .await;
    match insert {
        Ok(id) => Ok(id),
        Err(error) if is_unique_violation(&error) => {
            Ok(sqlx::query_scalar("SELECT id_version FROM versions WHERE title = $1")
                .bind(&title)
                .fetch_one(pool)
                .await?)
        }
        Err(error) => Err(error.into()),
    }
}

/// GPU resolution also consumes the full device name. It is stored on
/// first sight and back-filled onto an existing row that doesn't have one
/// yet; a row with a full name is never overwritten.
pub async fn gpu_id(pool: &PgPool, short_desc: &str, long_desc: &str) -> Result<i64, StoreError> {
    let existing: Option<(i64, String)> =
        sqlx::query_as("SELECT id_gpu, long_desc FROM gpus WHERE short_desc = $1")
            .bind(short_desc)
            .fetch_optional(pool)
            .await?;
    if let Some((id, stored_long)) = existing {
        if stored_long.is_empty() && !long_desc.is_empty() {
            sqlx::query("UPDATE gpus SET long_desc = $1 WHERE id_gpu = $2 AND long_desc = ''")
                .bind(long_desc)
                .bind(id)
                .execute(pool)
                .await?;
        }
        return Ok(id);
    }

    let insert = sqlx::query_scalar(
        "INSERT INTO gpus (short_desc, long_desc) VALUES ($1, $2) RETURNING id_gpu",
    )
    .bind(short_desc)
    .bind(long_desc)
    .fetch_one(pool)
    .await;
    match insert {
        Ok(id) => Ok(id),
        Err(error) if is_unique_violation(&error) => {
            Ok(sqlx::query_scalar("SELECT id_gpu FROM gpus WHERE short_desc = $1")
                .bind(short_desc)
                .fetch_one(pool)
                .await?)
        }
        Err(error) => Err(error.into()),
    }
}

pub async fn cpu_id(pool: &PgPool, summary: &str) -> Result<i64, StoreError> {
    let id: Option<i64> = sqlx::query_scalar("SELECT id_cpu FROM cpus WHERE summary = $1")
        .bind(summary)
        .fetch_optional(pool)
        .await?;
    if let Some(id) = id {
        return Ok(id);
    }

    let insert = sqlx::query_scalar("INSERT INTO cpus (summary) VALUES ($1) RETURNING id_cpu")
        .bind(summary)
        .fetch_one(pool)
        .await;
    match insert {
        Ok(id) => Ok(id),
        Err(error) if is_unique_violation(&error) => {
            Ok(sqlx::query_scalar("SELECT id_cpu FROM cpus WHERE summary = $1")
                .bind(summary)
                .fetch_one(pool)
                .await?)
        }
        Err(error) => Err(error.into()),
    }
}

pub async fn platform_id(pool: &PgPool, title: &str) -> Result<i64, StoreError> {
    let id: Option<i64> = sqlx::query_scalar("SELECT id_platform FROM platforms WHERE title = $1")
        .bind(title)
        .fetch_optional(pool)
        .await?;
    if let Some(id) = id {
        return Ok(id);
    }

    let insert =
        sqlx::query_scalar("INSERT INTO platforms (title) VALUES ($1) RETURNING id_platform")
            .bind(title)
            .fetch_one(pool)
            .await;
    match insert {
        Ok(id) => Ok(id),
        Err(error) if is_unique_violation(&error) => Ok(sqlx::query_scalar(
            "SELECT id_platform FROM platforms WHERE title = $1",
        )
        .bind(title)
        .fetch_one(pool)
        .await?),
        Err(error) => Err(error.into()),
    }
}

pub async fn game_id(pool: &PgPool, identifier: &str, title: &str) -> Result<i64, StoreError> {
    let id: Option<i64> = sqlx::query_scalar("SELECT id_game FROM games WHERE identifier = $1")
        .bind(identifier)
        .fetch_optional(pool)
        .await?;
    if let Some(id) = id {
        return Ok(id);
    }

    let insert = sqlx::query_scalar(
        "INSERT INTO games (identifier, title) VALUES ($1, $2) RETURNING id_game",
    )
    .bind(identifier)
    .bind(title)
    .fetch_one(pool)
    .await;
    match insert {
        Ok(id) => Ok(id),
        Err(error) if is_unique_violation(&error) => {
            Ok(sqlx::query_scalar("SELECT id_game FROM games WHERE identifier = $1")
                .bind(identifier)
                .fetch_one(pool)
                .await?)
        }
        Err(error) => Err(error.into()),
    }
}

pub async fn message_kind_id(pool: &PgPool, message: &str) -> Result<i64, StoreError> {
    let id: Option<i64> =
        sqlx::query_scalar("SELECT id_msg_kind FROM report_message_kinds WHERE message = $1")
            .bind(message)
            .fetch_optional(pool)
            .await?;
    if let Some(id) = id {
        return Ok(id);
    }

    let insert = sqlx::query_scalar(
        "INSERT INTO report_message_kinds (message) VALUES ($1) RETURNING id_msg_kind",
    )
    .bind(message)
    .fetch_one(pool)
    .await;
    match insert {
        Ok(id) => Ok(id),
        Err(error) if is_unique_violation(&error) => Ok(sqlx::query_scalar(
            "SELECT id_msg_kind FROM report_message_kinds WHERE message = $1",
        )
        .bind(message)
        .fetch_one(pool)
        .await?),
        Err(error) => Err(error.into()),
    }
}

/// The config bundle is keyed by its whole normalized value; jsonb
/// comparison ignores key order, so equal bundles collapse regardless of
/// how the client serialized them.
pub async fn config_id(
    pool: &PgPool,
    settings: &serde_json::Map<String, serde_json::Value>,
) -> Result<i64, StoreError> {
    let settings = sqlx::types::Json(settings);
    let id: Option<i64> =
        sqlx::query_scalar("SELECT id_config FROM report_configs WHERE settings = $1")
            .bind(&settings)
            .fetch_optional(pool)
            .await?;
    if let Some(id) = id {
        return Ok(id);
    }

    let insert = sqlx::query_scalar(
        "INSERT INTO report_configs (settings) VALUES ($1) RETURNING id_config",
    )
    .bind(&settings)
    .fetch_one(pool)
    .await;
    match insert {
        Ok(id) => Ok(id),
        Err(error) if is_unique_violation(&error) => Ok(sqlx::query_scalar(
            "SELECT id_config FROM report_configs WHERE settings = $1",
        )
        .bind(&settings)
        .fetch_one(pool)
        .await?),
        Err(error) => Err(error.into()),
    }
}

const MESSAGE_SELECT: &str = r#"
SELECT id_msg
FROM report_messages
WHERE
    id_version = $1 AND id_gpu = $2 AND id_cpu = $3 AND id_platform = $4
    AND id_game = $5 AND id_config = $6 AND id_msg_kind = $7
    AND formatted_message = $8
"#;

/// Resolves the Message row for the full dedup tuple. This is the join
/// barrier of ingestion: it requires every other id to be resolved first.
pub async fn message_id(
    pool: &PgPool,
    ids: &ResolvedIds,
    formatted_message: &str,
) -> Result<i64, StoreError> {
    let id: Option<i64> = sqlx::query_scalar(MESSAGE_SELECT)
        .bind(ids.id_version)
        .bind(ids.id_gpu)
        .bind(ids.id_cpu)
        .bind(ids.id_platform)
        .bind(ids.id_game)
        .bind(ids.id_config)
        .bind(ids.id_msg_kind)
        .bind(formatted_message)
        .fetch_optional(pool)
        .await?;
    if let Some(id) = id {
        return Ok(id);
    }

    let insert = sqlx::query_scalar(
        r#"
INSERT INTO report_messages
    (id_version, id_gpu, id_cpu, id_platform, id_game, id_config, id_msg_kind, formatted_message)
VALUES
    ($1, $2, $3, $4, $5, $6, $7, $8)
RETURNING id_msg
        "#,
    )
    .bind(ids.id_version)
    .bind(ids.id_gpu)
    .bind(ids.id_cpu)
    .bind(ids.id_platform)
    .bind(ids.id_game)
    .bind(ids.id_config)
    .bind(ids.id_msg_kind)
    .bind(formatted_message)
    .fetch_one(pool)
    .await;
    match insert {
        Ok(id) => Ok(id),
        Err(error) if is_unique_violation(&error) => Ok(sqlx::query_scalar(MESSAGE_SELECT)
            .bind(ids.id_version)
            .bind(ids.id_gpu)
            .bind(ids.id_cpu)
            .bind(ids.id_platform)
            .bind(ids.id_game)
            .bind(ids.id_config)
            .bind(ids.id_msg_kind)
            .bind(formatted_message)
            .fetch_one(pool)
            .await?),
        Err(error) => Err(error.into()),
    }
}
