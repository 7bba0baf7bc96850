use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::{debug, error};

use report_store::{
    CompatReport, GameCompat, KindSummary, MessageFilters, MessageSummary, RawReport, ReportStore,
};

#[derive(Serialize)]
pub struct ReportPostResponse {
    /// Message id the report collapsed into; null when the report was
    /// discarded by the minimum-version filter.
    message_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

type ErrorResponse = (StatusCode, Json<ReportPostResponse>);

/// Accepts one raw report. Below-minimum-version reports are accepted and
/// discarded, so old clients get no signal to retry on.
pub async fn post_report(
    State(store): State<ReportStore>,
    Json(payload): Json<RawReport>,
) -> Result<Json<ReportPostResponse>, ErrorResponse> {
    debug!(game = %payload.game, version = %payload.version, "received report");

    let message_id = store
        .ingest_report(&payload)
        .await
        .map_err(internal_error)?;

    Ok(Json(ReportPostResponse {
        message_id,
        error: None,
    }))
}

pub async fn get_recent_messages(
    State(store): State<ReportStore>,
    Query(filters): Query<MessageFilters>,
) -> Result<Json<Vec<MessageSummary>>, ErrorResponse> {
    let summaries = store
        .recent_messages(&filters)
        .await
        .map_err(internal_error)?;

    Ok(Json(summaries))
}

pub async fn get_kind_summary(
    State(store): State<ReportStore>,
    Query(filters): Query<MessageFilters>,
) -> Result<Json<Vec<KindSummary>>, ErrorResponse> {
    let kinds = store.kind_summary(&filters).await.map_err(internal_error)?;

    Ok(Json(kinds))
}

pub async fn get_game_compat(
    State(store): State<ReportStore>,
    Path(id_game): Path<i64>,
) -> Result<Json<GameCompat>, ErrorResponse> {
    match store.game_compat(id_game).await.map_err(internal_error)? {
        Some(compat) => Ok(Json(compat)),
        None => Err(not_found("unknown game")),
    }
}

pub async fn get_compat_reports(
    State(store): State<ReportStore>,
    Path(id_game): Path<i64>,
) -> Result<Json<Vec<CompatReport>>, ErrorResponse> {
    let reports = store
        .compat_reports(id_game)
        .await
        .map_err(internal_error)?;

    Ok(Json(reports))
}

fn not_found(msg: &str) -> ErrorResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ReportPostResponse {
            message_id: None,
            error: Some(msg.to_owned()),
        }),
    )
}

fn internal_error<E>(err: E) -> ErrorResponse
where
    E: std::error::Error,
{
    error!("internal error: {}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ReportPostResponse {
            message_id: None,
            error: Some(err.to_string()),
        }),
    )
}
