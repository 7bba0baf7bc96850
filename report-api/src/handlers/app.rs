use std::convert::Infallible;

use axum::{extract::DefaultBodyLimit, routing, Router};
use tower::limit::ConcurrencyLimitLayer;

use report_store::ReportStore;

use super::report;

pub fn add_routes(
    router: Router<ReportStore>,
    store: ReportStore,
    max_body_size: usize,
    concurrency_limit: usize,
) -> Router {
    router
        .route("/", routing::get(index))
        .route("/_readiness", routing::get(index))
        .route("/_liveness", routing::get(index)) // No background loop, just check axum health
        .route(
            "/report",
            routing::post(report::post_report)
                .layer::<_, Infallible>(ConcurrencyLimitLayer::new(concurrency_limit))
                .layer(DefaultBodyLimit::max(max_body_size)),
        )
        .route("/reports/recent", routing::get(report::get_recent_messages))
        .route("/reports/kinds", routing::get(report::get_kind_summary))
        .route("/games/:id_game/compat", routing::get(report::get_game_compat))
        .route(
            "/games/:id_game/compat/reports",
            routing::get(report::get_compat_reports),
        )
        .with_state(store)
}

pub async fn index() -> &'static str {
    "report api"
}
