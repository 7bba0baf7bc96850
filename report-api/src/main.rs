use axum::Router;
use config::Config;
use envconfig::Envconfig;
use eyre::Result;

use report_store::version::version_value;
use report_store::ReportStore;

mod config;
mod handlers;
mod metrics;

async fn listen(app: Router, bind: String) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;

    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::init_from_env().expect("failed to load configuration from env");

    let min_version_value = config.min_version.as_deref().map(version_value);

    let store = ReportStore::connect(
        &config.database_url,
        config.max_pg_connections,
        min_version_value,
    )
    .await
    .expect("failed to initialize report store");

    let app = handlers::add_routes(
        Router::new(),
        store,
        config.max_body_size,
        config.concurrency_limit,
    );
    let app = metrics::setup_metrics_routes(app);

    match listen(app, config.bind()).await {
        Ok(_) => {}
        Err(e) => tracing::error!("failed to start report-api http server, {}", e),
    }
}
