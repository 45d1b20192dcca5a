mod analytics;
mod config;
mod db;
mod domain;
mod middleware;
mod services;
mod state;
mod web;

use crate::config::Config;
use crate::db::{seed, AnalyticsStore, PgDocumentStore, PgProfileStore, ProfileStore};
use crate::middleware::{request_metrics, RateLimiter, RequestMetrics};
use crate::services::chat::OpenAiRelay;
use crate::state::SharedState;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Login attempts allowed per client address per window.
const LOGIN_ATTEMPTS: usize = 5;
const LOGIN_WINDOW_SECS: u64 = 60;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    tracing::info!("Running database migrations...");
    let mut migrator = sqlx::migrate!("./migrations/relational");
    migrator.set_ignore_missing(true);
    migrator.run(&pool).await.map_err(|e| {
        tracing::error!("Failed to run database migrations: {}", e);
        e
    })?;
    tracing::info!("Database migrations completed");

    let profiles: Arc<dyn ProfileStore> = Arc::new(PgProfileStore::new(pool));
    // connects lazily on first use
    let analytics: Arc<dyn AnalyticsStore> =
        Arc::new(PgDocumentStore::new(config.analytics_database_url.clone()));

    if config.seed_demo_data {
        let created = seed::seed_demo_users(profiles.as_ref()).await?;
        tracing::info!("Seeded {} demo users", created);
    }

    let relay = Arc::new(OpenAiRelay::new(
        config.openai_api_key.clone(),
        config.chat_model.clone(),
    ));

    let metrics = RequestMetrics::default();
    let shared: SharedState = Arc::new(state::AppState {
        profiles,
        analytics,
        relay,
        session_key: config.session_key.clone(),
        session_ttl: chrono::Duration::hours(config.session_ttl_hours),
        login_limiter: RateLimiter::new(LOGIN_ATTEMPTS, LOGIN_WINDOW_SECS),
        trusted_proxies: config.trusted_proxies.clone(),
        request_metrics: metrics.clone(),
    });

    let scheduler = JobScheduler::new().await?;

    let shared_for_snapshot = shared.clone();
    scheduler
        .add(Job::new_async(config.metrics_snapshot_cron.as_str(), move |_uuid, _l| {
            let state = shared_for_snapshot.clone();
            Box::pin(async move {
                if let Err(e) = crate::analytics::snapshot::record_snapshot(
                    state.profiles.as_ref(),
                    state.analytics.as_ref(),
                    &state.request_metrics,
                    chrono::Duration::hours(1),
                )
                .await
                {
                    tracing::error!("Failed to record metrics snapshot: {:?}", e);
                }
            })
        })?)
        .await?;

    let shared_for_cleanup = shared.clone();
    scheduler
        .add(Job::new_async("0 0 * * * *", move |_uuid, _l| {
            let state = shared_for_cleanup.clone();
            Box::pin(async move {
                state.login_limiter.cleanup().await;
            })
        })?)
        .await?;

    scheduler.start().await?;
    tracing::info!("Scheduler started:");
    tracing::info!("  - Metrics snapshot: {}", config.metrics_snapshot_cron);
    tracing::info!("  - Rate limiter cleanup: hourly");

    let app = web::routes(shared.clone())
        .layer(axum::middleware::from_fn_with_state(metrics, request_metrics::track))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped, closing document store");
    shared.analytics.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
