use crate::db::{AnalyticsStore, ProfileStore};
use crate::domain::models::SystemMetrics;
use crate::middleware::RequestMetrics;
use anyhow::Result;
use chrono::{Duration, Utc};
use uuid::Uuid;

/// Builds a snapshot covering the last `window` and stores it.
///
/// Request figures come from the in-process counters, which are reset by
/// this call. Availability is reported as the share of non-5xx responses.
pub async fn record_snapshot(
    profiles: &dyn ProfileStore,
    analytics: &dyn AnalyticsStore,
    requests: &RequestMetrics,
    window: Duration,
) -> Result<SystemMetrics> {
    let now = Utc::now();
    let since = now - window;
    let sample = requests.take_window();

    let snapshot = SystemMetrics {
        id: Uuid::new_v4(),
        timestamp: now,
        active_users: analytics.distinct_active_users_since(since).await?,
        new_registrations: profiles.count_profiles_since(since).await?,
        completed_sessions: profiles.count_completed_sessions_since(since).await?,
        chatbot_interactions: analytics.count_conversations_since(since).await?,
        system_uptime: 100.0 - sample.error_rate,
        response_time_ms: sample.mean_latency_ms,
        error_rate: sample.error_rate,
        database_connections: i64::from(profiles.connection_count()),
        memory_usage_percent: None,
        cpu_usage_percent: None,
    };

    analytics.save_metrics(&snapshot).await?;
    tracing::info!(
        "Recorded metrics snapshot: {} requests, {:.2}% errors, {} active users",
        sample.requests,
        snapshot.error_rate,
        snapshot.active_users
    );
    Ok(snapshot)
}
