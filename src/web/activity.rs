use crate::db::AnalyticsStore;
use crate::domain::models::{ActivityLog, SystemMetrics, UserRole};
use crate::middleware::ClientIp;
use crate::state::SharedState;
use crate::web::error::ApiError;
use crate::web::session::UserSession;
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

const DEFAULT_ACTIVITY_LIMIT: i64 = 50;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/activity", get(list_activity).post(create_activity))
        .route("/metrics", post(create_metrics))
        .route("/metrics/latest", get(latest_metrics))
        .with_state(state)
}

fn activity_entry(
    user_id: Uuid,
    user_type: UserRole,
    action: String,
    details: serde_json::Value,
    client_ip: &ClientIp,
    headers: &HeaderMap,
) -> ActivityLog {
    ActivityLog {
        id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        user_type,
        action,
        details,
        ip_address: Some(client_ip.0.clone()),
        user_agent: headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        timestamp: Utc::now(),
    }
}

/// Stores an audit entry. Failures are logged and otherwise ignored.
pub async fn record_activity(
    store: &dyn AnalyticsStore,
    user_id: Uuid,
    user_type: UserRole,
    action: &str,
    details: serde_json::Value,
    client_ip: &ClientIp,
    headers: &HeaderMap,
) {
    let log = activity_entry(user_id, user_type, action.to_string(), details, client_ip, headers);
    if let Err(e) = store.save_activity(&log).await {
        tracing::warn!("Failed to record '{}' activity for {}: {:?}", action, user_id, e);
    }
}

#[derive(Deserialize)]
struct ActivityRequest {
    action: Option<String>,
    #[serde(default)]
    details: serde_json::Value,
}

async fn create_activity(
    State(state): State<SharedState>,
    session: UserSession,
    client_ip: ClientIp,
    headers: HeaderMap,
    Json(payload): Json<ActivityRequest>,
) -> Result<StatusCode, ApiError> {
    let action = payload
        .action
        .filter(|a| !a.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("action is required"))?;
    let details = if payload.details.is_null() {
        serde_json::json!({})
    } else {
        payload.details
    };
    let log = activity_entry(session.user_id, session.role, action, details, &client_ip, &headers);
    state.analytics.save_activity(&log).await?;
    Ok(StatusCode::CREATED)
}

#[derive(Deserialize)]
struct ActivityQuery {
    user_id: Option<String>,
    limit: Option<i64>,
}

async fn list_activity(
    State(state): State<SharedState>,
    session: UserSession,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<Vec<ActivityLog>>, ApiError> {
    let own = session.user_id.to_string();
    // non-admins only ever see their own trail
    let user_id = match session.role {
        UserRole::Admin => query.user_id,
        _ => {
            if query.user_id.as_deref().is_some_and(|u| u != own) {
                return Err(ApiError::Forbidden("not allowed for this user".into()));
            }
            Some(own)
        }
    };
    let limit = query.limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT).clamp(1, 500);
    let logs = state
        .analytics
        .activity_logs(user_id.as_deref(), limit)
        .await?;
    Ok(Json(logs))
}

async fn create_metrics(
    State(state): State<SharedState>,
    session: UserSession,
    Json(metrics): Json<SystemMetrics>,
) -> Result<StatusCode, ApiError> {
    session.require_role(&[UserRole::Admin])?;
    state.analytics.save_metrics(&metrics).await?;
    Ok(StatusCode::CREATED)
}

async fn latest_metrics(
    State(state): State<SharedState>,
    session: UserSession,
) -> Result<Json<SystemMetrics>, ApiError> {
    session.require_role(&[UserRole::Admin])?;
    state
        .analytics
        .latest_metrics()
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("no metrics recorded"))
}
