use crate::analytics::{build_report, Report, ReportError, ReportKind};
use crate::state::SharedState;
use crate::web::error::ApiError;
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const DEFAULT_DAYS: i64 = 7;
const MAX_DAYS: i64 = 36_500;

#[derive(Deserialize)]
struct AnalyticsQuery {
    #[serde(rename = "type")]
    kind: Option<String>,
    days: Option<String>,
    user_id: Option<String>,
}

#[derive(Serialize)]
struct AnalyticsResponse {
    success: bool,
    #[serde(rename = "type")]
    kind: &'static str,
    period_days: i64,
    generated_at: DateTime<Utc>,
    analytics: Report,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/analytics", get(analytics))
        .with_state(state)
}

fn parse_days(raw: Option<&str>) -> Result<i64, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(DEFAULT_DAYS),
        Some(s) => s
            .parse::<i64>()
            .ok()
            .filter(|d| (0..=MAX_DAYS).contains(d))
            .ok_or_else(|| {
                ApiError::bad_request(format!("days must be an integer between 0 and {MAX_DAYS}"))
            }),
    }
}

async fn analytics(
    State(state): State<SharedState>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<AnalyticsResponse>, ApiError> {
    // validation happens before any store is touched
    let kind: ReportKind = query
        .kind
        .as_deref()
        .unwrap_or("overview")
        .parse()
        .map_err(|_| ApiError::bad_request(ReportError::InvalidType.to_string()))?;
    let days = parse_days(query.days.as_deref())?;
    let user_id = query.user_id.as_deref().filter(|u| !u.is_empty());

    let report = build_report(
        kind,
        days,
        user_id,
        state.profiles.as_ref(),
        state.analytics.as_ref(),
    )
    .await
    .map_err(|e| match e {
        ReportError::InvalidType => ApiError::bad_request(e.to_string()),
        ReportError::MissingParameter(name) => {
            ApiError::bad_request(format!("{name} is required for {} analytics", kind.as_str()))
        }
        ReportError::Store(err) => {
            tracing::error!("Analytics query failed for {}: {:?}", kind.as_str(), err);
            ApiError::Internal(err)
        }
    })?;

    Ok(Json(AnalyticsResponse {
        success: true,
        kind: kind.as_str(),
        period_days: days,
        generated_at: Utc::now(),
        analytics: report,
    }))
}
