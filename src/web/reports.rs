use crate::analytics::report::UserReport;
use crate::analytics::{user_report, ReportError};
use crate::domain::models::UserRole;
use crate::state::SharedState;
use crate::web::error::ApiError;
use crate::web::session::UserSession;
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

#[derive(Deserialize)]
struct ReportQuery {
    user_type: Option<String>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/reports/:user_id", get(report))
        .with_state(state)
}

async fn report(
    State(state): State<SharedState>,
    session: UserSession,
    Path(user_id): Path<String>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<UserReport>, ApiError> {
    if session.role != UserRole::Admin && session.user_id.to_string() != user_id {
        return Err(ApiError::Forbidden("not allowed for this user".into()));
    }
    let raw = query
        .user_type
        .ok_or_else(|| ApiError::bad_request("user_type is required"))?;
    let user_type = UserRole::try_from(raw.as_str())
        .map_err(|_| ApiError::bad_request(format!("unknown user_type '{raw}'")))?;
    // only admins may pick a role other than their own
    if session.role != UserRole::Admin && user_type != session.role {
        return Err(ApiError::Forbidden("not allowed for this report type".into()));
    }

    let report = user_report(&user_id, user_type, state.analytics.as_ref())
        .await
        .map_err(|e| match e {
            ReportError::Store(err) => {
                tracing::error!("User report failed for {}: {:?}", user_id, err);
                ApiError::Internal(err)
            }
            other => ApiError::bad_request(other.to_string()),
        })?;
    Ok(Json(report))
}
