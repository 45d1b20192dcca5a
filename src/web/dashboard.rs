use crate::analytics::report::{overview_from, OverviewReport};
use crate::domain::models::{
    MlPrediction, MoodLog, PatientDetails, PredictionKind, PublicProfile, SessionParty, TherapySession,
    UserRole,
};
use crate::state::SharedState;
use crate::web::error::ApiError;
use crate::web::session::UserSession;
use axum::{extract::State, routing::get, Json, Router};
use chrono::{Duration, Utc};
use serde::Serialize;

const RECENT_MOOD_LOGS: i64 = 14;
const OVERVIEW_DAYS: i64 = 7;

#[derive(Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Dashboard {
    Patient {
        profile: PublicProfile,
        mood_logs: Vec<MoodLog>,
        sessions: Vec<TherapySession>,
        latest_risk: Option<MlPrediction>,
    },
    Psychologist {
        profile: PublicProfile,
        patients: Vec<PatientDetails>,
        sessions: Vec<TherapySession>,
    },
    Admin {
        profile: PublicProfile,
        overview: OverviewReport,
    },
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/dashboard", get(dashboard))
        .with_state(state)
}

async fn dashboard(
    State(state): State<SharedState>,
    session: UserSession,
) -> Result<Json<Dashboard>, ApiError> {
    let profile: PublicProfile = state
        .profiles
        .find_profile(session.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("profile not found"))?
        .into();
    let id = session.user_id;

    let view = match session.role {
        UserRole::Patient => Dashboard::Patient {
            mood_logs: state.profiles.mood_logs(id, Some(RECENT_MOOD_LOGS)).await?,
            sessions: state.profiles.sessions_for(id, SessionParty::Patient).await?,
            latest_risk: state
                .analytics
                .latest_prediction(&id.to_string(), PredictionKind::RiskLevel)
                .await?,
            profile,
        },
        UserRole::Psychologist => Dashboard::Psychologist {
            patients: state.profiles.patients_of(id).await?,
            sessions: state.profiles.sessions_for(id, SessionParty::Psychologist).await?,
            profile,
        },
        UserRole::Admin => {
            let since = Utc::now() - Duration::days(OVERVIEW_DAYS);
            Dashboard::Admin {
                overview: overview_from(&state.analytics.metrics_since(since).await?),
                profile,
            }
        }
    };
    Ok(Json(view))
}
