use crate::domain::models::{
    MoodLog, NewMoodLog, NewSession, SessionAnalysis, SessionParty, SessionUpdate, TherapySession,
    UserRole,
};
use crate::domain::session_analysis::analyze_text;
use crate::state::SharedState;
use crate::web::error::ApiError;
use crate::web::session::UserSession;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

const DEFAULT_ANALYSIS_LIMIT: i64 = 5;
const SCORE_RANGE: std::ops::RangeInclusive<i32> = 1..=10;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/sessions", get(list_sessions).post(create_session))
        .route("/sessions/:id", patch(update_session))
        .route("/sessions/:id/analysis", post(analyze_session))
        .route("/mood-logs", get(list_mood_logs).post(log_mood))
        .route("/patients/:id/analysis", get(list_analyses))
        .with_state(state)
}

fn check_score(value: Option<i32>, name: &str) -> Result<(), ApiError> {
    match value {
        Some(v) if !SCORE_RANGE.contains(&v) => {
            Err(ApiError::bad_request(format!("{name} must be between 1 and 10")))
        }
        _ => Ok(()),
    }
}

fn is_party(session: &UserSession, therapy: &TherapySession) -> bool {
    session.role == UserRole::Admin
        || session.user_id == therapy.patient_id
        || session.user_id == therapy.psychologist_id
}

/// Patients see their own records, psychologists those of assigned patients.
async fn require_patient_access(
    state: &SharedState,
    session: &UserSession,
    patient_id: Uuid,
) -> Result<(), ApiError> {
    let allowed = match session.role {
        UserRole::Admin => true,
        UserRole::Patient => session.user_id == patient_id,
        UserRole::Psychologist => state
            .profiles
            .find_patient(patient_id)
            .await?
            .is_some_and(|d| d.patient.assigned_psychologist == Some(session.user_id)),
    };
    if allowed {
        Ok(())
    } else {
        Err(ApiError::Forbidden("not allowed for this patient".into()))
    }
}

async fn create_session(
    State(state): State<SharedState>,
    session: UserSession,
    Json(new): Json<NewSession>,
) -> Result<(StatusCode, Json<TherapySession>), ApiError> {
    if session.role != UserRole::Admin
        && session.user_id != new.patient_id
        && session.user_id != new.psychologist_id
    {
        return Err(ApiError::Forbidden("not allowed for this user".into()));
    }
    if new.duration_minutes <= 0 {
        return Err(ApiError::bad_request("duration_minutes must be positive"));
    }
    let created = state.profiles.create_session(new).await?;
    tracing::info!(
        "Session {} scheduled for patient {} with {}",
        created.id,
        created.patient_id,
        created.psychologist_id
    );
    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Deserialize)]
struct SessionQuery {
    user_id: Option<Uuid>,
    role: Option<String>,
}

async fn list_sessions(
    State(state): State<SharedState>,
    session: UserSession,
    Query(query): Query<SessionQuery>,
) -> Result<Json<Vec<TherapySession>>, ApiError> {
    let user_id = query.user_id.unwrap_or(session.user_id);
    session.require_self_or_admin(user_id)?;

    let role = match query.role.as_deref() {
        Some(raw) => UserRole::try_from(raw)
            .map_err(|_| ApiError::bad_request(format!("unknown role '{raw}'")))?,
        None => session.role,
    };
    let party = match role {
        UserRole::Patient => SessionParty::Patient,
        UserRole::Psychologist => SessionParty::Psychologist,
        UserRole::Admin => {
            return Err(ApiError::bad_request("role must be patient or psychologist"));
        }
    };
    Ok(Json(state.profiles.sessions_for(user_id, party).await?))
}

async fn update_session(
    State(state): State<SharedState>,
    session: UserSession,
    Path(id): Path<Uuid>,
    Json(update): Json<SessionUpdate>,
) -> Result<Json<TherapySession>, ApiError> {
    check_score(update.patient_feedback, "patient_feedback")?;
    check_score(update.therapist_rating, "therapist_rating")?;

    let existing = state
        .profiles
        .find_session(id)
        .await?
        .ok_or_else(|| ApiError::not_found("session not found"))?;
    if !is_party(&session, &existing) {
        return Err(ApiError::Forbidden("not allowed for this session".into()));
    }

    let updated = state
        .profiles
        .update_session(id, update)
        .await?
        .ok_or_else(|| ApiError::not_found("session not found"))?;
    Ok(Json(updated))
}

#[derive(Deserialize)]
struct MoodLogRequest {
    patient_id: Uuid,
    log_date: Option<NaiveDate>,
    mood_score: i32,
    anxiety_level: Option<i32>,
    sleep_hours: Option<f64>,
    #[serde(default)]
    exercise_minutes: i32,
    #[serde(default)]
    social_interaction: bool,
    notes: Option<String>,
}

/// Same-day entries replace the earlier one.
async fn log_mood(
    State(state): State<SharedState>,
    session: UserSession,
    Json(req): Json<MoodLogRequest>,
) -> Result<Json<MoodLog>, ApiError> {
    session.require_self_or_admin(req.patient_id)?;
    check_score(Some(req.mood_score), "mood_score")?;
    check_score(req.anxiety_level, "anxiety_level")?;
    if req.sleep_hours.is_some_and(|h| !(0.0..=24.0).contains(&h)) {
        return Err(ApiError::bad_request("sleep_hours must be between 0 and 24"));
    }
    if req.exercise_minutes < 0 {
        return Err(ApiError::bad_request("exercise_minutes must not be negative"));
    }

    let log = state
        .profiles
        .upsert_mood_log(NewMoodLog {
            patient_id: req.patient_id,
            log_date: req.log_date.unwrap_or_else(|| Utc::now().date_naive()),
            mood_score: req.mood_score,
            anxiety_level: req.anxiety_level,
            sleep_hours: req.sleep_hours,
            exercise_minutes: req.exercise_minutes,
            social_interaction: req.social_interaction,
            notes: req.notes,
        })
        .await?;
    Ok(Json(log))
}

#[derive(Deserialize)]
struct MoodLogQuery {
    patient_id: Uuid,
    limit: Option<i64>,
}

async fn list_mood_logs(
    State(state): State<SharedState>,
    session: UserSession,
    Query(query): Query<MoodLogQuery>,
) -> Result<Json<Vec<MoodLog>>, ApiError> {
    require_patient_access(&state, &session, query.patient_id).await?;
    let limit = query.limit.map(|l| l.clamp(1, 365));
    Ok(Json(state.profiles.mood_logs(query.patient_id, limit).await?))
}

#[derive(Deserialize)]
struct AnalysisRequest {
    text: String,
}

async fn analyze_session(
    State(state): State<SharedState>,
    session: UserSession,
    Path(id): Path<Uuid>,
    Json(req): Json<AnalysisRequest>,
) -> Result<(StatusCode, Json<SessionAnalysis>), ApiError> {
    session.require_role(&[UserRole::Psychologist, UserRole::Admin])?;
    let therapy = state
        .profiles
        .find_session(id)
        .await?
        .ok_or_else(|| ApiError::not_found("session not found"))?;
    if !is_party(&session, &therapy) {
        return Err(ApiError::Forbidden("not allowed for this session".into()));
    }

    let analysis = analyze_text(&req.text, &mut rand::thread_rng());
    let record = SessionAnalysis {
        id: Uuid::new_v4(),
        patient_id: therapy.patient_id,
        psychologist_id: therapy.psychologist_id,
        session_id: therapy.id,
        session_date: therapy.session_date,
        analysis: serde_json::to_value(&analysis).map_err(|e| ApiError::Internal(e.into()))?,
        created_at: Utc::now(),
    };
    state.analytics.save_session_analysis(&record).await?;
    tracing::debug!("Stored analysis for session {}", therapy.id);
    Ok((StatusCode::CREATED, Json(record)))
}

#[derive(Deserialize)]
struct AnalysisQuery {
    limit: Option<i64>,
}

async fn list_analyses(
    State(state): State<SharedState>,
    session: UserSession,
    Path(patient_id): Path<Uuid>,
    Query(query): Query<AnalysisQuery>,
) -> Result<Json<Vec<SessionAnalysis>>, ApiError> {
    require_patient_access(&state, &session, patient_id).await?;
    let limit = query.limit.unwrap_or(DEFAULT_ANALYSIS_LIMIT).clamp(1, 100);
    Ok(Json(state.analytics.session_analyses(patient_id, limit).await?))
}
