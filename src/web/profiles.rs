use crate::domain::models::{
    NewPatient, NewPsychologist, Patient, PatientDetails, PatientUpdate, ProfileUpdate, Psychologist,
    PsychologistDetails, PublicProfile, UserRole,
};
use crate::state::SharedState;
use crate::web::error::ApiError;
use crate::web::session::UserSession;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/profiles/:id", get(get_profile).patch(update_profile))
        .route("/patients", post(create_patient))
        .route("/patients/:id", get(get_patient).patch(update_patient))
        .route("/psychologists", get(list_psychologists).post(create_psychologist))
        .route("/psychologists/:id", get(get_psychologist))
        .route("/psychologists/:id/patients", get(patients_of))
        .with_state(state)
}

async fn get_profile(
    State(state): State<SharedState>,
    session: UserSession,
    Path(id): Path<Uuid>,
) -> Result<Json<PublicProfile>, ApiError> {
    session.require_self_or_admin(id)?;
    let profile = state
        .profiles
        .find_profile(id)
        .await?
        .ok_or_else(|| ApiError::not_found("profile not found"))?;
    Ok(Json(profile.into()))
}

async fn update_profile(
    State(state): State<SharedState>,
    session: UserSession,
    Path(id): Path<Uuid>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<PublicProfile>, ApiError> {
    session.require_self_or_admin(id)?;
    let profile = state
        .profiles
        .update_profile(id, update)
        .await?
        .ok_or_else(|| ApiError::not_found("profile not found"))?;
    tracing::info!("Profile {} updated by {}", id, session.user_id);
    Ok(Json(profile.into()))
}

async fn create_patient(
    State(state): State<SharedState>,
    session: UserSession,
    Json(patient): Json<NewPatient>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    session.require_self_or_admin(patient.id)?;
    let created = state.profiles.create_patient(patient).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// The patient, their assigned psychologist and admins may read the record.
async fn get_patient(
    State(state): State<SharedState>,
    session: UserSession,
    Path(id): Path<Uuid>,
) -> Result<Json<PatientDetails>, ApiError> {
    let details = state
        .profiles
        .find_patient(id)
        .await?
        .ok_or_else(|| ApiError::not_found("patient not found"))?;
    let allowed = match session.role {
        UserRole::Admin => true,
        UserRole::Patient => session.user_id == id,
        UserRole::Psychologist => details.patient.assigned_psychologist == Some(session.user_id),
    };
    if !allowed {
        return Err(ApiError::Forbidden("not allowed for this user".into()));
    }
    Ok(Json(details))
}

async fn update_patient(
    State(state): State<SharedState>,
    session: UserSession,
    Path(id): Path<Uuid>,
    Json(update): Json<PatientUpdate>,
) -> Result<Json<Patient>, ApiError> {
    session.require_role(&[UserRole::Psychologist, UserRole::Admin])?;
    let patient = state
        .profiles
        .update_patient(id, update)
        .await?
        .ok_or_else(|| ApiError::not_found("patient not found"))?;
    Ok(Json(patient))
}

async fn patients_of(
    State(state): State<SharedState>,
    session: UserSession,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<PatientDetails>>, ApiError> {
    session.require_self_or_admin(id)?;
    Ok(Json(state.profiles.patients_of(id).await?))
}

async fn create_psychologist(
    State(state): State<SharedState>,
    session: UserSession,
    Json(psychologist): Json<NewPsychologist>,
) -> Result<(StatusCode, Json<Psychologist>), ApiError> {
    session.require_self_or_admin(psychologist.id)?;
    if psychologist.license_number.trim().is_empty() {
        return Err(ApiError::bad_request("license_number is required"));
    }
    let created = state.profiles.create_psychologist(psychologist).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_psychologists(
    State(state): State<SharedState>,
    _session: UserSession,
) -> Result<Json<Vec<PsychologistDetails>>, ApiError> {
    Ok(Json(state.profiles.list_psychologists().await?))
}

async fn get_psychologist(
    State(state): State<SharedState>,
    _session: UserSession,
    Path(id): Path<Uuid>,
) -> Result<Json<PsychologistDetails>, ApiError> {
    state
        .profiles
        .find_psychologist(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("psychologist not found"))
}

#[cfg(test)]
mod tests {
    use crate::domain::models::UserRole;
    use crate::web::test_support::{make_request, TestApp};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_profile_access_is_self_or_admin() {
        let app = TestApp::new();
        let (ana, ana_token) = app.user("ana@example.com", UserRole::Patient).await;
        let (_, luis_token) = app.user("luis@example.com", UserRole::Patient).await;
        let (_, admin_token) = app.user("admin@example.com", UserRole::Admin).await;

        let uri = format!("/profiles/{ana}");
        let (status, body) = app.send(make_request("GET", &uri, None, Some(&ana_token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "ana@example.com");
        assert!(body.get("hashed_password").is_none());

        let (status, _) = app.send(make_request("GET", &uri, None, Some(&luis_token))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app
            .send(make_request(
                "PATCH",
                &uri,
                Some(json!({ "phone": "+34600000000" })),
                Some(&admin_token),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["phone"], "+34600000000");
        assert_eq!(body["first_name"], "Test");
    }

    #[tokio::test]
    async fn test_patient_assignment_flow() {
        let app = TestApp::new();
        let (psych, psych_token) = app.user("dr@example.com", UserRole::Psychologist).await;
        let (other_psych, other_token) = app.user("dr2@example.com", UserRole::Psychologist).await;
        let (patient, patient_token) = app.user("ana@example.com", UserRole::Patient).await;

        let (status, _) = app
            .send(make_request(
                "POST",
                "/psychologists",
                Some(json!({ "id": psych, "license_number": "PSY-001", "specializations": ["ansiedad"] })),
                Some(&psych_token),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = app
            .send(make_request("POST", "/patients", Some(json!({ "id": patient })), Some(&patient_token)))
            .await;
        assert_eq!(status, StatusCode::CREATED);

        // a patient cannot reassign themselves
        let uri = format!("/patients/{patient}");
        let assign = json!({ "assigned_psychologist": psych, "risk_level": "medium" });
        let (status, _) = app
            .send(make_request("PATCH", &uri, Some(assign.clone()), Some(&patient_token)))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, body) = app
            .send(make_request("PATCH", &uri, Some(assign), Some(&psych_token)))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["risk_level"], "medium");

        let (status, body) = app.send(make_request("GET", &uri, None, Some(&psych_token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["profile"]["email"], "ana@example.com");
        let (status, _) = app.send(make_request("GET", &uri, None, Some(&other_token))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let list_uri = format!("/psychologists/{psych}/patients");
        let (status, body) = app
            .send(make_request("GET", &list_uri, None, Some(&psych_token)))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        let other_uri = format!("/psychologists/{other_psych}/patients");
        let (_, body) = app
            .send(make_request("GET", &other_uri, None, Some(&other_token)))
            .await;
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_psychologist_directory() {
        let app = TestApp::new();
        let (psych, psych_token) = app.user("dr@example.com", UserRole::Psychologist).await;
        let (_, patient_token) = app.user("ana@example.com", UserRole::Patient).await;

        let (status, _) = app
            .send(make_request(
                "POST",
                "/psychologists",
                Some(json!({ "id": psych, "license_number": "  " })),
                Some(&psych_token),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        app.send(make_request(
            "POST",
            "/psychologists",
            Some(json!({ "id": psych, "license_number": "PSY-002", "years_experience": 8 })),
            Some(&psych_token),
        ))
        .await;

        let (status, body) = app
            .send(make_request("GET", "/psychologists", None, Some(&patient_token)))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["license_number"], "PSY-002");
        assert_eq!(body[0]["profile"]["email"], "dr@example.com");

        let missing = format!("/psychologists/{}", uuid::Uuid::new_v4());
        let (status, _) = app.send(make_request("GET", &missing, None, Some(&patient_token))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
