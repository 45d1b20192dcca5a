use crate::domain::models::{NewProfile, PublicProfile, UserRole};
use crate::middleware::ClientIp;
use crate::services::auth::{hash_password, login_user, LoginError};
use crate::state::SharedState;
use crate::web::activity::record_activity;
use crate::web::error::ApiError;
use crate::web::session::{self, UserSession};
use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub user_type: Option<String>,
    pub phone: Option<String>,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub user_type: Option<String>,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub user: PublicProfile,
    pub token: String,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .with_state(state)
}

fn present(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

async fn register(
    State(state): State<SharedState>,
    client_ip: ClientIp,
    headers: HeaderMap,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let (Some(email), Some(password), Some(user_type)) = (
        present(payload.email),
        payload.password.filter(|p| !p.is_empty()),
        present(payload.user_type),
    ) else {
        return Err(ApiError::bad_request("email, password and userType are required"));
    };
    let role = UserRole::try_from(user_type.as_str())
        .map_err(|_| ApiError::bad_request(format!("unknown userType '{user_type}'")))?;

    let new_profile = NewProfile {
        first_name: payload.first_name.unwrap_or_default(),
        last_name: payload.last_name.unwrap_or_default(),
        email,
        hashed_password: hash_password(&password)?,
        user_type: role,
        phone: present(payload.phone),
        date_of_birth: None,
        gender: None,
    };
    let profile = match role {
        UserRole::Patient => state.profiles.create_patient_account(new_profile).await?,
        _ => state.profiles.create_profile(new_profile).await?,
    };

    tracing::info!("Registered {} as {}", profile.id, role.as_str());
    record_activity(
        state.analytics.as_ref(),
        profile.id,
        role,
        "register",
        serde_json::json!({}),
        &client_ip,
        &headers,
    )
    .await;

    Ok(Json(MessageResponse {
        message: "User created successfully".to_string(),
    }))
}

async fn login(
    State(state): State<SharedState>,
    client_ip: ClientIp,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.login_limiter.check(&client_ip.0).await {
        tracing::warn!("Login rate limit exceeded for IP: {}", client_ip.0);
        return Err(ApiError::TooManyRequests);
    }

    let user = login_user(state.profiles.as_ref(), payload.email.trim(), &payload.password)
        .await
        .map_err(|e| match e {
            LoginError::NotFound => ApiError::not_found("user not found"),
            LoginError::NoPasswordSet => ApiError::Conflict("no password set for this account".into()),
            LoginError::BadPassword => ApiError::Unauthorized("incorrect password".into()),
            LoginError::Lookup(err) => ApiError::Internal(err),
        })?;

    if let Some(expected) = payload.user_type.as_deref() {
        if UserRole::try_from(expected) != Ok(user.user_type) {
            return Err(ApiError::Forbidden(format!(
                "account is not registered as {}",
                expected.trim()
            )));
        }
    }

    let token = session::sign_session(user.id, user.user_type, &state.session_key, state.session_ttl)
        .map_err(|e| ApiError::Internal(e.into()))?;

    record_activity(
        state.analytics.as_ref(),
        user.id,
        user.user_type,
        "login",
        serde_json::json!({}),
        &client_ip,
        &headers,
    )
    .await;
    tracing::info!("User {} logged in", user.id);

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&session::session_cookie(&token))
            .map_err(|e| ApiError::Internal(e.into()))?,
    );
    Ok((response_headers, Json(LoginResponse { user, token })))
}

async fn me(
    State(state): State<SharedState>,
    session: UserSession,
) -> Result<Json<PublicProfile>, ApiError> {
    let profile = state
        .profiles
        .find_profile(session.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("profile not found"))?;
    Ok(Json(profile.into()))
}
