use crate::db::memory::{MemoryAnalyticsStore, MemoryProfileStore};
use crate::db::ProfileStore;
use crate::domain::models::{NewProfile, UserRole};
use crate::middleware::{RateLimiter, RequestMetrics};
use crate::services::auth::hash_password;
use crate::services::chat::scripted::ScriptedModel;
use crate::state::{AppState, SharedState};
use crate::web::session::sign_session;
use axum::body::{to_bytes, Body};
use axum::extract::connect_info::{ConnectInfo, MockConnectInfo};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Duration;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_KEY: &[u8] = b"test-session-key-test-session-key";
pub const TEST_PEER: ([u8; 4], u16) = ([127, 0, 0, 1], 4000);

pub struct TestApp {
    pub state: SharedState,
    pub profiles: Arc<MemoryProfileStore>,
    pub analytics: Arc<MemoryAnalyticsStore>,
    pub model: Arc<ScriptedModel>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_model(ScriptedModel::new(&["Hola, ", "estoy aquí ", "para ayudarte."]))
    }

    pub fn with_model(model: ScriptedModel) -> Self {
        let profiles = Arc::new(MemoryProfileStore::default());
        let analytics = Arc::new(MemoryAnalyticsStore::default());
        let model = Arc::new(model);
        let state = Arc::new(AppState {
            profiles: profiles.clone(),
            analytics: analytics.clone(),
            relay: model.clone(),
            session_key: TEST_KEY.to_vec(),
            session_ttl: Duration::hours(1),
            login_limiter: RateLimiter::new(5, 60),
            trusted_proxies: Vec::new(),
            request_metrics: RequestMetrics::default(),
        });
        Self {
            state,
            profiles,
            analytics,
            model,
        }
    }

    pub fn router(&self) -> Router {
        crate::web::routes(self.state.clone()).layer(MockConnectInfo(SocketAddr::from(TEST_PEER)))
    }

    /// Creates a profile with password `Secret123!` and returns its id and a session token.
    pub async fn user(&self, email: &str, role: UserRole) -> (Uuid, String) {
        let profile = self
            .profiles
            .create_profile(NewProfile {
                first_name: "Test".into(),
                last_name: role.as_str().into(),
                email: email.into(),
                hashed_password: hash_password("Secret123!").unwrap(),
                user_type: role,
                phone: None,
                date_of_birth: None,
                gender: None,
            })
            .await
            .unwrap();
        let token = sign_session(profile.id, role, TEST_KEY, Duration::hours(1)).unwrap();
        (profile.id, token)
    }

    pub async fn send(&self, mut req: Request<Body>) -> (StatusCode, serde_json::Value) {
        req.extensions_mut().insert(ConnectInfo(SocketAddr::from(TEST_PEER)));
        let response = self.router().oneshot(req).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or_else(|_| {
                serde_json::Value::String(String::from_utf8_lossy(&body).into_owned())
            })
        };
        (status, json)
    }
}

pub fn make_request(
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
    token: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}
