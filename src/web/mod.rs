pub mod activity;
pub mod analytics;
pub mod auth;
pub mod chat;
pub mod dashboard;
pub mod error;
pub mod prediction;
pub mod profiles;
pub mod reports;
pub mod session;
pub mod therapy;
#[cfg(test)]
pub mod test_support;

use crate::state::SharedState;
use axum::{routing::get, Router};

async fn health() -> &'static str {
    "OK"
}

pub fn routes(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(auth::router(state.clone()))
        .merge(analytics::router(state.clone()))
        .merge(prediction::router(state.clone()))
        .merge(chat::router(state.clone()))
        .merge(profiles::router(state.clone()))
        .merge(therapy::router(state.clone()))
        .merge(activity::router(state.clone()))
        .merge(reports::router(state.clone()))
        .merge(dashboard::router(state))
}
