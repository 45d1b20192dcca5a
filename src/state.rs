use crate::db::{AnalyticsStore, ProfileStore};
use crate::middleware::{RateLimiter, RequestMetrics};
use crate::services::chat::LanguageModel;
use chrono::Duration;
use std::net::IpAddr;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub profiles: Arc<dyn ProfileStore>,
    pub analytics: Arc<dyn AnalyticsStore>,
    pub relay: Arc<dyn LanguageModel>,
    pub session_key: Vec<u8>,
    pub session_ttl: Duration,
    pub login_limiter: RateLimiter,
    pub trusted_proxies: Vec<IpAddr>,
    pub request_metrics: RequestMetrics,
}

pub type SharedState = Arc<AppState>;
