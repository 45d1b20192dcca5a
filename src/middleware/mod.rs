pub mod rate_limit;
pub mod request_metrics;

pub use rate_limit::{ClientIp, RateLimiter};
pub use request_metrics::RequestMetrics;
