use base64::{engine::general_purpose, Engine as _};
use std::net::IpAddr;

const MIN_SESSION_KEY_BYTES: usize = 32;
const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} missing")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub analytics_database_url: String,
    pub openai_api_key: String,
    pub chat_model: String,
    pub session_key: Vec<u8>,
    pub session_ttl_hours: i64,
    pub bind_addr: String,
    pub trusted_proxies: Vec<IpAddr>,
    pub metrics_snapshot_cron: String,
    pub seed_demo_data: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| {
            get(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let database_url = required("DATABASE_URL")?;
        let analytics_database_url = get("ANALYTICS_DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| database_url.clone());

        let session_key = general_purpose::STANDARD
            .decode(required("SESSION_KEY")?.trim())
            .map_err(|e| ConfigError::Invalid {
                name: "SESSION_KEY",
                reason: format!("not base64: {e}"),
            })?;
        if session_key.len() < MIN_SESSION_KEY_BYTES {
            return Err(ConfigError::Invalid {
                name: "SESSION_KEY",
                reason: format!("must decode to at least {MIN_SESSION_KEY_BYTES} bytes"),
            });
        }

        let session_ttl_hours = match get("SESSION_TTL_HOURS") {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|h| (1..=MAX_SESSION_TTL_HOURS).contains(h))
                .ok_or_else(|| ConfigError::Invalid {
                    name: "SESSION_TTL_HOURS",
                    reason: format!("expected between 1 and {MAX_SESSION_TTL_HOURS} hours, got '{raw}'"),
                })?,
            None => 24,
        };

        let bind_addr = get("BIND_ADDR").unwrap_or_else(|| {
            let port = get("PORT").unwrap_or_else(|| "3000".to_string());
            format!("0.0.0.0:{}", port)
        });

        let trusted_proxies = get("TRUSTED_PROXIES")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| {
                v.parse::<IpAddr>().map_err(|e| ConfigError::Invalid {
                    name: "TRUSTED_PROXIES",
                    reason: format!("'{v}': {e}"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let seed_demo_data = match get("SEED_DEMO_DATA").as_deref().map(str::trim) {
            None | Some("") | Some("0") | Some("false") => false,
            Some("1") | Some("true") => true,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "SEED_DEMO_DATA",
                    reason: format!("expected true/false, got '{other}'"),
                })
            }
        };

        Ok(Self {
            database_url,
            analytics_database_url,
            openai_api_key: required("OPENAI_API_KEY")?,
            chat_model: get("CHAT_MODEL").unwrap_or_else(|| "gpt-4o".to_string()),
            session_key,
            session_ttl_hours,
            bind_addr,
            trusted_proxies,
            metrics_snapshot_cron: get("METRICS_SNAPSHOT_CRON")
                .unwrap_or_else(|| "0 0 * * * *".to_string()),
            seed_demo_data,
        })
    }
}
