use std::net::IpAddr;

use crate::rate_limit::Quota;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub read: Quota,
    pub write: Quota,
    pub delete: Quota,
    pub search: Quota,
    /// Addresses that bypass rate limiting entirely.
    pub whitelist: Vec<IpAddr>,
}

/// Process configuration, read from `INNKEEP_*` environment variables once at
/// startup and passed down to the components that need it.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: String,
    pub port: u16,
    pub metrics_port: Option<u16>,
    /// Seed a small room inventory when the store starts empty.
    pub seed_demo: bool,
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let bind = std::env::var("INNKEEP_BIND").unwrap_or_else(|_| "0.0.0.0".into());
        let port = std::env::var("INNKEEP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8000);
        let metrics_port = std::env::var("INNKEEP_METRICS_PORT")
            .ok()
            .and_then(|s| s.parse().ok());
        let seed_demo = env_flag("INNKEEP_SEED_DEMO", true);

        let whitelist = std::env::var("INNKEEP_RATE_LIMIT_WHITELIST")
            .unwrap_or_else(|_| "127.0.0.1,::1".into())
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();

        let rate_limit = RateLimitConfig {
            enabled: env_flag("INNKEEP_RATE_LIMIT_ENABLED", true),
            read: env_quota("INNKEEP_RATE_LIMIT_READ", "100/minute"),
            write: env_quota("INNKEEP_RATE_LIMIT_WRITE", "20/minute"),
            delete: env_quota("INNKEEP_RATE_LIMIT_DELETE", "10/minute"),
            search: env_quota("INNKEEP_RATE_LIMIT_SEARCH", "50/minute"),
            whitelist,
        };

        Self {
            bind,
            port,
            metrics_port,
            seed_demo,
            rate_limit,
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => matches!(value.to_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => default,
    }
}

fn env_quota(name: &str, default: &str) -> Quota {
    let fallback = Quota::parse(default).expect("built-in quota string is valid");
    match std::env::var(name) {
        Ok(value) => Quota::parse(&value).unwrap_or_else(|| {
            tracing::warn!("unparseable quota in {name}: {value:?}, using {default}");
            fallback
        }),
        Err(_) => fallback,
    }
}
