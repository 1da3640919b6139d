use crate::infrastructure::auth::GOOGLE_USERINFO_URL;
use crate::infrastructure::security::RateLimits;
use relief_errors::{AppError, AppResult};
use std::net::SocketAddr;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub run_migrations: bool,
    pub userinfo_url: String,
    /// `token:uid:email` list; when present the static identity provider
    /// replaces Google.
    pub dev_tokens: Option<String>,
    pub bootstrap_admins: Vec<String>,
    pub vote_limits: RateLimits,
}

impl AppConfig {
    /// Reads `.env` (if any) and then the process environment.
    pub fn load() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| AppError::Config(format!("BIND_ADDR: {e}")))?;

        let database_url = get("DATABASE_URL");

        let run_migrations = match get("RUN_MIGRATIONS").as_deref() {
            None => true,
            Some("1" | "true" | "yes") => true,
            Some("0" | "false" | "no") => false,
            Some(other) => {
                return Err(AppError::Config(format!(
                    "RUN_MIGRATIONS must be true or false, got {other}"
                )))
            }
        };

        let userinfo_url = get("GOOGLE_USERINFO_URL")
            .unwrap_or_else(|| GOOGLE_USERINFO_URL.to_string());
        url::Url::parse(&userinfo_url)
            .map_err(|e| AppError::Config(format!("GOOGLE_USERINFO_URL: {e}")))?;

        let bootstrap_admins = get("BOOTSTRAP_ADMIN_EMAILS")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let defaults = RateLimits::default();
        let limit = |key: &str, default: u32| parse_limit(get(key), key, default);
        let vote_limits = RateLimits {
            per_minute: limit("VOTE_RATE_PER_MINUTE", defaults.per_minute)?,
            per_hour: limit("VOTE_RATE_PER_HOUR", defaults.per_hour)?,
        };

        Ok(Self {
            bind_addr,
            database_url,
            run_migrations,
            userinfo_url,
            dev_tokens: get("DEV_TOKENS"),
            bootstrap_admins,
            vote_limits,
        })
    }
}

fn parse_limit(value: Option<String>, key: &str, default: u32) -> AppResult<u32> {
    match value {
        None => Ok(default),
        Some(v) => match v.parse::<u32>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(AppError::Config(format!("{key} must be a positive integer, got {v}"))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> AppResult<AppConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert!(cfg.database_url.is_none());
        assert!(cfg.run_migrations);
        assert_eq!(cfg.userinfo_url, GOOGLE_USERINFO_URL);
        assert_eq!(cfg.vote_limits, RateLimits::default());
        assert!(cfg.bootstrap_admins.is_empty());
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("BIND_ADDR", "0.0.0.0:8080"),
            ("DATABASE_URL", "postgres://relief@localhost/relief"),
            ("RUN_MIGRATIONS", "false"),
            ("BOOTSTRAP_ADMIN_EMAILS", "a@x.org, b@x.org,"),
            ("VOTE_RATE_PER_MINUTE", "5"),
        ])
        .unwrap();
        assert_eq!(cfg.bind_addr.port(), 8080);
        assert!(cfg.database_url.is_some());
        assert!(!cfg.run_migrations);
        assert_eq!(cfg.bootstrap_admins, vec!["a@x.org", "b@x.org"]);
        assert_eq!(cfg.vote_limits.per_minute, 5);
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        assert!(matches!(
            config(&[("BIND_ADDR", "nowhere")]),
            Err(AppError::Config(_))
        ));
        assert!(matches!(
            config(&[("VOTE_RATE_PER_HOUR", "0")]),
            Err(AppError::Config(_))
        ));
        assert!(matches!(
            config(&[("RUN_MIGRATIONS", "maybe")]),
            Err(AppError::Config(_))
        ));
    }
}
