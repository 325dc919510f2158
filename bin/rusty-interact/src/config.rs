//! Runtime configuration, read from the environment (and `.env`).

use std::time::Duration;

use ri_core::services::ServiceSettings;

const DEV_SALT: &str = "rusty-interact-dev-salt";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub session_salt: String,
    pub public_base_url: String,
    pub leaderboard_ttl: Duration,
    /// Origins allowed to call the API from a browser; empty means same-origin only
    pub cors_origins: Vec<String>,
    /// JSON article list loaded into the read model at startup
    pub articles_file: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Unparsable values fall back to
    /// their defaults with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let session_salt = get("SESSION_SALT").unwrap_or_else(|| {
            log::warn!("SESSION_SALT not set, using the development salt");
            DEV_SALT.to_string()
        });
        let ttl_secs = match get("LEADERBOARD_TTL_SECS") {
            Some(raw) => raw.parse::<u64>().unwrap_or_else(|_| {
                log::warn!("invalid LEADERBOARD_TTL_SECS '{}', using 300", raw);
                300
            }),
            None => 300,
        };
        let cors_origins: Vec<String> = get("CORS_ALLOWED_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|origin| origin.trim().trim_end_matches('/').to_string())
                    .filter(|origin| match origin.as_str() {
                        "" => false,
                        "*" => {
                            log::warn!("CORS_ALLOWED_ORIGINS: wildcard ignored, list origins explicitly");
                            false
                        }
                        _ => true,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            database_url: get("DATABASE_URL").unwrap_or_else(|| "sqlite:rusty_interact.db".to_string()),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8080".to_string()),
            session_salt,
            public_base_url: get("PUBLIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "http://127.0.0.1:8080".to_string()),
            leaderboard_ttl: Duration::from_secs(ttl_secs),
            cors_origins,
            articles_file: get("ARTICLES_FILE"),
        }
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            public_base_url: self.public_base_url.clone(),
            leaderboard_ttl: self.leaderboard_ttl,
        }
    }
}
