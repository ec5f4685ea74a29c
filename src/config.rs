use std::env;
use std::net::SocketAddr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set (see .env)")]
    Missing(&'static str),
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// External auth service (GoTrue-style password grant).
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    /// Local fallback when no auth service is configured.
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub from: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.resend.com/emails".to_string(),
            api_key: None,
            from: "USM Registration <onboarding@resend.dev>".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub feed_page_size: i64,
    pub session_ttl_minutes: i64,
    pub auth: AuthConfig,
    pub email: EmailConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            feed_page_size: 100,
            session_ttl_minutes: 12 * 60,
            auth: AuthConfig::default(),
            email: EmailConfig::default(),
        }
    }
}

impl AppConfig {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick up `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = AppConfig::default();

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let host = get("HOST").unwrap_or(defaults.host);
        let port = parse_or("PORT", get("PORT"), defaults.port)?;
        let feed_page_size = parse_or("FEED_PAGE_SIZE", get("FEED_PAGE_SIZE"), defaults.feed_page_size)?;
        if feed_page_size < 1 {
            return Err(ConfigError::Invalid {
                name: "FEED_PAGE_SIZE",
                value: feed_page_size.to_string(),
            });
        }
        let session_ttl_minutes = parse_or(
            "SESSION_TTL_MINUTES",
            get("SESSION_TTL_MINUTES"),
            defaults.session_ttl_minutes,
        )?;

        let auth = AuthConfig {
            api_url: get("AUTH_API_URL"),
            api_key: get("AUTH_API_KEY"),
            admin_email: get("ADMIN_EMAIL"),
            admin_password: get("ADMIN_PASSWORD"),
        };

        let email = EmailConfig {
            api_url: get("RESEND_API_URL").unwrap_or(defaults.email.api_url),
            api_key: get("RESEND_API_KEY"),
            from: get("EMAIL_FROM").unwrap_or(defaults.email.from),
        };

        Ok(Self {
            database_url,
            host,
            port,
            feed_page_size,
            session_ttl_minutes,
            auth,
            email,
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|_| ConfigError::Invalid {
            name: "HOST",
            value: raw,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
