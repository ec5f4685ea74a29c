use base64::{engine::general_purpose, Engine as _};
use constant_time_eq::constant_time_eq;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::AuthConfig;

pub const LOCAL_ADMIN_ID: &str = "local-admin";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminIdentity {
    pub user_id: String,
    pub email: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    InvalidCredentials(String),
    #[error("Sign-in is not configured")]
    NotConfigured,
    #[error("Connection error: {0}")]
    Upstream(#[from] reqwest::Error),
    #[error("Parse error: {0}")]
    Parse(String),
}

#[derive(Deserialize)]
struct TokenUser {
    id: String,
    email: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    user: Option<TokenUser>,
}

#[derive(Deserialize)]
struct JwtPayload {
    sub: String,
}

/// Reads `sub` from the (unverified) payload segment of a JWT.
pub fn jwt_subject(token: &str) -> Option<String> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return None;
    }
    let payload_bytes = general_purpose::URL_SAFE_NO_PAD.decode(parts[1]).ok()?;
    serde_json::from_slice::<JwtPayload>(&payload_bytes)
        .ok()
        .map(|p| p.sub)
}

fn upstream_message(body: &Value) -> String {
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(|v| v.as_str()))
        .unwrap_or("Invalid login credentials")
        .to_string()
}

/// Password sign-in: the auth service when configured, otherwise the local
/// `ADMIN_EMAIL` / `ADMIN_PASSWORD` pair.
pub async fn sign_in_with_password(
    http: &reqwest::Client,
    config: &AuthConfig,
    email: &str,
    password: &str,
) -> Result<AdminIdentity, AuthError> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return Err(AuthError::InvalidCredentials(
            "Email and password are required".to_string(),
        ));
    }

    if let Some(base_url) = config.api_url.as_deref() {
        return sign_in_upstream(http, base_url, config.api_key.as_deref(), email, password).await;
    }

    match (config.admin_email.as_deref(), config.admin_password.as_deref()) {
        (Some(admin_email), Some(admin_password)) => {
            let email_ok = admin_email.eq_ignore_ascii_case(email);
            let password_ok = constant_time_eq(admin_password.as_bytes(), password.as_bytes());
            if email_ok && password_ok {
                info!("🔐 Local admin signed in");
                Ok(AdminIdentity {
                    user_id: LOCAL_ADMIN_ID.to_string(),
                    email: admin_email.to_string(),
                })
            } else {
                warn!("🔐 Local admin sign-in rejected for {}", email);
                Err(AuthError::InvalidCredentials(
                    "Invalid login credentials".to_string(),
                ))
            }
        }
        _ => Err(AuthError::NotConfigured),
    }
}

async fn sign_in_upstream(
    http: &reqwest::Client,
    base_url: &str,
    api_key: Option<&str>,
    email: &str,
    password: &str,
) -> Result<AdminIdentity, AuthError> {
    let url = format!(
        "{}/auth/v1/token?grant_type=password",
        base_url.trim_end_matches('/')
    );

    let mut req = http.post(&url).json(&json!({
        "email": email,
        "password": password,
    }));
    if let Some(key) = api_key {
        req = req.header("apikey", key);
    }

    let resp = req.send().await.map_err(|e| {
        warn!("🔐 Auth service unreachable at {}: {}", url, e);
        AuthError::Upstream(e)
    })?;

    let status = resp.status();
    let body: Value = resp.json().await.unwrap_or_else(|_| json!({}));
    if !status.is_success() {
        warn!("🔐 Auth service returned {}", status);
        return Err(AuthError::InvalidCredentials(upstream_message(&body)));
    }

    let parsed: TokenResponse =
        serde_json::from_value(body).map_err(|e| AuthError::Parse(e.to_string()))?;

    let (user_id, user_email) = match parsed.user {
        Some(user) => (user.id, user.email),
        None => (
            jwt_subject(&parsed.access_token)
                .ok_or_else(|| AuthError::Parse("token without subject".to_string()))?,
            None,
        ),
    };

    info!(user_id = %user_id, "🔐 Admin signed in");
    Ok(AdminIdentity {
        user_id,
        email: user_email.unwrap_or_else(|| email.to_string()),
    })
}
