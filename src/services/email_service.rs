use askama::Template;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::EmailConfig;

pub const EVENT_NAME: &str = "Unending Spirit Meeting (USM)";
pub const EVENT_DATE: &str = "21st February";
pub const EVENT_TIME: &str = "9:00 AM";
pub const EVENT_LOCATION: &str =
    "3rd floor ORA black star building, Opposite Ofankor Shell filling station";
pub const CONFIRMATION_SUBJECT: &str = "Welcome to USM! 🎉";

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Email is required")]
    MissingRecipient,
    #[error("email provider is not configured (RESEND_API_KEY)")]
    NotConfigured,
    #[error("could not render email: {0}")]
    Template(#[from] askama::Error),
    #[error("email provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("email provider rejected the message ({status})")]
    Provider { status: u16, body: Value },
}

impl EmailError {
    /// JSON body returned to callers of the send-email endpoint.
    pub fn to_body(&self) -> Value {
        match self {
            EmailError::Provider { body, .. } => json!({ "error": body }),
            EmailError::MissingRecipient => json!({ "error": self.to_string() }),
            _ => json!({ "error": "Internal Server Error" }),
        }
    }
}

#[derive(Template)]
#[template(path = "emails/confirmation.html")]
struct ConfirmationEmailTemplate<'a> {
    name: &'a str,
    event_name: &'a str,
    date: &'a str,
    time: &'a str,
    location: &'a str,
}

pub fn render_confirmation(name: &str) -> Result<String, askama::Error> {
    ConfirmationEmailTemplate {
        name,
        event_name: EVENT_NAME,
        date: EVENT_DATE,
        time: EVENT_TIME,
        location: EVENT_LOCATION,
    }
    .render()
}

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    id: String,
}

/// Resend client for registration confirmations.
#[derive(Clone)]
pub struct EmailClient {
    http: reqwest::Client,
    config: EmailConfig,
}

impl EmailClient {
    pub fn new(config: EmailConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Sends the confirmation and returns the provider message id.
    pub async fn send_confirmation(&self, name: &str, email: &str) -> Result<String, EmailError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(EmailError::MissingRecipient);
        }
        let Some(api_key) = self.config.api_key.as_deref() else {
            return Err(EmailError::NotConfigured);
        };

        let html = render_confirmation(name.trim())?;

        let resp = self
            .http
            .post(&self.config.api_url)
            .bearer_auth(api_key)
            .json(&json!({
                "from": self.config.from,
                "to": [email],
                "subject": CONFIRMATION_SUBJECT,
                "html": html,
            }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body: Value = resp
                .json()
                .await
                .unwrap_or_else(|_| json!({ "status": status.as_u16() }));
            warn!(status = status.as_u16(), body = %body, "📧 Resend rejected confirmation");
            return Err(EmailError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ProviderResponse = resp.json().await?;
        info!(message_id = %parsed.id, "📧 Confirmation email sent");
        Ok(parsed.id)
    }

    /// Fire-and-forget variant: the registration path never waits on or sees the result.
    pub fn spawn_confirmation(&self, name: String, email: String) {
        let client = self.clone();
        tokio::spawn(async move {
            if let Err(e) = client.send_confirmation(&name, &email).await {
                warn!("📧 Failed to send confirmation email to {}: {}", email, e);
            }
        });
    }
}
