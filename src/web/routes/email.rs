use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};

use crate::services::email_service::EmailError;
use crate::web::state::AppState;

#[derive(Deserialize)]
pub struct SendEmailRequest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

/// `POST /api/send-email`, the confirmation mail as a standalone endpoint.
pub async fn send_email_handler(
    State(state): State<AppState>,
    payload: Result<Json<SendEmailRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            warn!("Malformed send-email request: {}", rejection);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": rejection.body_text() })),
            )
                .into_response();
        }
    };

    let email = req.email.unwrap_or_default();
    if email.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(EmailError::MissingRecipient.to_body()),
        )
            .into_response();
    }

    let name = req.name.unwrap_or_default();
    match state.email.send_confirmation(&name, &email).await {
        Ok(id) => Json(json!({ "data": { "id": id } })).into_response(),
        Err(e) => {
            error!("Error sending email: {}", e);
            let status = match e {
                EmailError::MissingRecipient => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, Json(e.to_body())).into_response()
        }
    }
}

pub async fn method_not_allowed() -> Response {
    (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed").into_response()
}
