use askama::Template;
use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use cookie::Cookie;
use serde::Deserialize;
use tracing::{error, warn};

use crate::services::auth_service::{self, AuthError};
use crate::web::middleware::auth::{cleared_session_cookie, session_cookie, session_id};
use crate::web::routes::{render, render_with_status};
use crate::web::state::AppState;

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub email: String,
    pub error: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    email: String,
    password: String,
}

pub async fn login_page() -> Response {
    render(&LoginTemplate {
        email: String::new(),
        error: None,
    })
}

fn with_cookie(mut response: Response, cookie: Cookie<'static>) -> Response {
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => error!("Could not encode session cookie: {}", e),
    }
    response
}

pub async fn login_handler(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Response {
    let result = auth_service::sign_in_with_password(
        &state.http,
        &state.config.auth,
        &form.email,
        &form.password,
    )
    .await;

    match result {
        Ok(identity) => {
            let session = state.sessions.sign_in(identity, state.spawn_feed()).await;
            with_cookie(
                Redirect::to("/admin").into_response(),
                session_cookie(session.id.clone()),
            )
        }
        Err(e) => {
            let status = match &e {
                AuthError::InvalidCredentials(_) => StatusCode::UNAUTHORIZED,
                AuthError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
                AuthError::Upstream(_) | AuthError::Parse(_) => StatusCode::BAD_GATEWAY,
            };
            warn!("Admin login failed for {}: {}", form.email, e);
            render_with_status(
                status,
                &LoginTemplate {
                    email: form.email,
                    error: Some(e.to_string()),
                },
            )
        }
    }
}

pub async fn logout_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(id) = session_id(&headers) {
        state.sessions.sign_out(&id).await;
    }
    with_cookie(
        Redirect::to("/admin/login").into_response(),
        cleared_session_cookie(),
    )
}
