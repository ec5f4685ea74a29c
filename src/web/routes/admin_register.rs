use askama::Template;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Extension, Form,
};
use serde::Deserialize;

use crate::services::registration_service::{self, RegistrationError, RegistrationForm};
use crate::web::middleware::auth::AdminContext;
use crate::web::routes::{branch_options, render, render_with_status, BranchOption, FormValues};
use crate::web::state::AppState;

#[derive(Template)]
#[template(path = "admin/register.html")]
pub struct AdminRegisterTemplate {
    pub admin_email: String,
    pub form: FormValues,
    pub branches: Vec<BranchOption>,
    pub error: Option<String>,
    pub success: bool,
}

#[derive(Deserialize, Default)]
pub struct AdminRegisterQuery {
    registered: Option<String>,
}

pub async fn admin_register_page(
    Extension(ctx): Extension<AdminContext>,
    State(state): State<AppState>,
    Query(query): Query<AdminRegisterQuery>,
) -> Response {
    render(&AdminRegisterTemplate {
        admin_email: ctx.session.identity.email.clone(),
        form: FormValues::default(),
        branches: branch_options(&state.pool, None).await,
        error: None,
        success: query.registered.is_some(),
    })
}

pub async fn admin_register_handler(
    Extension(ctx): Extension<AdminContext>,
    State(state): State<AppState>,
    Form(form): Form<RegistrationForm>,
) -> Response {
    let result =
        registration_service::register_admin(&state.pool, &state.changes, &state.email, &form)
            .await;

    match result {
        Ok(_) => Redirect::to("/admin/register?registered=1").into_response(),
        Err(e) => {
            let status = match &e {
                RegistrationError::DuplicatePhone => StatusCode::CONFLICT,
                e if e.is_validation() => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            let message = match &e {
                RegistrationError::Database(inner) => format!("Error registering user: {}", inner),
                other => other.to_string(),
            };
            render_with_status(
                status,
                &AdminRegisterTemplate {
                    admin_email: ctx.session.identity.email.clone(),
                    branches: branch_options(&state.pool, form.branch.as_deref()).await,
                    form: FormValues::from(&form),
                    error: Some(message),
                    success: false,
                },
            )
        }
    }
}
