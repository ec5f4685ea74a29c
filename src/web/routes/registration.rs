use askama::Template;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;

use crate::services::registration_service::{self, RegistrationError, RegistrationForm};
use crate::web::routes::{branch_options, render, render_with_status, BranchOption, FormValues};
use crate::web::state::AppState;

#[derive(Template)]
#[template(path = "registration.html")]
pub struct RegistrationTemplate {
    pub form: FormValues,
    pub branches: Vec<BranchOption>,
    pub error: Option<String>,
    pub registered: bool,
}

#[derive(Deserialize, Default)]
pub struct RegistrationPageQuery {
    registered: Option<String>,
}

pub async fn registration_page(
    State(state): State<AppState>,
    Query(query): Query<RegistrationPageQuery>,
) -> Response {
    let template = RegistrationTemplate {
        form: FormValues::default(),
        branches: branch_options(&state.pool, None).await,
        error: None,
        registered: query.registered.is_some(),
    };
    render(&template)
}

pub async fn register_handler(
    State(state): State<AppState>,
    Form(form): Form<RegistrationForm>,
) -> Response {
    match registration_service::register_public(&state.pool, &state.changes, &form).await {
        Ok(_) => Redirect::to("/?registered=1").into_response(),
        Err(e) => {
            let status = if e.is_validation() {
                StatusCode::UNPROCESSABLE_ENTITY
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            let template = RegistrationTemplate {
                branches: branch_options(&state.pool, form.branch.as_deref()).await,
                form: FormValues::from(&form),
                error: Some(public_message(&e)),
                registered: false,
            };
            render_with_status(status, &template)
        }
    }
}

fn public_message(err: &RegistrationError) -> String {
    if err.is_validation() {
        err.to_string()
    } else {
        "Something went wrong. Please try again.".to_string()
    }
}
