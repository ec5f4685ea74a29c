pub mod admin;
pub mod admin_register;
pub mod auth;
pub mod branches;
pub mod email;
pub mod registration;
pub mod reports;

use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use sqlx::SqlitePool;
use tracing::{error, warn};

use crate::database::branches_repo;
use crate::services::registration_service::RegistrationForm;

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub message: String,
}

pub(crate) fn render<T: Template>(template: &T) -> Response {
    render_with_status(StatusCode::OK, template)
}

pub(crate) fn render_with_status<T: Template>(status: StatusCode, template: &T) -> Response {
    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            error!("Template render failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

pub(crate) fn error_page(status: StatusCode, message: impl Into<String>) -> Response {
    render_with_status(
        status,
        &ErrorTemplate {
            message: message.into(),
        },
    )
}

#[derive(Debug, Clone)]
pub struct BranchOption {
    pub name: String,
    pub selected: bool,
}

/// Branch select options. A failed lookup leaves the select empty.
pub(crate) async fn branch_options(pool: &SqlitePool, selected: Option<&str>) -> Vec<BranchOption> {
    let names = match branches_repo::list_branches(pool).await {
        Ok(rows) => rows.into_iter().map(|b| b.name).collect(),
        Err(e) => {
            warn!("Error fetching branches: {}", e);
            vec![]
        }
    };
    to_options(names, selected)
}

pub(crate) fn to_options(names: Vec<String>, selected: Option<&str>) -> Vec<BranchOption> {
    names
        .into_iter()
        .map(|name| BranchOption {
            selected: selected == Some(name.as_str()),
            name,
        })
        .collect()
}

/// Status choices for a select, with the current one marked.
pub(crate) fn status_options(choices: &[&str], selected: &str) -> Vec<BranchOption> {
    to_options(
        choices.iter().map(|s| s.to_string()).collect(),
        Some(selected),
    )
}

/// Posted form values echoed back into a re-rendered form.
#[derive(Debug, Clone, Default)]
pub struct FormValues {
    pub status: String,
    pub full_name: String,
    pub phone: String,
    pub branch: String,
    pub location: String,
    pub invited_by: String,
    pub email: String,
}

impl FormValues {
    pub fn is_guest(&self) -> bool {
        self.status == "Guest"
    }
}

impl From<&RegistrationForm> for FormValues {
    fn from(form: &RegistrationForm) -> Self {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        Self {
            status: form
                .status
                .clone()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "Member".to_string()),
            full_name: text(&form.full_name),
            phone: text(&form.phone),
            branch: text(&form.branch),
            location: text(&form.location),
            invited_by: text(&form.invited_by),
            email: text(&form.email),
        }
    }
}
