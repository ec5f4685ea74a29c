use askama::Template;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use chrono::Utc;
use tracing::error;

use crate::services::report_service::{
    self, format_timestamp, ReportFilter, ReportQuery, PREVIEW_ROWS,
};
use crate::web::middleware::auth::AdminContext;
use crate::web::routes::{error_page, render, status_options, BranchOption};
use crate::web::state::AppState;

const STATUS_CLASSES: [&str; 3] = ["All", "Members", "Guests"];

pub struct PreviewRow {
    pub time: String,
    pub full_name: String,
    pub phone_number: String,
    pub status: String,
    pub branch: String,
}

#[derive(Template)]
#[template(path = "admin/reports.html")]
pub struct ReportsTemplate {
    pub admin_email: String,
    pub start_date: String,
    pub end_date: String,
    pub statuses: Vec<BranchOption>,
    pub generated: bool,
    pub total: usize,
    pub preview: Vec<PreviewRow>,
    pub remaining: usize,
    pub export_query: String,
    pub error: Option<String>,
}

fn export_query(query: &ReportQuery) -> String {
    let params: Vec<(&str, &str)> = [
        ("start_date", query.start_date.as_deref()),
        ("end_date", query.end_date.as_deref()),
        ("status", query.status.as_deref()),
    ]
    .into_iter()
    .filter_map(|(k, v)| v.map(|v| (k, v)))
    .collect();
    serde_urlencoded::to_string(&params).unwrap_or_default()
}

/// Report form. Submitting it (any parameter present) generates a preview.
pub async fn reports_page(
    Extension(ctx): Extension<AdminContext>,
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Response {
    let filter = ReportFilter::from_query(&query);
    let generated =
        query.start_date.is_some() || query.end_date.is_some() || query.status.is_some();

    let mut template = ReportsTemplate {
        admin_email: ctx.session.identity.email.clone(),
        start_date: filter
            .start_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        end_date: filter
            .end_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        statuses: status_options(&STATUS_CLASSES, filter.status.as_str()),
        generated,
        total: 0,
        preview: vec![],
        remaining: 0,
        export_query: export_query(&query),
        error: None,
    };

    if generated {
        match report_service::generate_report(&state.pool, &filter).await {
            Ok(rows) => {
                template.total = rows.len();
                template.remaining = rows.len().saturating_sub(PREVIEW_ROWS);
                template.preview = rows
                    .iter()
                    .take(PREVIEW_ROWS)
                    .map(|r| PreviewRow {
                        time: format_timestamp(&r.created_at),
                        full_name: r.full_name.clone(),
                        phone_number: r.phone_number.clone(),
                        status: r.status.clone(),
                        branch: r.branch.clone(),
                    })
                    .collect();
            }
            Err(e) => template.error = Some(format!("Error generating report: {}", e)),
        }
    }

    render(&template)
}

pub async fn export_handler(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Response {
    let filter = ReportFilter::from_query(&query);
    let rows = match report_service::generate_report(&state.pool, &filter).await {
        Ok(rows) => rows,
        Err(e) => {
            error!("Report export failed: {}", e);
            return error_page(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error generating report: {}", e),
            );
        }
    };

    if rows.is_empty() {
        return error_page(StatusCode::NOT_FOUND, "No data to export");
    }

    let file_name = report_service::export_file_name(Utc::now().date_naive());
    (
        [
            (header::CONTENT_TYPE, "text/csv;charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        report_service::render_csv(&rows),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_link_repeats_only_given_parameters() {
        let query = ReportQuery {
            start_date: Some("2026-02-01".to_string()),
            end_date: None,
            status: Some("Guests".to_string()),
        };
        assert_eq!(export_query(&query), "start_date=2026-02-01&status=Guests");
        assert_eq!(export_query(&ReportQuery::default()), "");
    }
}
