use std::convert::Infallible;

use askama::Template;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Redirect, Response,
    },
    Extension, Form,
};
use chrono::DateTime;
use futures::Stream;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, warn};

use crate::models::{AttendanceRow, AttendanceStats};
use crate::services::chart_service::{self, ChartPoint};
use crate::services::feed_service::{FeedError, FeedFilter};
use crate::services::registration_service::{self, RegistrationForm};
use crate::web::middleware::auth::AdminContext;
use crate::web::routes::{
    branch_options, error_page, render, status_options, to_options, BranchOption, FormValues,
};
use crate::web::state::AppState;

const EDIT_STATUSES: [&str; 3] = ["Member", "Guest", "First Timer"];

#[derive(Debug, Clone)]
pub struct RecordView {
    pub id: i64,
    pub time: String,
    pub full_name: String,
    pub phone_number: String,
    pub status: String,
    pub badge_class: String,
    pub branch: String,
    pub location: String,
    pub invited_by: String,
    pub edit_url: String,
}

/// "2026-02-21T09:05:00.000Z" -> "21 Feb, 09:05".
fn display_time(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.format("%d %b, %H:%M").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

impl From<&AttendanceRow> for RecordView {
    fn from(row: &AttendanceRow) -> Self {
        Self {
            id: row.id,
            time: display_time(&row.created_at),
            full_name: row.full_name.clone(),
            phone_number: row.phone_number.clone(),
            status: row.status.clone(),
            badge_class: row.badge_class(),
            branch: row.branch.clone(),
            location: row.location.clone().unwrap_or_else(|| "-".to_string()),
            invited_by: row.invited_by.clone().unwrap_or_else(|| "-".to_string()),
            edit_url: format!("/admin?edit={}", row.id),
        }
    }
}

pub struct EditView {
    pub id: i64,
    pub form: FormValues,
    pub statuses: Vec<BranchOption>,
    pub branches: Vec<BranchOption>,
}

pub struct ChartBar {
    pub date: String,
    pub count: i64,
    pub height_pct: i64,
}

fn chart_bars(points: Vec<ChartPoint>) -> Vec<ChartBar> {
    let max = points.iter().map(|p| p.count).max().unwrap_or(0).max(1);
    points
        .into_iter()
        .map(|p| ChartBar {
            height_pct: p.count * 100 / max,
            date: p.date,
            count: p.count,
        })
        .collect()
}

#[derive(Template)]
#[template(path = "admin/dashboard.html")]
pub struct DashboardTemplate {
    pub admin_email: String,
    pub stats: AttendanceStats,
    pub rows: Vec<RecordView>,
    pub loaded: usize,
    pub has_more: bool,
    pub search: String,
    pub selected_branch: String,
    pub branch_options: Vec<BranchOption>,
    pub editing: Option<EditView>,
    pub notice: Option<String>,
    pub error: Option<String>,
    pub chart: Vec<ChartBar>,
    pub back_url: String,
}

#[derive(Deserialize, Default)]
pub struct DashboardQuery {
    q: Option<String>,
    branch: Option<String>,
    edit: Option<String>,
    notice: Option<String>,
    error: Option<String>,
}

/// Search and branch filter carried through dashboard forms.
#[derive(Deserialize, Default)]
pub struct ReturnParams {
    return_q: Option<String>,
    return_branch: Option<String>,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub(crate) fn dashboard_location(
    q: Option<&str>,
    branch: Option<&str>,
    extra: &[(&'static str, String)],
) -> String {
    let mut params: Vec<(&str, String)> = Vec::new();
    if let Some(q) = non_empty(q) {
        params.push(("q", q));
    }
    if let Some(branch) = non_empty(branch) {
        params.push(("branch", branch));
    }
    params.extend(extra.iter().cloned());

    if params.is_empty() {
        return "/admin".to_string();
    }
    match serde_urlencoded::to_string(&params) {
        Ok(qs) => format!("/admin?{}", qs),
        Err(e) => {
            warn!("Could not encode dashboard query: {}", e);
            "/admin".to_string()
        }
    }
}

fn back_to_dashboard(ret: &ReturnParams, extra: &[(&'static str, String)]) -> Response {
    Redirect::to(&dashboard_location(
        ret.return_q.as_deref(),
        ret.return_branch.as_deref(),
        extra,
    ))
    .into_response()
}

pub async fn dashboard_handler(
    Extension(ctx): Extension<AdminContext>,
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Response {
    let snapshot = match ctx.session.feed.snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            error!("Admin feed unavailable: {}", e);
            return error_page(
                StatusCode::SERVICE_UNAVAILABLE,
                "The live feed stopped. Please sign in again.",
            );
        }
    };

    let filter = FeedFilter::new(query.q.as_deref(), query.branch.as_deref());
    let rows: Vec<RecordView> = snapshot
        .filtered(&filter)
        .into_iter()
        .map(|row| RecordView {
            edit_url: dashboard_location(
                query.q.as_deref(),
                query.branch.as_deref(),
                &[("edit", row.id.to_string())],
            ),
            ..RecordView::from(row)
        })
        .collect();

    let mut branches = branch_options(&state.pool, filter.branch.as_deref()).await;
    if branches.is_empty() {
        let mut names: Vec<String> = snapshot.records.iter().map(|r| r.branch.clone()).collect();
        names.sort();
        names.dedup();
        branches = to_options(names, filter.branch.as_deref());
    }

    let editing = query
        .edit
        .as_deref()
        .and_then(|id| id.parse::<i64>().ok())
        .and_then(|id| snapshot.records.iter().find(|r| r.id == id))
        .map(|row| EditView {
            id: row.id,
            form: FormValues {
                status: row.status.clone(),
                full_name: row.full_name.clone(),
                phone: row.phone_number.clone(),
                branch: row.branch.clone(),
                location: row.location.clone().unwrap_or_default(),
                invited_by: row.invited_by.clone().unwrap_or_default(),
                email: row.email.clone().unwrap_or_default(),
            },
            statuses: status_options(&EDIT_STATUSES, &row.status),
            branches: {
                let mut names: Vec<String> = branches.iter().map(|b| b.name.clone()).collect();
                if !names.contains(&row.branch) {
                    names.push(row.branch.clone());
                }
                to_options(names, Some(row.branch.as_str()))
            },
        });

    let chart = match chart_service::load_registration_chart(&state.pool).await {
        Ok(points) => chart_bars(points),
        Err(e) => {
            warn!("Error loading registration chart: {}", e);
            vec![]
        }
    };

    let template = DashboardTemplate {
        admin_email: ctx.session.identity.email.clone(),
        stats: snapshot.stats,
        rows,
        loaded: snapshot.records.len(),
        has_more: snapshot.has_more,
        search: filter.search,
        selected_branch: filter.branch.unwrap_or_default(),
        branch_options: branches,
        editing,
        notice: non_empty(query.notice.as_deref()),
        error: non_empty(query.error.as_deref()),
        chart,
        back_url: dashboard_location(query.q.as_deref(), query.branch.as_deref(), &[]),
    };
    render(&template)
}

pub async fn load_more_handler(
    Extension(ctx): Extension<AdminContext>,
    Form(ret): Form<ReturnParams>,
) -> Response {
    match ctx.session.feed.load_more().await {
        Ok(_) => back_to_dashboard(&ret, &[]),
        Err(e) => {
            error!("Error loading more records: {}", e);
            back_to_dashboard(&ret, &[("error", "Failed to load more records".to_string())])
        }
    }
}

pub async fn refresh_handler(
    Extension(ctx): Extension<AdminContext>,
    Form(ret): Form<ReturnParams>,
) -> Response {
    match ctx.session.feed.reload().await {
        Ok(()) => back_to_dashboard(&ret, &[]),
        Err(e) => {
            error!("Error refreshing feed: {}", e);
            back_to_dashboard(&ret, &[("error", "Failed to refresh data".to_string())])
        }
    }
}

#[derive(Deserialize)]
pub struct EditForm {
    full_name: Option<String>,
    phone: Option<String>,
    status: Option<String>,
    branch: Option<String>,
    location: Option<String>,
    invited_by: Option<String>,
    return_q: Option<String>,
    return_branch: Option<String>,
}

impl EditForm {
    fn split(self) -> (RegistrationForm, ReturnParams) {
        (
            RegistrationForm {
                status: self.status,
                phone: self.phone,
                full_name: self.full_name,
                branch: self.branch,
                location: self.location,
                invited_by: self.invited_by,
                email: None,
            },
            ReturnParams {
                return_q: self.return_q,
                return_branch: self.return_branch,
            },
        )
    }
}

pub async fn edit_handler(
    Extension(ctx): Extension<AdminContext>,
    Path(id): Path<i64>,
    Form(form): Form<EditForm>,
) -> Response {
    let (form, ret) = form.split();

    let patch = match registration_service::edit_patch(&form) {
        Ok(patch) => patch,
        Err(e) => {
            return back_to_dashboard(&ret, &[("edit", id.to_string()), ("error", e.to_string())]);
        }
    };

    match ctx.session.feed.update(id, patch).await {
        Ok(()) => back_to_dashboard(&ret, &[("notice", "Record updated successfully".to_string())]),
        Err(FeedError::NotFound(_)) => {
            back_to_dashboard(&ret, &[("error", "Record not found".to_string())])
        }
        Err(e) => {
            error!("Error updating record {}: {}", id, e);
            back_to_dashboard(
                &ret,
                &[
                    ("edit", id.to_string()),
                    ("error", "Failed to update record".to_string()),
                ],
            )
        }
    }
}

pub async fn delete_handler(
    Extension(ctx): Extension<AdminContext>,
    Path(id): Path<i64>,
    Form(ret): Form<ReturnParams>,
) -> Response {
    match ctx.session.feed.delete(id).await {
        Ok(()) => back_to_dashboard(&ret, &[("notice", "Record deleted".to_string())]),
        Err(FeedError::NotFound(_)) => {
            back_to_dashboard(&ret, &[("error", "Record not found".to_string())])
        }
        Err(e) => {
            error!("Error deleting record {}: {}", id, e);
            back_to_dashboard(&ret, &[("error", "Failed to delete record".to_string())])
        }
    }
}

pub async fn chart_handler(State(state): State<AppState>) -> Json<Vec<ChartPoint>> {
    match chart_service::load_registration_chart(&state.pool).await {
        Ok(points) => Json(points),
        Err(e) => {
            warn!("Error loading registration chart: {}", e);
            Json(vec![])
        }
    }
}

enum StreamStep {
    Emit(Event),
    Skip,
    Stop,
}

/// Live "new registration" notices for the signed-in admin. The stream ends
/// when the session signs out.
pub async fn feed_events_handler(
    Extension(ctx): Extension<AdminContext>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut notices = ctx.session.feed.notices();
    let mut signed_in = ctx.session.watch_signed_in();
    drop(ctx);

    let stream = async_stream::stream! {
        loop {
            let step = tokio::select! {
                changed = signed_in.changed() => {
                    let active = changed.is_ok() && *signed_in.borrow();
                    if active { StreamStep::Skip } else { StreamStep::Stop }
                }
                notice = notices.recv() => match notice {
                    Ok(notice) => match Event::default()
                        .event("registration")
                        .id(format!("registration-{}", notice.id))
                        .json_data(&notice)
                    {
                        Ok(event) => StreamStep::Emit(event),
                        Err(e) => {
                            warn!("Could not encode feed notice: {}", e);
                            StreamStep::Skip
                        }
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        StreamStep::Emit(Event::default().event("resync").data(skipped.to_string()))
                    }
                    Err(RecvError::Closed) => StreamStep::Stop,
                },
            };

            match step {
                StreamStep::Emit(event) => yield Ok(event),
                StreamStep::Skip => continue,
                StreamStep::Stop => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
