use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use cookie::{Cookie, SameSite};
use tracing::debug;

use crate::services::session_service::AdminSession;
use crate::web::state::AppState;

pub const SESSION_COOKIE: &str = "admin_session";

/// Signed-in admin, injected for every protected route.
#[derive(Clone)]
pub struct AdminContext {
    pub session: Arc<AdminSession>,
}

/// Value of the session cookie across all `Cookie` headers.
pub fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|hv| hv.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|c| Cookie::parse(c.trim().to_string()).ok())
        .find(|c| c.name() == SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

pub fn session_cookie(value: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, value);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie
}

pub fn cleared_session_cookie() -> Cookie<'static> {
    let mut cookie = session_cookie(String::new());
    cookie.make_removal();
    cookie
}

pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(id) = session_id(request.headers()) {
        if let Some(session) = state.sessions.get_active(&id).await {
            request.extensions_mut().insert(AdminContext { session });
            return next.run(request).await;
        }
        debug!("Stale admin session cookie");
    }

    Redirect::to("/admin/login").into_response()
}
