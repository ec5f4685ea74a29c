pub mod middleware;
pub mod routes;
pub mod state;

use axum::{
    middleware as axum_middleware,
    routing::{get, get_service, post},
    Router,
};
use http::header::{HeaderValue, CACHE_CONTROL};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::web::middleware::auth as auth_middleware;
use crate::web::routes::{admin, admin_register, auth, branches, email, registration, reports};

pub use state::AppState;

pub fn build_router(state: AppState) -> Router {
    // Admin routes under one middleware layer
    let protected_routes = Router::new()
        .route("/admin", get(admin::dashboard_handler))
        .route("/admin/feed/more", post(admin::load_more_handler))
        .route("/admin/feed/refresh", post(admin::refresh_handler))
        .route("/admin/feed/events", get(admin::feed_events_handler))
        .route("/admin/records/:id", post(admin::edit_handler))
        .route("/admin/records/:id/delete", post(admin::delete_handler))
        .route("/admin/chart", get(admin::chart_handler))
        .route(
            "/admin/register",
            get(admin_register::admin_register_page).post(admin_register::admin_register_handler),
        )
        .route("/admin/reports", get(reports::reports_page))
        .route("/admin/reports/export", get(reports::export_handler))
        .route("/admin/logout", post(auth::logout_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware::require_admin,
        ));

    Router::new()
        // Public routes
        .route("/", get(registration::registration_page))
        .route("/register", post(registration::register_handler))
        .route(
            "/admin/login",
            get(auth::login_page).post(auth::login_handler),
        )
        .route(
            "/api/send-email",
            post(email::send_email_handler).fallback(email::method_not_allowed),
        )
        .route("/api/branches", get(branches::list_branches_handler))
        .merge(protected_routes)
        .nest_service(
            "/assets",
            get_service(ServeDir::new("assets")).layer(SetResponseHeaderLayer::if_not_present(
                CACHE_CONTROL,
                HeaderValue::from_static("no-store"),
            )),
        )
        .layer(SetResponseHeaderLayer::if_not_present(
            CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .with_state(state)
}
