use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use tower::ServiceExt;

use registration::config::{AppConfig, AuthConfig};
use registration::database::{self, attendance_repo};
use registration::web::{build_router, AppState};

const ADMIN_EMAIL: &str = "admin@usm.test";
const ADMIN_PASSWORD: &str = "correct horse";

async fn test_app() -> (Router, AppState) {
    let pool = database::connect("sqlite::memory:").await.unwrap();
    let config = AppConfig {
        database_url: "sqlite::memory:".to_string(),
        auth: AuthConfig {
            admin_email: Some(ADMIN_EMAIL.to_string()),
            admin_password: Some(ADMIN_PASSWORD.to_string()),
            ..Default::default()
        },
        ..AppConfig::default()
    };
    let state = AppState::new(pool, config);
    (build_router(state.clone()), state)
}

fn form_post(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Signs in and returns the `Cookie` header value for later requests.
async fn sign_in(app: &Router) -> String {
    let body = format!("email={}&password=correct+horse", ADMIN_EMAIL);
    let response = app
        .clone()
        .oneshot(form_post("/admin/login", &body, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/admin");

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    set_cookie.split(';').next().unwrap().to_string()
}

#[tokio::test]
async fn guest_registration_lands_on_top_of_the_dashboard() {
    let (app, _) = test_app().await;
    let cookie = sign_in(&app).await;

    let response = app
        .clone()
        .oneshot(form_post(
            "/register",
            "status=Guest&phone=0551234567&full_name=Kofi+Mensah&branch=Accra&invited_by=Ama",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/?registered=1");

    let response = app.clone().oneshot(get("/admin", Some(&cookie))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;

    assert!(html.contains(r#"id="stat-total">1<"#));
    assert!(html.contains(r#"id="stat-members">0<"#));
    assert!(html.contains(r#"id="stat-guests">1<"#));
    assert!(html.contains(r#"<span class="badge guest">Guest</span>"#));
    assert!(html.contains("Kofi Mensah"));
}

#[tokio::test]
async fn public_form_reports_missing_fields() {
    let (app, state) = test_app().await;

    let response = app
        .clone()
        .oneshot(form_post("/register", "status=Member&phone=055&full_name=+&branch=Accra", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_text(response).await.contains("Please enter your full name"));

    let page = app.clone().oneshot(get("/?registered=1", None)).await.unwrap();
    assert!(body_text(page).await.contains("See you on Saturday!"));
    assert_eq!(attendance_repo::load_stats(&state.pool).await.unwrap().total, 0);
}

#[tokio::test]
async fn admin_pages_require_a_session() {
    let (app, _) = test_app().await;

    for uri in ["/admin", "/admin/reports", "/admin/reports/export", "/admin/chart"] {
        let response = app.clone().oneshot(get(uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(location(&response), "/admin/login");
    }

    let response = app
        .clone()
        .oneshot(get("/admin", Some("admin_session=forged")))
        .await
        .unwrap();
    assert_eq!(location(&response), "/admin/login");
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let (app, state) = test_app().await;

    let response = app
        .clone()
        .oneshot(form_post(
            "/admin/login",
            "email=admin%40usm.test&password=nope",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(body_text(response).await.contains("Invalid login credentials"));
    assert_eq!(state.sessions.len().await, 0);
}

#[tokio::test]
async fn logout_ends_the_session() {
    let (app, state) = test_app().await;
    let cookie = sign_in(&app).await;
    assert_eq!(state.sessions.len().await, 1);

    let response = app
        .clone()
        .oneshot(form_post("/admin/logout", "", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(location(&response), "/admin/login");
    assert_eq!(state.sessions.len().await, 0);

    let response = app.clone().oneshot(get("/admin", Some(&cookie))).await.unwrap();
    assert_eq!(location(&response), "/admin/login");
}

#[tokio::test]
async fn logout_closes_the_event_stream() {
    let (app, _) = test_app().await;
    let cookie = sign_in(&app).await;

    let events = app
        .clone()
        .oneshot(get("/admin/feed/events", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(events.status(), StatusCode::OK);
    assert_eq!(
        events.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/event-stream"
    );

    let response = app
        .clone()
        .oneshot(form_post("/admin/logout", "", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(location(&response), "/admin/login");

    let body = tokio::time::timeout(
        Duration::from_secs(5),
        to_bytes(events.into_body(), usize::MAX),
    )
    .await;
    assert!(matches!(body, Ok(Ok(_))), "event stream still open after logout");
}

#[tokio::test]
async fn admin_registration_rejects_a_known_phone() {
    let (app, state) = test_app().await;
    let cookie = sign_in(&app).await;

    let first = app
        .clone()
        .oneshot(form_post(
            "/admin/register",
            "status=Member&full_name=Ama&phone=0551234567&branch=Accra",
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(location(&first), "/admin/register?registered=1");

    let second = app
        .clone()
        .oneshot(form_post(
            "/admin/register",
            "status=Guest&full_name=Kwame&phone=0551234567&branch=Accra",
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert!(body_text(second).await.contains("Phone number already registered!"));
    assert_eq!(attendance_repo::load_stats(&state.pool).await.unwrap().total, 1);
}

#[tokio::test]
async fn dashboard_edit_and_delete_keep_filters() {
    let (app, state) = test_app().await;
    let cookie = sign_in(&app).await;

    app.clone()
        .oneshot(form_post(
            "/register",
            "status=Guest&phone=024&full_name=Esi&branch=Kumasi",
            None,
        ))
        .await
        .unwrap();
    let id = attendance_repo::list_page(&state.pool, 0, 10).await.unwrap()[0].id;

    let response = app
        .clone()
        .oneshot(form_post(
            &format!("/admin/records/{id}"),
            "full_name=Esi+Owusu&phone=024&status=Member&branch=Kumasi&location=&invited_by=&return_q=esi&return_branch=",
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(
        location(&response),
        "/admin?q=esi&notice=Record+updated+successfully"
    );
    let updated = attendance_repo::find_by_id(&state.pool, id).await.unwrap().unwrap();
    assert_eq!(updated.full_name, "Esi Owusu");
    assert_eq!(updated.status, "Member");

    let response = app
        .clone()
        .oneshot(form_post(
            &format!("/admin/records/{id}/delete"),
            "return_q=&return_branch=Kumasi",
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(location(&response), "/admin?branch=Kumasi&notice=Record+deleted");
    assert!(attendance_repo::find_by_id(&state.pool, id).await.unwrap().is_none());
}

#[tokio::test]
async fn report_export_serves_csv_or_refuses_empty() {
    let (app, _) = test_app().await;
    let cookie = sign_in(&app).await;

    app.clone()
        .oneshot(form_post(
            "/register",
            "status=Guest&phone=0551234567&full_name=Kofi&branch=Accra&invited_by=Ama",
            None,
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(get("/admin/reports/export?status=Guests", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/csv;charset=utf-8"
    );
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"attendance_report_"));

    let csv = body_text(response).await;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "Time,Full Name,Phone,Status,Branch,Location,Invited By");
    assert!(lines[1].ends_with(r#","Kofi","0551234567",Guest,Accra,,Ama"#));

    let response = app
        .clone()
        .oneshot(get("/admin/reports/export?status=Members", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response).await.contains("No data to export"));
}

#[tokio::test]
async fn send_email_endpoint_status_codes() {
    let (app, _) = test_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/send-email")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"name":"Ama"}"#))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("Email is required"));

    let response = app.clone().oneshot(get("/api/send-email", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    let request = Request::builder()
        .method("POST")
        .uri("/api/send-email")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    // No provider key configured.
    let request = Request::builder()
        .method("POST")
        .uri("/api/send-email")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"name":"Ama","email":"ama@example.com"}"#))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn branches_are_listed_as_json() {
    let (app, state) = test_app().await;
    database::branches_repo::insert_branch(&state.pool, "Accra").await.unwrap();

    let response = app.clone().oneshot(get("/api/branches", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, r#"["Accra"]"#);
}
