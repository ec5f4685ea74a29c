use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::SqlitePool;

use crate::config::AppConfig;
use crate::services::change_feed::ChangeFeed;
use crate::services::email_service::EmailClient;
use crate::services::feed_service::FeedHandle;
use crate::services::session_service::SessionRegistry;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub changes: ChangeFeed,
    pub sessions: SessionRegistry,
    pub email: EmailClient,
    /// Shared client for the auth service.
    pub http: reqwest::Client,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: AppConfig) -> Self {
        Self {
            pool,
            changes: ChangeFeed::default(),
            sessions: SessionRegistry::new(config.session_ttl_minutes),
            email: EmailClient::new(config.email.clone()),
            http: reqwest::Client::new(),
            config: Arc::new(config),
        }
    }

    /// Starts a live feed for a newly signed-in admin.
    pub fn spawn_feed(&self) -> FeedHandle {
        FeedHandle::spawn(
            self.pool.clone(),
            self.changes.clone(),
            self.config.feed_page_size,
        )
    }
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}
