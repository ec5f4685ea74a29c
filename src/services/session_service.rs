use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{watch, RwLock};
use tracing::info;
use uuid::Uuid;

use crate::services::auth_service::AdminIdentity;
use crate::services::feed_service::FeedHandle;

/// A signed-in admin. Owns the admin's live feed; dropping the last
/// reference stops it.
pub struct AdminSession {
    pub id: String,
    pub identity: AdminIdentity,
    pub expires_at: DateTime<Utc>,
    pub feed: FeedHandle,
    signed_in: watch::Sender<bool>,
}

impl AdminSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Flips to `false` when the session is signed out, from anywhere.
    pub fn watch_signed_in(&self) -> watch::Receiver<bool> {
        self.signed_in.subscribe()
    }
}

#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, Arc<AdminSession>>>>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(ttl_minutes: i64) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl: Duration::minutes(ttl_minutes.max(1)),
        }
    }

    pub async fn sign_in(&self, identity: AdminIdentity, feed: FeedHandle) -> Arc<AdminSession> {
        let (signed_in, _) = watch::channel(true);
        let session = Arc::new(AdminSession {
            id: Uuid::new_v4().to_string(),
            identity,
            expires_at: Utc::now() + self.ttl,
            feed,
            signed_in,
        });

        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        info!(user = %session.identity.email, "🔓 Admin session started");
        session
    }

    /// Live, unexpired session. An expired one is signed out on the spot.
    pub async fn get_active(&self, session_id: &str) -> Option<Arc<AdminSession>> {
        let session = self.sessions.read().await.get(session_id).cloned()?;
        if session.is_expired(Utc::now()) {
            self.sign_out(session_id).await;
            return None;
        }
        Some(session)
    }

    pub async fn sign_out(&self, session_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(session_id);
        match removed {
            Some(session) => {
                let _ = session.signed_in.send(false);
                info!(user = %session.identity.email, "🔒 Admin session ended");
                true
            }
            None => false,
        }
    }

    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let expired: Vec<String> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| s.is_expired(now))
            .map(|s| s.id.clone())
            .collect();

        let mut ended = 0;
        for id in expired {
            if self.sign_out(&id).await {
                ended += 1;
            }
        }
        ended
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
