//! Live admin feed.
//!
//! An [`AdminFeed`] holds the rows an admin has loaded (newest first) plus the
//! dashboard stats. It is seeded by a paginated fetch and kept current by
//! merging insert events from the [`ChangeFeed`].
//!
//! Each signed-in admin gets one feed, owned by a single task behind a
//! [`FeedHandle`]. Refreshes, paging, edits, deletes and live merges are all
//! processed one at a time by that task, so a slow refetch can no longer
//! interleave with a live merge. Inserts are keyed by id: a row that a
//! refetch already returned is neither prepended again nor counted twice.

use std::collections::HashSet;

use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::database::attendance_repo;
use crate::models::{AttendancePatch, AttendanceRow, AttendanceStats, AttendanceStatus};
use crate::services::change_feed::{AttendanceChange, ChangeFeed};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("store request failed: {0}")]
    Store(#[from] sqlx::Error),
    #[error("record {0} not found")]
    NotFound(i64),
    #[error("feed is no longer running")]
    Closed,
}

/// Transient "new registration" announcement, emitted at most once per id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedNotice {
    pub id: i64,
    pub message: String,
    pub record: AttendanceRow,
}

/// Dashboard search box and branch selector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedFilter {
    pub search: String,
    pub branch: Option<String>,
}

impl FeedFilter {
    pub fn new(search: Option<&str>, branch: Option<&str>) -> Self {
        Self {
            search: search.unwrap_or("").trim().to_string(),
            branch: branch
                .map(str::trim)
                .filter(|b| !b.is_empty())
                .map(str::to_string),
        }
    }

    pub fn matches(&self, row: &AttendanceRow) -> bool {
        let needle = self.search.to_lowercase();
        let matches_search = needle.is_empty()
            || row.full_name.to_lowercase().contains(&needle)
            || row.phone_number.to_lowercase().contains(&needle)
            || row.branch.to_lowercase().contains(&needle);

        let matches_branch = match &self.branch {
            Some(branch) => row.branch == *branch,
            None => true,
        };

        matches_search && matches_branch
    }
}

pub fn filter_records<'a>(records: &'a [AttendanceRow], filter: &FeedFilter) -> Vec<&'a AttendanceRow> {
    records.iter().filter(|r| filter.matches(r)).collect()
}

#[derive(Debug, Clone, Default)]
pub struct FeedSnapshot {
    pub records: Vec<AttendanceRow>,
    pub stats: AttendanceStats,
    pub has_more: bool,
    pub pages_loaded: i64,
}

impl FeedSnapshot {
    pub fn filtered(&self, filter: &FeedFilter) -> Vec<&AttendanceRow> {
        filter_records(&self.records, filter)
    }
}

pub struct AdminFeed {
    page_size: i64,
    records: Vec<AttendanceRow>,
    stats: AttendanceStats,
    pages_loaded: i64,
    has_more: bool,
    announced: HashSet<i64>,
}

impl AdminFeed {
    pub fn new(page_size: i64) -> Self {
        Self {
            page_size: page_size.max(1),
            records: Vec::new(),
            stats: AttendanceStats::default(),
            pages_loaded: 0,
            has_more: true,
            announced: HashSet::new(),
        }
    }

    pub fn records(&self) -> &[AttendanceRow] {
        &self.records
    }

    pub fn stats(&self) -> AttendanceStats {
        self.stats
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Replaces the list with page 0 and recomputes stats. On failure the
    /// previous rows and stats stay in place.
    pub async fn reload(&mut self, pool: &SqlitePool) -> Result<(), FeedError> {
        let (page, stats) = match tokio::try_join!(
            attendance_repo::list_page(pool, 0, self.page_size),
            attendance_repo::load_stats(pool),
        ) {
            Ok(v) => v,
            Err(e) => {
                error!("Error fetching attendance feed: {}", e);
                return Err(e.into());
            }
        };

        self.has_more = page.len() as i64 == self.page_size;
        self.records = page;
        self.stats = stats;
        self.pages_loaded = 1;

        // Rows older than page 0 are never announced again.
        match self.records.iter().map(|r| r.id).min() {
            Some(oldest) => self.announced.retain(|id| *id >= oldest),
            None => self.announced.clear(),
        }
        Ok(())
    }

    /// Appends the next page. Returns how many new rows were added; does
    /// nothing once a short page has been seen.
    pub async fn load_more(&mut self, pool: &SqlitePool) -> Result<usize, FeedError> {
        if !self.has_more {
            return Ok(0);
        }

        let offset = self.pages_loaded * self.page_size;
        let page = match attendance_repo::list_page(pool, offset, self.page_size).await {
            Ok(rows) => rows,
            Err(e) => {
                error!("Error fetching attendance page at offset {}: {}", offset, e);
                return Err(e.into());
            }
        };

        self.has_more = page.len() as i64 == self.page_size;
        self.pages_loaded += 1;

        let known: HashSet<i64> = self.records.iter().map(|r| r.id).collect();
        let before = self.records.len();
        self.records
            .extend(page.into_iter().filter(|r| !known.contains(&r.id)));
        Ok(self.records.len() - before)
    }

    /// Only inserts are merged; updates and deletes are picked up by the next reload.
    pub fn apply_change(&mut self, change: &AttendanceChange) -> Option<FeedNotice> {
        match change {
            AttendanceChange::Inserted(row) => self.apply_insert(row.clone()),
            AttendanceChange::Updated(_) | AttendanceChange::Deleted { .. } => None,
        }
    }

    /// Prepends a freshly inserted row and bumps stats, unless the row is
    /// already loaded.
    pub fn apply_insert(&mut self, row: AttendanceRow) -> Option<FeedNotice> {
        let notice = self.announced.insert(row.id).then(|| FeedNotice {
            id: row.id,
            message: format!("New Registration: {}", row.full_name),
            record: row.clone(),
        });

        if self.records.iter().any(|r| r.id == row.id) {
            debug!(id = row.id, "insert event for a row that is already loaded");
            return notice;
        }

        self.stats.total += 1;
        match AttendanceStatus::parse(&row.status).map(AttendanceStatus::is_guest_class) {
            Some(true) => self.stats.guests += 1,
            Some(false) => self.stats.members += 1,
            None => warn!(id = row.id, status = %row.status, "insert event with unknown status"),
        }
        self.records.insert(0, row);
        notice
    }

    pub fn remove_local(&mut self, id: i64) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        self.records.len() != before
    }

    pub fn filtered(&self, filter: &FeedFilter) -> Vec<&AttendanceRow> {
        filter_records(&self.records, filter)
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            records: self.records.clone(),
            stats: self.stats,
            has_more: self.has_more,
            pages_loaded: self.pages_loaded,
        }
    }

    /// Partial update by id, then a full reload of page 0.
    pub async fn update_record(
        &mut self,
        pool: &SqlitePool,
        changes: &ChangeFeed,
        id: i64,
        patch: &AttendancePatch,
    ) -> Result<(), FeedError> {
        let affected = attendance_repo::update(pool, id, patch).await.map_err(|e| {
            error!("Update error for record {}: {}", id, e);
            FeedError::Store(e)
        })?;
        if affected == 0 && !patch.is_empty() {
            return Err(FeedError::NotFound(id));
        }

        if let Ok(Some(row)) = attendance_repo::find_by_id(pool, id).await {
            changes.publish(AttendanceChange::Updated(row));
        }
        info!(id, "✏️  Attendance record updated");

        if let Err(e) = self.reload(pool).await {
            warn!("Reload after update failed: {}", e);
        }
        Ok(())
    }

    /// Delete by id, drop the row locally, then reload page 0 to resync stats.
    pub async fn delete_record(
        &mut self,
        pool: &SqlitePool,
        changes: &ChangeFeed,
        id: i64,
    ) -> Result<(), FeedError> {
        let affected = attendance_repo::delete(pool, id).await.map_err(|e| {
            error!("Delete error for record {}: {}", id, e);
            FeedError::Store(e)
        })?;
        if affected == 0 {
            return Err(FeedError::NotFound(id));
        }

        self.remove_local(id);
        changes.publish(AttendanceChange::Deleted { id });
        info!(id, "🗑️  Attendance record deleted");

        if let Err(e) = self.reload(pool).await {
            warn!("Reload after delete failed: {}", e);
        }
        Ok(())
    }
}

enum FeedCommand {
    Reload {
        reply: oneshot::Sender<Result<(), FeedError>>,
    },
    LoadMore {
        reply: oneshot::Sender<Result<usize, FeedError>>,
    },
    Update {
        id: i64,
        patch: AttendancePatch,
        reply: oneshot::Sender<Result<(), FeedError>>,
    },
    Delete {
        id: i64,
        reply: oneshot::Sender<Result<(), FeedError>>,
    },
    Snapshot {
        reply: oneshot::Sender<FeedSnapshot>,
    },
}

/// Handle to a running feed task. The task stops once every handle is dropped.
#[derive(Clone)]
pub struct FeedHandle {
    commands: mpsc::Sender<FeedCommand>,
    notices: broadcast::Sender<FeedNotice>,
}

impl FeedHandle {
    /// Subscribes to `changes` and starts the task, which performs the initial
    /// load before serving any command.
    pub fn spawn(pool: SqlitePool, changes: ChangeFeed, page_size: i64) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(32);
        let (notices_tx, _) = broadcast::channel(64);
        let change_rx = changes.subscribe();

        let task = FeedTask {
            feed: AdminFeed::new(page_size),
            pool,
            changes,
            change_rx,
            commands: commands_rx,
            notices: notices_tx.clone(),
        };
        tokio::spawn(task.run());

        Self {
            commands: commands_tx,
            notices: notices_tx,
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> FeedCommand,
    ) -> Result<T, FeedError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| FeedError::Closed)?;
        rx.await.map_err(|_| FeedError::Closed)
    }

    pub async fn reload(&self) -> Result<(), FeedError> {
        self.request(|reply| FeedCommand::Reload { reply }).await?
    }

    pub async fn load_more(&self) -> Result<usize, FeedError> {
        self.request(|reply| FeedCommand::LoadMore { reply }).await?
    }

    pub async fn update(&self, id: i64, patch: AttendancePatch) -> Result<(), FeedError> {
        self.request(|reply| FeedCommand::Update { id, patch, reply })
            .await?
    }

    pub async fn delete(&self, id: i64) -> Result<(), FeedError> {
        self.request(|reply| FeedCommand::Delete { id, reply }).await?
    }

    pub async fn snapshot(&self) -> Result<FeedSnapshot, FeedError> {
        self.request(|reply| FeedCommand::Snapshot { reply }).await
    }

    pub fn notices(&self) -> broadcast::Receiver<FeedNotice> {
        self.notices.subscribe()
    }
}

struct FeedTask {
    feed: AdminFeed,
    pool: SqlitePool,
    changes: ChangeFeed,
    change_rx: broadcast::Receiver<AttendanceChange>,
    commands: mpsc::Receiver<FeedCommand>,
    notices: broadcast::Sender<FeedNotice>,
}

impl FeedTask {
    async fn run(mut self) {
        if let Err(e) = self.feed.reload(&self.pool).await {
            warn!("Initial feed load failed, starting empty: {}", e);
        }

        loop {
            // Pending change events are merged before the next command is served.
            tokio::select! {
                biased;
                change = self.change_rx.recv() => match change {
                    Ok(change) => {
                        if let Some(notice) = self.feed.apply_change(&change) {
                            // No open event streams is fine.
                            let _ = self.notices.send(notice);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Feed lagged behind change events, reloading");
                        let _ = self.feed.reload(&self.pool).await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                command = self.commands.recv() => {
                    let Some(command) = command else { break };
                    self.handle(command).await;
                }
            }
        }

        debug!("admin feed stopped");
    }

    async fn handle(&mut self, command: FeedCommand) {
        match command {
            FeedCommand::Reload { reply } => {
                let _ = reply.send(self.feed.reload(&self.pool).await);
            }
            FeedCommand::LoadMore { reply } => {
                let _ = reply.send(self.feed.load_more(&self.pool).await);
            }
            FeedCommand::Update { id, patch, reply } => {
                let result = self
                    .feed
                    .update_record(&self.pool, &self.changes, id, &patch)
                    .await;
                let _ = reply.send(result);
            }
            FeedCommand::Delete { id, reply } => {
                let result = self.feed.delete_record(&self.pool, &self.changes, id).await;
                let _ = reply.send(result);
            }
            FeedCommand::Snapshot { reply } => {
                let _ = reply.send(self.feed.snapshot());
            }
        }
    }
}
