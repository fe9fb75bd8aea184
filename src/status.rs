//! Status banner fed by backend progress logs
//!
//! A background task polls `GET /api/logs?lastId=<n>`. The newest entry of
//! each non-empty batch becomes the banner text; the banner hides again once
//! no new entry has arrived for a while.

use crate::api::{LogApi, LogEntry};
use crate::config::StatusConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// What the banner currently shows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusBanner {
    pub message: String,
    pub visible: bool,
    /// Highest log id seen so far
    pub last_id: u64,
}

impl StatusBanner {
    /// Take the newest entry of a batch; false when the batch is empty
    pub fn apply(&mut self, entries: &[LogEntry]) -> bool {
        let Some(latest) = entries.last() else {
            return false;
        };
        self.message = latest.message.clone();
        let newest = entries.iter().map(|e| e.id).max().unwrap_or(latest.id);
        self.last_id = self.last_id.max(newest);
        self.visible = true;
        true
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }
}

/// Handle to the polling task
///
/// Dropping the handle stops the task; no fetch happens afterwards.
pub struct StatusPoller {
    handle: Option<JoinHandle<()>>,
    banner: watch::Receiver<StatusBanner>,
}

impl StatusPoller {
    pub fn spawn(api: Arc<dyn LogApi>, config: &StatusConfig) -> Self {
        Self::spawn_with(api, config.poll_interval(), config.hide_after())
    }

    pub fn spawn_with(
        api: Arc<dyn LogApi>,
        poll_interval: Duration,
        hide_after: Duration,
    ) -> Self {
        let (tx, rx) = watch::channel(StatusBanner::default());
        let handle = tokio::spawn(poll_logs(api, tx, poll_interval, hide_after));
        Self {
            handle: Some(handle),
            banner: rx,
        }
    }

    /// Snapshot of the banner
    pub fn banner(&self) -> StatusBanner {
        self.banner.borrow().clone()
    }

    /// Receiver that wakes whenever the banner changes
    pub fn subscribe(&self) -> watch::Receiver<StatusBanner> {
        self.banner.clone()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            tracing::debug!("Status poller stopped");
        }
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll_logs(
    api: Arc<dyn LogApi>,
    tx: watch::Sender<StatusBanner>,
    poll_interval: Duration,
    hide_after: Duration,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + poll_interval, poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut banner = StatusBanner::default();
    let mut hide_at: Option<Instant> = None;

    loop {
        let hide_timer = async move {
            match hide_at {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = ticker.tick() => {
                match api.logs(banner.last_id).await {
                    Ok(entries) => {
                        if banner.apply(&entries) {
                            hide_at = Some(Instant::now() + hide_after);
                            tx.send_replace(banner.clone());
                        }
                    }
                    Err(e) => tracing::debug!("Error fetching logs: {}", e),
                }
            }
            _ = hide_timer => {
                hide_at = None;
                banner.hide();
                tx.send_replace(banner.clone());
            }
        }
    }
}
