//! Periodic expiry sweep.
//!
//! Each tick expires every due subscription and disables its peers in one
//! transaction, then triggers a single batched synchronization. The state
//! changes survive a failed sync; the disabled peers stay pending until any
//! later synchronization succeeds (the next redemption's, a later tick's,
//! or a manual resync).

use std::sync::Arc;
use std::time::Duration;

use rusqlite::Connection;
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};

use passage_db::queries::{peers, subscriptions};
use passage_db::DbError;
use passage_types::{clock, SubscriptionStatus};
use passage_wg::runner::WgRunner;
use passage_wg::sync::ConfigSynchronizer;

use crate::EngineError;

/// Default sweep period: hourly.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;

/// What one tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReapReport {
    /// Subscriptions transitioned to `expired` this tick.
    pub expired: usize,
    /// Set when the batched synchronization failed; the expiry itself is
    /// already committed.
    pub sync_error: Option<String>,
}

/// The periodic expiry sweep task.
pub struct ExpiryReaper<R> {
    db: Arc<Mutex<Connection>>,
    sync: Arc<ConfigSynchronizer<R>>,
    period: Duration,
}

impl<R: WgRunner> ExpiryReaper<R> {
    pub fn new(
        db: Arc<Mutex<Connection>>,
        sync: Arc<ConfigSynchronizer<R>>,
        period: Duration,
    ) -> Self {
        Self { db, sync, period }
    }

    /// One sweep. Callable directly for tests and the RPC surface.
    pub async fn tick(&self) -> Result<ReapReport, EngineError> {
        let (expired, disabled) = {
            let mut conn = self.db.lock().await;
            let tx = conn.transaction().map_err(DbError::from)?;

            let now = clock::now_secs();
            let due = subscriptions::expired_active(&tx, now)?;
            if due.is_empty() {
                return Ok(ReapReport {
                    expired: 0,
                    sync_error: None,
                });
            }

            let mut peer_ids = Vec::with_capacity(due.len());
            for sub in &due {
                subscriptions::set_status(&tx, sub.id, SubscriptionStatus::Expired)?;
                if let Some(peer_id) = sub.peer_id {
                    peer_ids.push(peer_id);
                }
            }
            let disabled = peers::disable_many(&tx, &peer_ids)?;
            tx.commit().map_err(DbError::from)?;

            info!(expired = due.len(), disabled, "expiry sweep committed");
            (due.len(), disabled)
        };

        // One synchronization for the whole batch.
        let mut sync_error = None;
        if disabled > 0 {
            if let Err(e) = self.sync.sync().await {
                warn!(error = %e, "batch sync after expiry failed; disabled peers stay pending");
                sync_error = Some(e.to_string());
            }
        }

        Ok(ReapReport {
            expired,
            sync_error,
        })
    }

    /// Run until the shutdown signal fires. The first sweep happens
    /// immediately, catching up on anything that expired while the daemon
    /// was down.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        error!(error = %e, "expiry sweep failed");
                    }
                }
                _ = shutdown.recv() => {
                    info!("expiry reaper stopping");
                    break;
                }
            }
        }
    }
}
