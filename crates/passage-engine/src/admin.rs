//! Administrative subscription and peer operations.
//!
//! State changes commit before synchronization; a sync failure is reported
//! but never unwinds the committed change (the manual resync is the
//! recovery path, same as everywhere else).

use std::net::Ipv4Addr;
use std::sync::Arc;

use rusqlite::Connection;
use tokio::sync::Mutex;
use tracing::info;

use passage_db::queries::{peers, subscriptions, vouchers};
use passage_db::DbError;
use passage_types::{clock, SubscriptionStatus};
use passage_wg::keys;
use passage_wg::runner::WgRunner;
use passage_wg::sync::ConfigSynchronizer;

use crate::EngineError;

/// Administrative operations over subscriptions and peers.
pub struct AdminOps<R> {
    db: Arc<Mutex<Connection>>,
    sync: Arc<ConfigSynchronizer<R>>,
}

impl<R: WgRunner> AdminOps<R> {
    pub fn new(db: Arc<Mutex<Connection>>, sync: Arc<ConfigSynchronizer<R>>) -> Self {
        Self { db, sync }
    }

    /// Shut a subscription off before its expiry.
    pub async fn disable_subscription(&self, id: i64) -> Result<(), EngineError> {
        {
            let mut conn = self.db.lock().await;
            let tx = conn.transaction().map_err(DbError::from)?;
            subscriptions::set_status(&tx, id, SubscriptionStatus::Disabled)?;
            peers::disable_for_subscription(&tx, id)?;
            tx.commit().map_err(DbError::from)?;
        }
        info!(subscription_id = id, "subscription disabled");
        self.sync.sync().await?;
        Ok(())
    }

    /// Push a subscription's expiry forward by whole days.
    pub async fn extend_subscription(&self, id: i64, days: u32) -> Result<(), EngineError> {
        let conn = self.db.lock().await;
        subscriptions::extend(&conn, id, days)?;
        info!(subscription_id = id, days, "subscription extended");
        Ok(())
    }

    /// Import an externally managed peer: public key only, no subscription.
    pub async fn import_peer(&self, public_key: &str, ip_address: &str) -> Result<i64, EngineError> {
        keys::validate_public_key(public_key)?;
        let ip: Ipv4Addr = ip_address
            .parse()
            .map_err(|_| EngineError::InvalidInput(format!("invalid ip address '{ip_address}'")))?;

        let peer_id = {
            let conn = self.db.lock().await;
            peers::insert_manual(&conn, public_key, &ip.to_string(), clock::now_secs())?
        };
        info!(peer_id, ip = %ip, "manual peer imported");
        self.sync.sync().await?;
        Ok(peer_id)
    }

    /// All vouchers, for the admin listing.
    pub async fn list_vouchers(&self) -> Result<Vec<vouchers::VoucherRow>, EngineError> {
        let conn = self.db.lock().await;
        Ok(vouchers::list(&conn)?)
    }

    /// All subscriptions, for the admin listing.
    pub async fn list_subscriptions(
        &self,
    ) -> Result<Vec<subscriptions::SubscriptionRow>, EngineError> {
        let conn = self.db.lock().await;
        Ok(subscriptions::list(&conn)?)
    }
}
