//! Voucher redemption orchestration.
//!
//! Order of operations matters: all fallible external work (key
//! generation) happens before the store transaction, the allocation and
//! every row mutation happen inside one transaction, and synchronization
//! runs after commit. A failed synchronization does not undo the grant;
//! the store is authoritative and the live daemon catches up on the next
//! successful sync.

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::Arc;

use ipnet::Ipv4Net;
use rusqlite::Connection;
use tokio::sync::Mutex;
use tracing::{info, warn};

use passage_db::queries::{peers, settings, subscriptions, vouchers};
use passage_db::DbError;
use passage_types::{clock, AccessGrant};
use passage_wg::keys::KeyGenerator;
use passage_wg::runner::WgRunner;
use passage_wg::sync::ConfigSynchronizer;

use crate::{alloc, token, RedeemError};

/// Orchestrates voucher → subscription → peer provisioning.
pub struct RedemptionCoordinator<R> {
    db: Arc<Mutex<Connection>>,
    keygen: KeyGenerator<R>,
    sync: Arc<ConfigSynchronizer<R>>,
}

impl<R: WgRunner> RedemptionCoordinator<R> {
    pub fn new(
        db: Arc<Mutex<Connection>>,
        runner: Arc<R>,
        sync: Arc<ConfigSynchronizer<R>>,
    ) -> Self {
        Self {
            db,
            keygen: KeyGenerator::new(runner),
            sync,
        }
    }

    /// Redeem a voucher code into a live access grant.
    pub async fn redeem(
        &self,
        code: &str,
        email: &str,
        phone: Option<&str>,
    ) -> Result<AccessGrant, RedeemError> {
        let code = passage_voucher::normalize(code).ok_or(RedeemError::InvalidFormat)?;

        // Fast-fail lookup before paying for key generation. The voucher
        // state is re-checked inside the transaction below; this check only
        // keeps obviously dead requests cheap.
        {
            let conn = self.db.lock().await;
            let voucher = get_voucher(&conn, &code)?;
            if voucher.is_redeemed {
                return Err(RedeemError::AlreadyRedeemed);
            }
        }

        let keypair = self.keygen.generate().await.map_err(RedeemError::KeyGen)?;

        let grant = {
            let mut conn = self.db.lock().await;
            let tx = conn.transaction().map_err(DbError::from)?;

            let voucher = get_voucher(&tx, &code)?;
            if voucher.is_redeemed {
                return Err(RedeemError::AlreadyRedeemed);
            }

            let row = settings::get(&tx)?;
            let subnet: Ipv4Net = row
                .subnet
                .parse()
                .map_err(|_| RedeemError::Settings(format!("bad subnet '{}'", row.subnet)))?;
            let pool_start: Ipv4Addr = row.ip_pool_start.parse().map_err(|_| {
                RedeemError::Settings(format!("bad pool start '{}'", row.ip_pool_start))
            })?;

            // Reserve against every address ever assigned, disabled peers
            // included.
            let reserved: HashSet<Ipv4Addr> = peers::all_addresses(&tx)?
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();
            let ip = alloc::allocate(subnet, pool_start, &reserved)?;

            let now = clock::now_secs();
            let expires_at = clock::expiry_after_days(now, voucher.duration_days);
            let access_token = token::access_token();

            let subscription_id = subscriptions::insert(
                &tx,
                email,
                phone,
                voucher.id,
                expires_at,
                &access_token,
                now,
            )?;
            let peer_id = peers::insert_auto(
                &tx,
                subscription_id,
                &keypair.public_key,
                &keypair.private_key,
                &ip.to_string(),
                now,
            )?;
            subscriptions::set_peer(&tx, subscription_id, peer_id)?;

            // The one-way flip. Zero rows changed means a concurrent
            // redemption beat us to it; dropping the transaction undoes
            // our inserts.
            if !vouchers::mark_redeemed(&tx, voucher.id, now)? {
                return Err(RedeemError::AlreadyRedeemed);
            }

            tx.commit().map_err(DbError::from)?;

            info!(code = %code, subscription_id, peer_id, ip = %ip, "voucher redeemed");

            AccessGrant {
                access_link: format!(
                    "wg://{}:{}?peer={ip}",
                    row.server_public_address, row.server_port
                ),
                ip_address: ip.to_string(),
                expires_at: clock::to_rfc3339(expires_at),
            }
        };

        if let Err(e) = self.sync.sync().await {
            warn!(error = %e, "grant committed but synchronization failed; daemon is stale until the next sync");
            return Err(RedeemError::SyncFailed {
                grant,
                reason: e.to_string(),
            });
        }

        Ok(grant)
    }
}

fn get_voucher(conn: &Connection, code: &str) -> Result<vouchers::VoucherRow, RedeemError> {
    match vouchers::get_by_code(conn, code) {
        Ok(voucher) => Ok(voucher),
        Err(DbError::NotFound(_)) => Err(RedeemError::NotFound),
        Err(e) => Err(e.into()),
    }
}
