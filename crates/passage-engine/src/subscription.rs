//! Subscription self-service, keyed by access token.

use std::sync::Arc;

use rusqlite::Connection;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use passage_db::queries::{settings, subscriptions};
use passage_types::clock;
use passage_wg::config::ClientConfig;
use passage_wg::iface;
use passage_wg::runner::WgRunner;

use crate::EngineError;

/// What a subscriber sees when they look themselves up.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionInfo {
    pub email: String,
    pub phone: Option<String>,
    pub status: passage_types::SubscriptionStatus,
    pub expires_at: String,
    pub ip_address: Option<String>,
    pub access_link: Option<String>,
}

/// Token-keyed lookup and client config assembly.
pub struct SubscriptionService<R> {
    db: Arc<Mutex<Connection>>,
    runner: Arc<R>,
}

impl<R: WgRunner> SubscriptionService<R> {
    pub fn new(db: Arc<Mutex<Connection>>, runner: Arc<R>) -> Self {
        Self { db, runner }
    }

    /// Subscription details for a token.
    pub async fn lookup(&self, access_token: &str) -> Result<SubscriptionInfo, EngineError> {
        let conn = self.db.lock().await;
        let joined = subscriptions::get_by_token(&conn, access_token)?;
        let row = settings::get(&conn)?;

        let access_link = joined.ip_address.as_deref().map(|ip| {
            format!(
                "wg://{}:{}?peer={ip}",
                row.server_public_address, row.server_port
            )
        });

        Ok(SubscriptionInfo {
            email: joined.subscription.email,
            phone: joined.subscription.phone,
            status: joined.subscription.status,
            expires_at: clock::to_rfc3339(joined.subscription.expires_at),
            ip_address: joined.ip_address,
            access_link,
        })
    }

    /// Render the client-facing tunnel configuration for a token.
    ///
    /// The server public key is read from the live interface when the
    /// daemon answers; a daemon that is down just means the stanza omits
    /// `PublicKey` and the client fills it in manually.
    pub async fn client_config(&self, access_token: &str) -> Result<String, EngineError> {
        let (joined, row) = {
            let conn = self.db.lock().await;
            (
                subscriptions::get_by_token(&conn, access_token)?,
                settings::get(&conn)?,
            )
        };

        let ip_address = joined
            .ip_address
            .as_deref()
            .ok_or_else(|| EngineError::Store(passage_db::DbError::NotFound("peer".into())))?
            .to_string();

        let interface = iface::validate(&row.wg_interface).map_err(EngineError::Wg)?;
        let server_public_key = match self.runner.show_public_key(interface).await {
            Ok(key) => Some(key),
            Err(e) => {
                debug!(error = %e, "server public key unavailable, omitting from client config");
                None
            }
        };

        Ok(ClientConfig {
            private_key: joined.private_key.as_deref(),
            ip_address: &ip_address,
            server_public_key: server_public_key.as_deref(),
            settings: &row,
        }
        .render())
    }
}
