//! passage-daemon: the voucher-gated WireGuard access daemon.
//!
//! Single OS process running a Tokio async runtime. Operators and frontends
//! talk to it via JSON-RPC over a Unix socket; the expiry reaper runs as an
//! independent periodic task inside the same process.

mod commands;
mod config;
mod rpc;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{error, info};

use passage_engine::admin::AdminOps;
use passage_engine::subscription::SubscriptionService;
use passage_engine::{ExpiryReaper, RedemptionCoordinator};
use passage_wg::runner::SystemWg;
use passage_wg::sync::ConfigSynchronizer;

use crate::config::DaemonConfig;
use crate::rpc::RpcServer;

/// Daemon-wide shared state.
pub struct DaemonState {
    /// Database connection. This mutex is also the advisory lock that makes
    /// address allocation atomic with peer insertion.
    pub db: Arc<tokio::sync::Mutex<rusqlite::Connection>>,
    /// External command runner.
    pub runner: Arc<SystemWg>,
    /// The one synchronizer instance; its internal lock serializes syncs.
    pub synchronizer: Arc<ConfigSynchronizer<SystemWg>>,
    /// Redemption orchestration.
    pub coordinator: RedemptionCoordinator<SystemWg>,
    /// Token-keyed self-service.
    pub subscriptions: SubscriptionService<SystemWg>,
    /// Administrative operations.
    pub admin: AdminOps<SystemWg>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config (log level lives there)
    let config = DaemonConfig::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(config.advanced.log_level.parse()?),
        )
        .init();

    info!("Passage daemon starting");

    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;

    // 2. Open database
    let db_path = data_dir.join("passage.db");
    let conn = passage_db::open(&db_path)?;
    let db = Arc::new(tokio::sync::Mutex::new(conn));

    // 3. Wire up the engine
    let runner = Arc::new(
        SystemWg::new().with_timeout(config.wireguard.command_timeout_secs),
    );
    let synchronizer = Arc::new(ConfigSynchronizer::new(
        db.clone(),
        runner.clone(),
        &config.wireguard.config_dir,
        config.backup_dir(),
    ));
    let coordinator = RedemptionCoordinator::new(db.clone(), runner.clone(), synchronizer.clone());
    let subscriptions = SubscriptionService::new(db.clone(), runner.clone());
    let admin = AdminOps::new(db.clone(), synchronizer.clone());

    // 4. Create shutdown channel
    let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);

    // 5. Spawn the expiry reaper
    let reaper = ExpiryReaper::new(
        db.clone(),
        synchronizer.clone(),
        Duration::from_secs(config.expiry.sweep_interval_secs),
    );
    tokio::spawn(reaper.run(shutdown_tx.subscribe()));

    // 6. Build daemon state
    let state = Arc::new(DaemonState {
        db,
        runner,
        synchronizer,
        coordinator,
        subscriptions,
        admin,
    });

    // 7. Run the RPC server until shutdown
    let socket_path = data_dir.join("passage.sock");
    let rpc_server = RpcServer::new(state, socket_path.clone());

    let mut shutdown_rx = shutdown_tx.subscribe();
    tokio::select! {
        result = rpc_server.run() => {
            if let Err(e) = result {
                error!("RPC server error: {}", e);
            }
        }
        _ = shutdown_rx.recv() => {
            info!("Shutdown signal received");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
        }
    }

    // Graceful shutdown
    info!("Daemon shutting down gracefully");
    let _ = shutdown_tx.send(());
    let _ = std::fs::remove_file(&socket_path);

    info!("Daemon stopped");
    Ok(())
}
