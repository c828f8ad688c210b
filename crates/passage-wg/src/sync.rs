//! Configuration synchronization with backup and rollback.
//!
//! `sync()` makes the live daemon's active-peer set equal the store's
//! enabled peers. From any observer the live state moves from the pre-sync
//! set to the post-sync set or not at all: the original file content is
//! backed up before mutation and restored verbatim if either apply phase
//! fails.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::Connection;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use passage_db::queries::{peers, settings};
use passage_types::clock;

use crate::runner::WgRunner;
use crate::{config, iface, Result, WgError};

/// Default location of live WireGuard configuration files.
pub const DEFAULT_CONFIG_DIR: &str = "/etc/wireguard";

/// Keeps the live daemon configuration in step with the store.
pub struct ConfigSynchronizer<R> {
    db: Arc<Mutex<Connection>>,
    runner: Arc<R>,
    config_dir: PathBuf,
    backup_dir: PathBuf,
    /// Serializes synchronizations. Scoped to this struct only so store
    /// reads elsewhere never wait on a sync in progress.
    lock: Mutex<()>,
}

impl<R: WgRunner> ConfigSynchronizer<R> {
    pub fn new(
        db: Arc<Mutex<Connection>>,
        runner: Arc<R>,
        config_dir: impl Into<PathBuf>,
        backup_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            db,
            runner,
            config_dir: config_dir.into(),
            backup_dir: backup_dir.into(),
            lock: Mutex::new(()),
        }
    }

    /// Regenerate the live configuration from the store and apply it.
    ///
    /// At most one synchronization runs at a time; a second caller blocks
    /// until the first has fully completed (applied or rolled back).
    pub async fn sync(&self) -> Result<()> {
        let _guard = self.lock.lock().await;

        // Snapshot settings and enabled peers, then release the store
        // before any file or process work.
        let (row, enabled_peers) = {
            let conn = self.db.lock().await;
            (settings::get(&conn)?, peers::enabled(&conn)?)
        };

        let interface = iface::validate(&row.wg_interface)?.to_string();
        let conf_path = self.config_dir.join(format!("{interface}.conf"));

        let original =
            std::fs::read_to_string(&conf_path).map_err(|source| WgError::ConfigRead {
                path: conf_path.clone(),
                source,
            })?;

        let blocks = config::peer_blocks(&enabled_peers);
        let new_content = config::merge(config::split_preamble(&original), &blocks);

        let backup_path = self
            .backup_dir
            .join(format!("{interface}-conf-backup-{}.conf", clock::now_secs()));
        write_private(&backup_path, &original)?;

        if let Err(e) = write_private(&conf_path, &new_content) {
            let _ = std::fs::remove_file(&backup_path);
            return Err(e);
        }

        debug!(path = %conf_path.display(), peers = enabled_peers.len(),
               "wrote regenerated configuration");

        match self.apply(&interface).await {
            Ok(()) => {
                let _ = std::fs::remove_file(&backup_path);
                info!(interface = %interface, "syncconf successful");
                Ok(())
            }
            Err(e) => {
                warn!(interface = %interface, error = %e, "apply failed, rolling back");
                match write_private(&conf_path, &original) {
                    Ok(()) => {
                        let _ = std::fs::remove_file(&backup_path);
                    }
                    Err(restore_err) => {
                        // Keep the backup file: it is now the only good copy.
                        error!(backup = %backup_path.display(), error = %restore_err,
                               "rollback write failed; original preserved in backup");
                    }
                }
                Err(e)
            }
        }
    }

    /// Two-phase apply: derive the runtime-safe form, then load it into the
    /// running daemon. The stripped temp file never outlives the call.
    async fn apply(&self, interface: &str) -> Result<()> {
        let stripped = self.runner.strip(interface).await?;

        let tmp_path = self
            .backup_dir
            .join(format!("wg-strip-{}.conf", clock::now_secs()));
        write_private(&tmp_path, &stripped)?;

        let result = self.runner.syncconf(interface, &tmp_path).await;
        let _ = std::fs::remove_file(&tmp_path);
        result
    }
}

/// Write a file readable by its owner only. Configurations and backups
/// contain peer public keys and, in the live file, the interface key.
fn write_private(path: &Path, content: &str) -> Result<()> {
    let map_err = |source| WgError::ConfigWrite {
        path: path.to_path_buf(),
        source,
    };

    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .map_err(map_err)?;
        file.write_all(content.as_bytes()).map_err(map_err)
    }
    #[cfg(not(unix))]
    {
        std::fs::write(path, content).map_err(map_err)
    }
}
