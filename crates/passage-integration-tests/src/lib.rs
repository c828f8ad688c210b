//! Shared fixtures for Passage integration tests.
//!
//! [`MockWg`] stands in for the external `wg`/`wg-quick` binaries: keypairs
//! are deterministic, failures are injectable per command, and apply calls
//! are counted. [`Harness`] wires a full engine (in-memory store, tempdir
//! live config) the way the daemon does.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use passage_engine::admin::AdminOps;
use passage_engine::subscription::SubscriptionService;
use passage_engine::{ExpiryReaper, RedemptionCoordinator};
use passage_wg::runner::{WgFuture, WgRunner};
use passage_wg::sync::ConfigSynchronizer;
use passage_wg::WgError;

/// The live config seeded into every harness.
pub const SEED_CONFIG: &str = "[Interface]\nAddress = 10.0.0.1/24\nListenPort = 51820\nPrivateKey = SERVERPRIV\n";

/// Scripted stand-in for the external command boundary.
#[derive(Default)]
pub struct MockWg {
    key_counter: AtomicU64,
    pub syncconf_calls: AtomicU64,
    pub strip_calls: AtomicU64,
    pub fail_genkey: AtomicBool,
    pub fail_strip: AtomicBool,
    pub fail_syncconf: AtomicBool,
}

impl MockWg {
    pub fn new() -> Self {
        Self::default()
    }

    fn command_failure(command: &str, stderr: &str) -> WgError {
        WgError::CommandFailed {
            command: command.to_string(),
            status: 1,
            stderr: stderr.to_string(),
        }
    }

    /// How many times `wg syncconf` ran.
    pub fn syncconf_count(&self) -> u64 {
        self.syncconf_calls.load(Ordering::SeqCst)
    }
}

impl WgRunner for MockWg {
    fn genkey(&self) -> WgFuture<'_, String> {
        Box::pin(async move {
            if self.fail_genkey.load(Ordering::SeqCst) {
                return Err(Self::command_failure("wg genkey", "genkey exploded"));
            }
            let n = self.key_counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("PRIV{n}"))
        })
    }

    fn pubkey(&self, private_key: &str) -> WgFuture<'_, String> {
        let private_key = private_key.to_string();
        Box::pin(async move { Ok(format!("{private_key}.pub")) })
    }

    fn strip(&self, interface: &str) -> WgFuture<'_, String> {
        let interface = interface.to_string();
        Box::pin(async move {
            self.strip_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_strip.load(Ordering::SeqCst) {
                return Err(Self::command_failure("wg-quick strip", "strip rejected"));
            }
            Ok(format!("# stripped {interface}"))
        })
    }

    fn syncconf(&self, _interface: &str, stripped_path: &Path) -> WgFuture<'_, ()> {
        let exists = stripped_path.exists();
        Box::pin(async move {
            self.syncconf_calls.fetch_add(1, Ordering::SeqCst);
            assert!(exists, "stripped file must exist when syncconf runs");
            if self.fail_syncconf.load(Ordering::SeqCst) {
                return Err(Self::command_failure("wg syncconf", "syncconf rejected"));
            }
            Ok(())
        })
    }

    fn dump(&self, _interface: &str) -> WgFuture<'_, String> {
        Box::pin(async move {
            Ok("SERVERPRIV\tSERVERPUB\t51820\toff\nPEER\t(none)\t(none)\t10.0.0.5/32\t0\t0\t0\toff"
                .to_string())
        })
    }

    fn show_public_key(&self, _interface: &str) -> WgFuture<'_, String> {
        Box::pin(async move { Ok("SERVERPUB".to_string()) })
    }
}

/// A full engine over an in-memory store and a tempdir-backed live config.
pub struct Harness {
    pub db: Arc<Mutex<rusqlite::Connection>>,
    pub runner: Arc<MockWg>,
    pub synchronizer: Arc<ConfigSynchronizer<MockWg>>,
    pub coordinator: Arc<RedemptionCoordinator<MockWg>>,
    pub admin: AdminOps<MockWg>,
    pub subscriptions: SubscriptionService<MockWg>,
    pub conf_path: PathBuf,
    pub backup_dir: PathBuf,
    _dir: tempfile::TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let config_dir = dir.path().join("etc");
        let backup_dir = dir.path().join("tmp");
        std::fs::create_dir_all(&config_dir).expect("config dir");
        std::fs::create_dir_all(&backup_dir).expect("backup dir");

        let conf_path = config_dir.join("wg0.conf");
        std::fs::write(&conf_path, SEED_CONFIG).expect("seed config");

        let conn = passage_db::open_memory().expect("open db");
        let db = Arc::new(Mutex::new(conn));
        let runner = Arc::new(MockWg::new());
        let synchronizer = Arc::new(ConfigSynchronizer::new(
            db.clone(),
            runner.clone(),
            &config_dir,
            &backup_dir,
        ));
        let coordinator = Arc::new(RedemptionCoordinator::new(
            db.clone(),
            runner.clone(),
            synchronizer.clone(),
        ));
        let admin = AdminOps::new(db.clone(), synchronizer.clone());
        let subscriptions = SubscriptionService::new(db.clone(), runner.clone());

        Self {
            db,
            runner,
            synchronizer,
            coordinator,
            admin,
            subscriptions,
            conf_path,
            backup_dir,
            _dir: dir,
        }
    }

    /// A reaper over this harness's store and synchronizer.
    pub fn reaper(&self) -> ExpiryReaper<MockWg> {
        ExpiryReaper::new(
            self.db.clone(),
            self.synchronizer.clone(),
            Duration::from_secs(3600),
        )
    }

    /// The current live configuration text.
    pub fn live_config(&self) -> String {
        std::fs::read_to_string(&self.conf_path).expect("read live config")
    }

    /// Files left in the backup directory.
    pub fn backup_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(&self.backup_dir)
            .expect("read backup dir")
            .map(|e| e.expect("dir entry").path())
            .collect()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
