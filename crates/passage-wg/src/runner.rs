//! External command boundary.
//!
//! Every interaction with the `wg` and `wg-quick` binaries goes through the
//! [`WgRunner`] trait so tests can substitute a scripted double. The contract
//! is the fixed external protocol: exit status zero means success, anything
//! else is a failure with diagnostics on stderr.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::{Result, WgError};

/// Boxed future type used by [`WgRunner`] so the trait stays object-safe.
pub type WgFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// The injected external-capability boundary.
pub trait WgRunner: Send + Sync {
    /// `wg genkey` — a fresh private key on stdout.
    fn genkey(&self) -> WgFuture<'_, String>;

    /// `wg pubkey` — derive the public key for `private_key` (via stdin).
    fn pubkey(&self, private_key: &str) -> WgFuture<'_, String>;

    /// `wg-quick strip <interface>` — the runtime-safe form of the config.
    fn strip(&self, interface: &str) -> WgFuture<'_, String>;

    /// `wg syncconf <interface> <stripped>` — apply the stripped config live.
    fn syncconf(&self, interface: &str, stripped_path: &Path) -> WgFuture<'_, ()>;

    /// `wg show <interface> dump` — machine-readable live status.
    fn dump(&self, interface: &str) -> WgFuture<'_, String>;

    /// `wg show <interface> public-key` — the server's own public key.
    fn show_public_key(&self, interface: &str) -> WgFuture<'_, String>;
}

/// Default command timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// [`WgRunner`] implementation that runs the real binaries.
#[derive(Debug, Clone)]
pub struct SystemWg {
    timeout_secs: u64,
}

impl Default for SystemWg {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemWg {
    /// Create a runner with the default timeout.
    pub fn new() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Set the per-command timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Run a command to completion, optionally feeding `stdin`, and return
    /// trimmed stdout. Non-zero exit and timeouts are errors; a timed-out
    /// child is killed rather than left running.
    async fn run(&self, program: &str, args: &[String], stdin: Option<&str>) -> Result<String> {
        let command_desc = format!("{program} {}", args.join(" "));
        debug!(command = %command_desc, "running external command");

        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let fut = async {
            let mut child = cmd.spawn().map_err(|source| WgError::Spawn {
                command: command_desc.clone(),
                source,
            })?;

            if let (Some(input), Some(mut handle)) = (stdin, child.stdin.take()) {
                handle
                    .write_all(format!("{input}\n").as_bytes())
                    .await
                    .map_err(|source| WgError::Spawn {
                        command: command_desc.clone(),
                        source,
                    })?;
                drop(handle);
            }

            child
                .wait_with_output()
                .await
                .map_err(|source| WgError::Spawn {
                    command: command_desc.clone(),
                    source,
                })
        };

        let output = tokio::time::timeout(std::time::Duration::from_secs(self.timeout_secs), fut)
            .await
            .map_err(|_| WgError::Timeout {
                command: command_desc.clone(),
                secs: self.timeout_secs,
            })??;

        if !output.status.success() {
            return Err(WgError::CommandFailed {
                command: command_desc,
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl WgRunner for SystemWg {
    fn genkey(&self) -> WgFuture<'_, String> {
        Box::pin(async move { self.run("wg", &["genkey".to_string()], None).await })
    }

    fn pubkey(&self, private_key: &str) -> WgFuture<'_, String> {
        let private_key = private_key.to_string();
        Box::pin(async move {
            self.run("wg", &["pubkey".to_string()], Some(&private_key))
                .await
        })
    }

    fn strip(&self, interface: &str) -> WgFuture<'_, String> {
        let interface = interface.to_string();
        Box::pin(async move {
            self.run("wg-quick", &["strip".to_string(), interface], None)
                .await
        })
    }

    fn syncconf(&self, interface: &str, stripped_path: &Path) -> WgFuture<'_, ()> {
        let interface = interface.to_string();
        let stripped: PathBuf = stripped_path.to_path_buf();
        Box::pin(async move {
            self.run(
                "wg",
                &[
                    "syncconf".to_string(),
                    interface,
                    stripped.to_string_lossy().into_owned(),
                ],
                None,
            )
            .await?;
            Ok(())
        })
    }

    fn dump(&self, interface: &str) -> WgFuture<'_, String> {
        let interface = interface.to_string();
        Box::pin(async move {
            self.run(
                "wg",
                &["show".to_string(), interface, "dump".to_string()],
                None,
            )
            .await
        })
    }

    fn show_public_key(&self, interface: &str) -> WgFuture<'_, String> {
        let interface = interface.to_string();
        Box::pin(async move {
            self.run(
                "wg",
                &["show".to_string(), interface, "public-key".to_string()],
                None,
            )
            .await
        })
    }
}
