//! # passage-wg
//!
//! The WireGuard boundary: everything that touches the live daemon.
//!
//! This crate implements:
//!
//! - [`iface`] - the safe-charset gate for interface names
//! - [`runner`] - the external `wg`/`wg-quick` command boundary
//! - [`keys`] - keypair generation and public key validation
//! - [`config`] - configuration text rendering and splitting
//! - [`sync`] - the configuration synchronizer with backup/rollback
//! - [`status`] - `wg show <iface> dump` parsing
//!
//! The store stays authoritative at all times: a failed apply restores the
//! previous on-disk configuration byte for byte, so the daemon never runs a
//! configuration the store cannot account for.

pub mod config;
pub mod iface;
pub mod keys;
pub mod runner;
pub mod status;
pub mod sync;

use std::path::PathBuf;

/// Error types for WireGuard operations.
#[derive(Debug, thiserror::Error)]
pub enum WgError {
    /// The settings row names no interface.
    #[error("wg interface not specified")]
    InterfaceNameMissing,

    /// The interface name contains characters unsafe for paths or argv.
    #[error("invalid interface name '{0}'")]
    InterfaceNameInvalid(String),

    /// The live configuration file could not be read.
    #[error("unable to read {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configuration, backup, or temp file could not be written.
    #[error("unable to write {path}: {source}")]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An external command exited non-zero.
    #[error("`{command}` exited with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    /// An external command exceeded its time budget.
    #[error("`{command}` timed out after {secs}s")]
    Timeout { command: String, secs: u64 },

    /// An external command could not be started at all.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// A peer public key is not 44-character base64 of 32 bytes.
    #[error("invalid wg public key")]
    InvalidPublicKey,

    /// `wg show … dump` output did not parse.
    #[error("malformed status dump: {0}")]
    DumpParse(String),

    /// Store access failed.
    #[error(transparent)]
    Db(#[from] passage_db::DbError),
}

/// Convenience result type for WireGuard operations.
pub type Result<T> = std::result::Result<T, WgError>;
