//! # passage-engine
//!
//! The redemption and peer-state engine:
//!
//! - [`alloc`] - collision-free address allocation from the configured pool
//! - [`redeem`] - voucher redemption orchestration
//! - [`reaper`] - periodic expiry sweep
//! - [`mint`] - administrative voucher creation
//! - [`subscription`] - self-service lookup by access token
//! - [`admin`] - administrative subscription and peer operations
//!
//! Every component takes its store handle and external capabilities at
//! construction; nothing reaches for process-wide state.

pub mod admin;
pub mod alloc;
pub mod mint;
pub mod reaper;
pub mod redeem;
pub mod subscription;
mod token;

pub use redeem::RedemptionCoordinator;
pub use reaper::{ExpiryReaper, ReapReport};

use passage_types::AccessGrant;

/// Failure modes of voucher redemption.
///
/// The first five occur before any store mutation and are safe to retry.
/// [`RedeemError::SyncFailed`] is different: the grant is already committed
/// and stays valid; it becomes live on the next successful synchronization.
#[derive(Debug, thiserror::Error)]
pub enum RedeemError {
    #[error("invalid voucher code format")]
    InvalidFormat,

    #[error("voucher not found")]
    NotFound,

    #[error("voucher already redeemed")]
    AlreadyRedeemed,

    #[error(transparent)]
    AddressPool(#[from] alloc::AllocError),

    #[error("key generation failed: {0}")]
    KeyGen(#[source] passage_wg::WgError),

    #[error("settings row unusable: {0}")]
    Settings(String),

    /// The grant committed but the live daemon could not be updated.
    #[error("synchronization failed after grant was committed: {reason}")]
    SyncFailed { grant: AccessGrant, reason: String },

    #[error("store failure: {0}")]
    Store(#[from] passage_db::DbError),
}

/// Failure modes of the non-redemption engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] passage_db::DbError),

    #[error(transparent)]
    Wg(#[from] passage_wg::WgError),

    #[error(transparent)]
    Code(#[from] passage_voucher::CodeError),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}
