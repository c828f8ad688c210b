//! # passage-types
//!
//! Shared domain types used across the Passage workspace.
//! All timestamps are Unix epoch seconds (u64); RFC 3339 strings appear
//! only at the external interface boundary.

pub mod clock;
pub mod validate;

use serde::{Deserialize, Serialize};

/// Seconds per voucher duration day.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Access token length in bytes (hex-encoded to twice this).
pub const ACCESS_TOKEN_BYTES: usize = 16;

/// Lifecycle state of a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    /// Created by redemption; its peer is (or should become) live.
    Active,
    /// Past its expiry; peer disabled by the reaper.
    Expired,
    /// Administratively shut off before expiry.
    Disabled,
}

impl SubscriptionStatus {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Disabled => "disabled",
        }
    }

    /// Parse the storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "expired" => Some(Self::Expired),
            "disabled" => Some(Self::Disabled),
            _ => None,
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a peer entered the system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerKind {
    /// Provisioned by voucher redemption; we hold its private key.
    Auto,
    /// Imported by an administrator; public key only.
    Manual,
}

impl PeerKind {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
        }
    }

    /// Parse the storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(Self::Auto),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

impl std::fmt::Display for PeerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result of a successful voucher redemption.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccessGrant {
    /// `wg://<host>:<port>?peer=<ip>` link handed to the client.
    pub access_link: String,
    /// The allocated tunnel address.
    pub ip_address: String,
    /// Subscription expiry, RFC 3339.
    pub expires_at: String,
}
