//! Peer keypair generation.
//!
//! Key material is opaque text produced by the external `wg` binary; this
//! crate never derives or inspects it beyond base64 shape checks.

use std::sync::Arc;

use base64::Engine;

use crate::runner::WgRunner;
use crate::{Result, WgError};

/// A freshly generated peer keypair, both halves base64 text.
#[derive(Debug, Clone)]
pub struct PeerKeypair {
    pub private_key: String,
    pub public_key: String,
}

/// Generates peer keypairs through the external capability.
pub struct KeyGenerator<R> {
    runner: Arc<R>,
}

impl<R: WgRunner> KeyGenerator<R> {
    pub fn new(runner: Arc<R>) -> Self {
        Self { runner }
    }

    /// `wg genkey` piped into `wg pubkey`. No store interaction; a failure
    /// here leaves nothing to clean up.
    pub async fn generate(&self) -> Result<PeerKeypair> {
        let private_key = self.runner.genkey().await?;
        let public_key = self.runner.pubkey(&private_key).await?;
        Ok(PeerKeypair {
            private_key,
            public_key,
        })
    }
}

/// Validate an externally supplied peer public key: exactly the 44-character
/// standard base64 encoding of 32 bytes.
pub fn validate_public_key(key: &str) -> Result<&str> {
    if key.len() != 44 {
        return Err(WgError::InvalidPublicKey);
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(key)
        .map_err(|_| WgError::InvalidPublicKey)?;
    if bytes.len() != 32 {
        return Err(WgError::InvalidPublicKey);
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    // 32 bytes of 0x42, base64-encoded.
    const GOOD_KEY: &str = "QkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkI=";

    #[test]
    fn test_valid_key_accepted() {
        assert_eq!(validate_public_key(GOOD_KEY).expect("valid"), GOOD_KEY);
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert!(matches!(
            validate_public_key("short"),
            Err(WgError::InvalidPublicKey)
        ));
        assert!(matches!(
            validate_public_key(&format!("{GOOD_KEY}=")),
            Err(WgError::InvalidPublicKey)
        ));
    }

    #[test]
    fn test_non_base64_rejected() {
        let bad = "!".repeat(44);
        assert!(matches!(
            validate_public_key(&bad),
            Err(WgError::InvalidPublicKey)
        ));
    }
}
