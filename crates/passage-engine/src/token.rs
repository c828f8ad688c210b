//! Access token generation.

use rand::RngCore;

use passage_types::ACCESS_TOKEN_BYTES;

/// A fresh unguessable token for subscription self-service lookup.
pub fn access_token() -> String {
    let mut bytes = [0u8; ACCESS_TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
