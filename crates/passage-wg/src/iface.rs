//! Interface name validation.
//!
//! The interface name ends up in file paths (`/etc/wireguard/<name>.conf`)
//! and in external process arguments, so it is restricted to a strict safe
//! character set. An invalid name is fatal to the operation that needed it;
//! it is never coerced to a default.

use crate::{Result, WgError};

/// Validate that `name` is safe for use in filenames and command lines.
///
/// Allowed: ASCII letters, digits, underscore. No spaces, slashes, dots or
/// dashes.
pub fn validate(name: &str) -> Result<&str> {
    if name.is_empty() {
        return Err(WgError::InterfaceNameMissing);
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(WgError::InterfaceNameInvalid(name.to_string()));
    }
    Ok(name)
}
