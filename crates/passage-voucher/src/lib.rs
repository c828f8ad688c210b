//! # passage-voucher
//!
//! Voucher code format: four dash-separated groups of four characters from
//! a 32-character alphabet with the ambiguous I, O, 0 and 1 removed
//! (`TEFD-8MN5-D99Q-48MW`). Generation and validation share the same
//! alphabet so minted codes always pass redemption-side checks.

use rand::Rng;

/// Characters allowed in voucher codes.
pub const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of a code without dashes.
pub const CODE_CHARS: usize = 16;

/// Group size in the canonical dashed form.
const GROUP: usize = 4;

/// Upper bound on unique-code generation attempts.
pub const MAX_MINT_ATTEMPTS: u32 = 100;

/// Voucher code errors.
#[derive(Debug, thiserror::Error)]
pub enum CodeError {
    /// The input cannot be normalized into a canonical code.
    #[error("invalid voucher code format")]
    InvalidFormat,

    /// Unique-code generation gave up after [`MAX_MINT_ATTEMPTS`] collisions.
    #[error("could not generate a unique code after {0} attempts")]
    MintExhausted(u32),
}

fn in_alphabet(c: char) -> bool {
    c.is_ascii() && ALPHABET.contains(&(c as u8))
}

/// Normalize user input into the canonical dashed form.
///
/// Accepts both `TEFD8MN5D99Q48MW` and `TEFD-8MN5-D99Q-48MW`, case- and
/// whitespace-insensitively. Returns `None` when the input cannot be a
/// voucher code at all.
pub fn normalize(input: &str) -> Option<String> {
    let cleaned: String = input
        .trim()
        .chars()
        .filter(|c| *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if cleaned.len() != CODE_CHARS || !cleaned.chars().all(in_alphabet) {
        return None;
    }

    let groups: Vec<&str> = (0..CODE_CHARS / GROUP)
        .map(|i| &cleaned[i * GROUP..(i + 1) * GROUP])
        .collect();
    Some(groups.join("-"))
}

/// Check the strict canonical form: `XXXX-XXXX-XXXX-XXXX`.
pub fn is_canonical(code: &str) -> bool {
    let parts: Vec<&str> = code.split('-').collect();
    parts.len() == CODE_CHARS / GROUP
        && parts
            .iter()
            .all(|p| p.len() == GROUP && p.chars().all(in_alphabet))
}

/// Generate a random canonical code.
pub fn generate() -> String {
    generate_with(&mut rand::rngs::OsRng)
}

/// Generate a random canonical code from the given RNG.
pub fn generate_with<R: Rng>(rng: &mut R) -> String {
    let mut groups = Vec::with_capacity(CODE_CHARS / GROUP);
    for _ in 0..CODE_CHARS / GROUP {
        let part: String = (0..GROUP)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        groups.push(part);
    }
    groups.join("-")
}

/// Mint a code that the `exists` probe does not already know.
///
/// Bounded at [`MAX_MINT_ATTEMPTS`] iterations; collisions beyond that
/// return [`CodeError::MintExhausted`] instead of looping forever.
pub fn mint_unique<E: From<CodeError>>(
    mut exists: impl FnMut(&str) -> Result<bool, E>,
) -> Result<String, E> {
    for _ in 0..MAX_MINT_ATTEMPTS {
        let code = generate();
        if !exists(&code)? {
            return Ok(code);
        }
    }
    Err(CodeError::MintExhausted(MAX_MINT_ATTEMPTS).into())
}
