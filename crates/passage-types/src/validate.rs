//! Light input validation for redemption requests.

/// Minimal email plausibility check.
pub fn is_email(s: &str) -> bool {
    !s.is_empty() && s.contains('@')
}

/// Phone numbers: digits, `+`, `-` and spaces, 7 to 15 characters.
pub fn is_phone(s: &str) -> bool {
    (7..=15).contains(&s.len())
        && s.chars()
            .all(|c| c.is_ascii_digit() || c == '+' || c == '-' || c == ' ')
}
