//! Administrative voucher creation.

use rusqlite::Connection;
use tracing::info;

use passage_db::queries::vouchers;
use passage_types::clock;

use crate::EngineError;

/// Create one voucher.
///
/// An explicit code is normalized first so admin-entered and user-entered
/// forms can never diverge. With no code given, a unique one is minted
/// (bounded attempts).
pub fn create_voucher(
    conn: &Connection,
    code: Option<&str>,
    duration_days: u32,
) -> Result<String, EngineError> {
    let code = match code {
        Some(raw) => passage_voucher::normalize(raw)
            .ok_or_else(|| EngineError::InvalidInput(format!("invalid voucher code '{raw}'")))?,
        None => passage_voucher::mint_unique(|candidate| {
            vouchers::exists(conn, candidate).map_err(EngineError::from)
        })?,
    };

    vouchers::insert(conn, &code, duration_days, clock::now_secs())?;
    info!(code = %code, duration_days, "voucher created");
    Ok(code)
}

/// Create a batch of generated vouchers; returns the minted codes.
pub fn create_batch(
    conn: &Connection,
    count: u32,
    duration_days: u32,
) -> Result<Vec<String>, EngineError> {
    let mut codes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        codes.push(create_voucher(conn, None, duration_days)?);
    }
    Ok(codes)
}
