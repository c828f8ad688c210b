//! Voucher query functions.

use rusqlite::Connection;

use crate::{DbError, Result};

/// A raw voucher row.
#[derive(Debug, Clone)]
pub struct VoucherRow {
    pub id: i64,
    pub code: String,
    pub duration_days: u32,
    pub is_redeemed: bool,
    pub redeemed_at: Option<u64>,
    pub created_at: u64,
}

fn row_to_voucher(row: &rusqlite::Row<'_>) -> rusqlite::Result<VoucherRow> {
    Ok(VoucherRow {
        id: row.get(0)?,
        code: row.get(1)?,
        duration_days: row.get::<_, i64>(2)? as u32,
        is_redeemed: row.get::<_, bool>(3)?,
        redeemed_at: row.get::<_, Option<i64>>(4)?.map(|t| t as u64),
        created_at: row.get::<_, i64>(5)? as u64,
    })
}

const COLUMNS: &str = "id, code, duration_days, is_redeemed, redeemed_at, created_at";

/// Insert a new voucher; returns its id.
pub fn insert(conn: &Connection, code: &str, duration_days: u32, created_at: u64) -> Result<i64> {
    conn.execute(
        "INSERT INTO vouchers (code, duration_days, created_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![code, i64::from(duration_days), created_at as i64],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            DbError::Constraint(format!("voucher code '{code}' already exists"))
        }
        other => DbError::Sqlite(other),
    })?;
    Ok(conn.last_insert_rowid())
}

/// Get a voucher by its canonical code.
pub fn get_by_code(conn: &Connection, code: &str) -> Result<VoucherRow> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM vouchers WHERE code = ?1"),
        [code],
        row_to_voucher,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(format!("voucher '{code}'")),
        other => DbError::Sqlite(other),
    })
}

/// Does a voucher with this code exist?
pub fn exists(conn: &Connection, code: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM vouchers WHERE code = ?1",
        [code],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Flip a voucher to redeemed, exactly once.
///
/// Returns `false` when the voucher was already redeemed (a concurrent
/// redemption won the race); the caller must treat that as failure and
/// roll back.
pub fn mark_redeemed(conn: &Connection, id: i64, redeemed_at: u64) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE vouchers SET is_redeemed = 1, redeemed_at = ?2
         WHERE id = ?1 AND is_redeemed = 0",
        rusqlite::params![id, redeemed_at as i64],
    )?;
    Ok(changed == 1)
}

/// List all vouchers, newest first.
pub fn list(conn: &Connection) -> Result<Vec<VoucherRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM vouchers ORDER BY created_at DESC, id DESC"
    ))?;
    let rows = stmt
        .query_map([], row_to_voucher)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
