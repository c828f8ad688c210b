//! Subscription query functions.

use rusqlite::Connection;

use passage_types::SubscriptionStatus;

use crate::{DbError, Result};

/// A raw subscription row.
#[derive(Debug, Clone)]
pub struct SubscriptionRow {
    pub id: i64,
    pub email: String,
    pub phone: Option<String>,
    pub voucher_id: i64,
    pub peer_id: Option<i64>,
    pub expires_at: u64,
    pub status: SubscriptionStatus,
    pub access_token: String,
    pub created_at: u64,
}

/// A subscription joined with its peer, for self-service lookup.
#[derive(Debug, Clone)]
pub struct SubscriptionWithPeer {
    pub subscription: SubscriptionRow,
    pub public_key: Option<String>,
    pub private_key: Option<String>,
    pub ip_address: Option<String>,
}

fn row_to_subscription(row: &rusqlite::Row<'_>) -> rusqlite::Result<SubscriptionRow> {
    let status: String = row.get(6)?;
    Ok(SubscriptionRow {
        id: row.get(0)?,
        email: row.get(1)?,
        phone: row.get(2)?,
        voucher_id: row.get(3)?,
        peer_id: row.get(4)?,
        expires_at: row.get::<_, i64>(5)? as u64,
        status: SubscriptionStatus::parse(&status).unwrap_or(SubscriptionStatus::Disabled),
        access_token: row.get(7)?,
        created_at: row.get::<_, i64>(8)? as u64,
    })
}

const COLUMNS: &str =
    "id, email, phone, voucher_id, peer_id, expires_at, status, access_token, created_at";

/// Insert a new active subscription; returns its id.
#[allow(clippy::too_many_arguments)]
pub fn insert(
    conn: &Connection,
    email: &str,
    phone: Option<&str>,
    voucher_id: i64,
    expires_at: u64,
    access_token: &str,
    created_at: u64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO subscriptions (email, phone, voucher_id, expires_at, status, access_token, created_at)
         VALUES (?1, ?2, ?3, ?4, 'active', ?5, ?6)",
        rusqlite::params![
            email,
            phone,
            voucher_id,
            expires_at as i64,
            access_token,
            created_at as i64
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            DbError::Constraint(format!("voucher {voucher_id} already has a subscription"))
        }
        other => DbError::Sqlite(other),
    })?;
    Ok(conn.last_insert_rowid())
}

/// Back-fill the owning peer after the peer row exists.
pub fn set_peer(conn: &Connection, id: i64, peer_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE subscriptions SET peer_id = ?2 WHERE id = ?1",
        rusqlite::params![id, peer_id],
    )?;
    Ok(())
}

/// Get a subscription by id.
pub fn get(conn: &Connection, id: i64) -> Result<SubscriptionRow> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM subscriptions WHERE id = ?1"),
        [id],
        row_to_subscription,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(format!("subscription {id}")),
        other => DbError::Sqlite(other),
    })
}

/// Look up a subscription (with its peer) by access token.
pub fn get_by_token(conn: &Connection, token: &str) -> Result<SubscriptionWithPeer> {
    conn.query_row(
        "SELECT s.id, s.email, s.phone, s.voucher_id, s.peer_id, s.expires_at,
                s.status, s.access_token, s.created_at,
                p.public_key, p.private_key, p.ip_address
         FROM subscriptions s LEFT JOIN peers p ON p.id = s.peer_id
         WHERE s.access_token = ?1",
        [token],
        |row| {
            Ok(SubscriptionWithPeer {
                subscription: row_to_subscription(row)?,
                public_key: row.get(9)?,
                private_key: row.get(10)?,
                ip_address: row.get(11)?,
            })
        },
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound("subscription".into()),
        other => DbError::Sqlite(other),
    })
}

/// Set a subscription's status.
pub fn set_status(conn: &Connection, id: i64, status: SubscriptionStatus) -> Result<()> {
    let changed = conn.execute(
        "UPDATE subscriptions SET status = ?2 WHERE id = ?1",
        rusqlite::params![id, status.as_str()],
    )?;
    if changed == 0 {
        return Err(DbError::NotFound(format!("subscription {id}")));
    }
    Ok(())
}

/// Push the expiry forward by whole days.
pub fn extend(conn: &Connection, id: i64, days: u32) -> Result<()> {
    let changed = conn.execute(
        "UPDATE subscriptions SET expires_at = expires_at + ?2 WHERE id = ?1",
        rusqlite::params![id, i64::from(days) * 86_400],
    )?;
    if changed == 0 {
        return Err(DbError::NotFound(format!("subscription {id}")));
    }
    Ok(())
}

/// Active subscriptions whose expiry has passed.
pub fn expired_active(conn: &Connection, now: u64) -> Result<Vec<SubscriptionRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM subscriptions
         WHERE status = 'active' AND expires_at <= ?1 ORDER BY id"
    ))?;
    let rows = stmt
        .query_map([now as i64], row_to_subscription)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// List all subscriptions, newest first.
pub fn list(conn: &Connection) -> Result<Vec<SubscriptionRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM subscriptions ORDER BY created_at DESC, id DESC"
    ))?;
    let rows = stmt
        .query_map([], row_to_subscription)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
