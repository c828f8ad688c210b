//! Peer query functions.
//!
//! Peers are never deleted. Disabling keeps the row (and its unique
//! `ip_address`) so an address handed out once can never be reassigned.

use rusqlite::Connection;

use passage_types::PeerKind;

use crate::{DbError, Result};

/// A raw peer row.
#[derive(Debug, Clone)]
pub struct PeerRow {
    pub id: i64,
    pub subscription_id: Option<i64>,
    pub public_key: String,
    pub private_key: Option<String>,
    pub ip_address: String,
    pub enabled: bool,
    pub kind: PeerKind,
    pub created_at: u64,
}

fn row_to_peer(row: &rusqlite::Row<'_>) -> rusqlite::Result<PeerRow> {
    let kind: String = row.get(6)?;
    Ok(PeerRow {
        id: row.get(0)?,
        subscription_id: row.get(1)?,
        public_key: row.get(2)?,
        private_key: row.get(3)?,
        ip_address: row.get(4)?,
        enabled: row.get::<_, bool>(5)?,
        kind: PeerKind::parse(&kind).unwrap_or(PeerKind::Auto),
        created_at: row.get::<_, i64>(7)? as u64,
    })
}

const COLUMNS: &str =
    "id, subscription_id, public_key, private_key, ip_address, enabled, kind, created_at";

/// Insert an auto-provisioned peer with its generated keys; returns its id.
pub fn insert_auto(
    conn: &Connection,
    subscription_id: i64,
    public_key: &str,
    private_key: &str,
    ip_address: &str,
    created_at: u64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO peers (subscription_id, public_key, private_key, ip_address, enabled, kind, created_at)
         VALUES (?1, ?2, ?3, ?4, 1, 'auto', ?5)",
        rusqlite::params![subscription_id, public_key, private_key, ip_address, created_at as i64],
    )
    .map_err(map_ip_conflict(ip_address))?;
    Ok(conn.last_insert_rowid())
}

/// Insert a manually imported peer (no subscription, no private key).
pub fn insert_manual(
    conn: &Connection,
    public_key: &str,
    ip_address: &str,
    created_at: u64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO peers (subscription_id, public_key, private_key, ip_address, enabled, kind, created_at)
         VALUES (NULL, ?1, NULL, ?2, 1, 'manual', ?3)",
        rusqlite::params![public_key, ip_address, created_at as i64],
    )
    .map_err(map_ip_conflict(ip_address))?;
    Ok(conn.last_insert_rowid())
}

fn map_ip_conflict(ip: &str) -> impl FnOnce(rusqlite::Error) -> DbError + '_ {
    move |e| match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            DbError::Constraint(format!("ip address '{ip}' already assigned"))
        }
        other => DbError::Sqlite(other),
    }
}

/// Every address ever assigned, enabled or not.
pub fn all_addresses(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT ip_address FROM peers")?;
    let rows = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// All currently enabled peers, in insertion order.
pub fn enabled(conn: &Connection) -> Result<Vec<PeerRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM peers WHERE enabled = 1 ORDER BY id"
    ))?;
    let rows = stmt
        .query_map([], row_to_peer)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Get a peer by id.
pub fn get(conn: &Connection, id: i64) -> Result<PeerRow> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM peers WHERE id = ?1"),
        [id],
        row_to_peer,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(format!("peer {id}")),
        other => DbError::Sqlite(other),
    })
}

/// Disable a set of peers. Rows stay in place; only `enabled` flips.
pub fn disable_many(conn: &Connection, ids: &[i64]) -> Result<usize> {
    let mut changed = 0;
    let mut stmt = conn.prepare("UPDATE peers SET enabled = 0 WHERE id = ?1")?;
    for id in ids {
        changed += stmt.execute([id])?;
    }
    Ok(changed)
}

/// Disable every peer belonging to a subscription.
pub fn disable_for_subscription(conn: &Connection, subscription_id: i64) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE peers SET enabled = 0 WHERE subscription_id = ?1",
        [subscription_id],
    )?;
    Ok(changed)
}

/// Total number of peer rows (test and diagnostics helper).
pub fn count(conn: &Connection) -> Result<i64> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM peers", [], |row| row.get(0))?;
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::{subscriptions, vouchers};

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    /// Voucher + subscription fixture; peers reference real subscriptions.
    fn seed_subscription(conn: &Connection, code: &str, token: &str) -> i64 {
        let vid = vouchers::insert(conn, code, 30, 100).expect("voucher");
        subscriptions::insert(conn, "a@b.com", None, vid, 9_000, token, 100).expect("subscription")
    }

    #[test]
    fn test_insert_auto_and_get() {
        let conn = test_db();
        let sid = seed_subscription(&conn, "AAAA-AAAA-AAAA-AAAA", "t1");
        let id = insert_auto(&conn, sid, "PUB", "PRIV", "10.0.0.5", 1_000).expect("insert");
        let peer = get(&conn, id).expect("get");
        assert_eq!(peer.subscription_id, Some(sid));
        assert_eq!(peer.kind, PeerKind::Auto);
        assert!(peer.enabled);
        assert_eq!(peer.private_key.as_deref(), Some("PRIV"));
    }

    #[test]
    fn test_insert_manual_has_no_private_key() {
        let conn = test_db();
        let id = insert_manual(&conn, "PUB", "10.0.0.9", 1_000).expect("insert");
        let peer = get(&conn, id).expect("get");
        assert_eq!(peer.subscription_id, None);
        assert_eq!(peer.private_key, None);
        assert_eq!(peer.kind, PeerKind::Manual);
    }

    #[test]
    fn test_ip_address_unique_even_when_disabled() {
        let conn = test_db();
        let sid1 = seed_subscription(&conn, "AAAA-AAAA-AAAA-AAAA", "t1");
        let sid2 = seed_subscription(&conn, "BBBB-BBBB-BBBB-BBBB", "t2");
        let id = insert_auto(&conn, sid1, "PUB1", "PRIV1", "10.0.0.5", 1_000).expect("insert");
        disable_many(&conn, &[id]).expect("disable");

        let result = insert_auto(&conn, sid2, "PUB2", "PRIV2", "10.0.0.5", 2_000);
        assert!(matches!(result, Err(DbError::Constraint(_))));
    }

    #[test]
    fn test_enabled_filters_disabled_rows() {
        let conn = test_db();
        let sid1 = seed_subscription(&conn, "AAAA-AAAA-AAAA-AAAA", "t1");
        let sid2 = seed_subscription(&conn, "BBBB-BBBB-BBBB-BBBB", "t2");
        let a = insert_auto(&conn, sid1, "A", "a", "10.0.0.5", 1_000).expect("insert");
        insert_auto(&conn, sid2, "B", "b", "10.0.0.6", 1_000).expect("insert");
        disable_many(&conn, &[a]).expect("disable");

        let rows = enabled(&conn).expect("enabled");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].public_key, "B");

        // Both addresses stay reserved.
        assert_eq!(all_addresses(&conn).expect("addresses").len(), 2);
    }

    #[test]
    fn test_disable_for_subscription() {
        let conn = test_db();
        let sid1 = seed_subscription(&conn, "AAAA-AAAA-AAAA-AAAA", "t1");
        let sid2 = seed_subscription(&conn, "BBBB-BBBB-BBBB-BBBB", "t2");
        insert_auto(&conn, sid1, "A", "a", "10.0.0.5", 1_000).expect("insert");
        insert_auto(&conn, sid2, "B", "b", "10.0.0.6", 1_000).expect("insert");

        let changed = disable_for_subscription(&conn, sid1).expect("disable");
        assert_eq!(changed, 1);
        assert_eq!(enabled(&conn).expect("enabled").len(), 1);
    }
}
