//! Settings query functions.
//!
//! The settings table holds exactly one row (`id = 1`), seeded at first
//! migration.

use rusqlite::Connection;

use crate::{DbError, Result};

/// The singleton settings row.
#[derive(Debug, Clone)]
pub struct SettingsRow {
    pub wg_interface: String,
    pub subnet: String,
    pub ip_pool_start: String,
    pub server_public_address: String,
    pub server_port: u16,
    pub client_dns: Option<String>,
    pub client_allowed_ips: Option<String>,
}

/// Read the settings row.
pub fn get(conn: &Connection) -> Result<SettingsRow> {
    conn.query_row(
        "SELECT wg_interface, subnet, ip_pool_start, server_public_address,
                server_port, client_dns, client_allowed_ips
         FROM settings WHERE id = 1",
        [],
        |row| {
            Ok(SettingsRow {
                wg_interface: row.get(0)?,
                subnet: row.get(1)?,
                ip_pool_start: row.get(2)?,
                server_public_address: row.get(3)?,
                server_port: row.get::<_, i64>(4)? as u16,
                client_dns: row.get(5)?,
                client_allowed_ips: row.get(6)?,
            })
        },
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound("settings row".into()),
        other => DbError::Sqlite(other),
    })
}

/// Replace the settings row.
pub fn update(conn: &Connection, settings: &SettingsRow) -> Result<()> {
    conn.execute(
        "UPDATE settings SET wg_interface = ?1, subnet = ?2, ip_pool_start = ?3,
                server_public_address = ?4, server_port = ?5,
                client_dns = ?6, client_allowed_ips = ?7
         WHERE id = 1",
        rusqlite::params![
            settings.wg_interface,
            settings.subnet,
            settings.ip_pool_start,
            settings.server_public_address,
            i64::from(settings.server_port),
            settings.client_dns,
            settings.client_allowed_ips,
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    #[test]
    fn test_defaults_present() {
        let conn = test_db();
        let row = get(&conn).expect("get");
        assert_eq!(row.wg_interface, "wg0");
        assert_eq!(row.subnet, "10.0.0.0/24");
        assert_eq!(row.ip_pool_start, "10.0.0.5");
        assert_eq!(row.server_port, 51820);
        assert_eq!(row.client_dns.as_deref(), Some("8.8.8.8"));
    }

    #[test]
    fn test_update_roundtrip() {
        let conn = test_db();
        let mut row = get(&conn).expect("get");
        row.wg_interface = "wg1".to_string();
        row.server_public_address = "vpn.example.net".to_string();
        row.client_dns = None;
        update(&conn, &row).expect("update");

        let row = get(&conn).expect("get");
        assert_eq!(row.wg_interface, "wg1");
        assert_eq!(row.server_public_address, "vpn.example.net");
        assert_eq!(row.client_dns, None);
    }
}
