//! Parsing of `wg show <iface> dump` output.
//!
//! Tab-separated: one interface line (private key, public key, listen port,
//! fwmark) followed by one line per peer (public key, preshared key,
//! endpoint, allowed-ips, latest handshake, rx, tx, keepalive). The private
//! and preshared keys are dropped on parse; status output never carries key
//! material we did not generate.

use serde::Serialize;

use crate::{Result, WgError};

/// Live status of the interface and its peers.
#[derive(Debug, Clone, Serialize)]
pub struct InterfaceStatus {
    pub public_key: String,
    pub listen_port: Option<u16>,
    pub fwmark: Option<String>,
    pub peers: Vec<PeerStatus>,
}

/// Live status of one peer.
#[derive(Debug, Clone, Serialize)]
pub struct PeerStatus {
    pub public_key: String,
    pub endpoint: Option<String>,
    pub allowed_ips: Vec<String>,
    pub latest_handshake: u64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub persistent_keepalive: u16,
}

fn opt_field(s: &str) -> Option<String> {
    match s {
        "" | "(none)" | "off" => None,
        other => Some(other.to_string()),
    }
}

/// Parse a full dump.
pub fn parse_dump(output: &str) -> Result<InterfaceStatus> {
    let mut lines = output.trim().lines();
    let iface_line = lines
        .next()
        .ok_or_else(|| WgError::DumpParse("empty dump".into()))?;

    let fields: Vec<&str> = iface_line.split('\t').collect();
    if fields.len() < 4 {
        return Err(WgError::DumpParse(format!(
            "interface line has {} fields, expected 4",
            fields.len()
        )));
    }

    let mut status = InterfaceStatus {
        public_key: fields[1].to_string(),
        listen_port: fields[2].parse().ok(),
        fwmark: opt_field(fields[3]),
        peers: Vec::new(),
    };

    for line in lines {
        let f: Vec<&str> = line.split('\t').collect();
        if f.len() < 8 {
            return Err(WgError::DumpParse(format!(
                "peer line has {} fields, expected 8",
                f.len()
            )));
        }
        status.peers.push(PeerStatus {
            public_key: f[0].to_string(),
            endpoint: opt_field(f[2]),
            allowed_ips: f[3]
                .split(',')
                .filter(|s| !s.is_empty() && *s != "(none)")
                .map(str::to_string)
                .collect(),
            latest_handshake: f[4].parse().unwrap_or(0),
            rx_bytes: f[5].parse().unwrap_or(0),
            tx_bytes: f[6].parse().unwrap_or(0),
            persistent_keepalive: f[7].parse().unwrap_or(0),
        });
    }

    Ok(status)
}
