//! Configuration text rendering and splitting.
//!
//! The live file is preamble (interface-level settings, written by the
//! operator) followed by generated `[Peer]` stanzas. Synchronization keeps
//! the preamble verbatim and owns everything from the first `[Peer]` line
//! down.

use passage_db::queries::peers::PeerRow;
use passage_db::queries::settings::SettingsRow;

/// Render the peer section from store rows. Disabled peers are skipped.
pub fn peer_blocks(peers: &[PeerRow]) -> String {
    peers
        .iter()
        .filter(|p| p.enabled)
        .map(|p| {
            format!(
                "\n[Peer]\nPublicKey = {}\nAllowedIPs = {}/32\n",
                p.public_key, p.ip_address
            )
        })
        .collect()
}

/// Everything before the first `[Peer]` line. CRLF files are tolerated.
pub fn split_preamble(original: &str) -> &str {
    for pattern in ["\r\n[Peer]", "\n[Peer]"] {
        if let Some(idx) = original.find(pattern) {
            return &original[..idx];
        }
    }
    // A file that *starts* with [Peer] has no preamble at all.
    if original.starts_with("[Peer]") {
        return "";
    }
    original
}

/// Assemble the new live configuration from preamble and peer section.
pub fn merge(preamble: &str, blocks: &str) -> String {
    let merged = format!("{}\n\n{}\n", preamble.trim_end(), blocks.trim());
    collapse_blank_runs(&merged)
}

/// Collapse runs of three or more newlines down to one blank line.
fn collapse_blank_runs(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut newlines = 0;
    for c in s.chars() {
        if c == '\n' {
            newlines += 1;
            if newlines <= 2 {
                out.push(c);
            }
        } else {
            newlines = 0;
            out.push(c);
        }
    }
    out
}

/// Client-facing configuration text.
///
/// Starts with `[Interface]` directly: some clients reject a leading
/// comment. `PrivateKey` appears only when the store holds one (auto
/// peers); manually imported peers configure their own.
pub struct ClientConfig<'a> {
    pub private_key: Option<&'a str>,
    pub ip_address: &'a str,
    pub server_public_key: Option<&'a str>,
    pub settings: &'a SettingsRow,
}

impl ClientConfig<'_> {
    pub fn render(&self) -> String {
        let mut conf = String::from("[Interface]\n");
        if let Some(key) = self.private_key {
            conf.push_str(&format!("PrivateKey = {key}\n"));
        }
        conf.push_str(&format!("Address = {}/32\n", self.ip_address));
        if let Some(dns) = self.settings.client_dns.as_deref() {
            conf.push_str(&format!("DNS = {dns}\n"));
        }
        conf.push_str("\n[Peer]\n");
        if let Some(key) = self.server_public_key {
            conf.push_str(&format!("PublicKey = {key}\n"));
        }
        conf.push_str(&format!(
            "Endpoint = {}:{}\n",
            self.settings.server_public_address, self.settings.server_port
        ));
        if let Some(allowed) = self.settings.client_allowed_ips.as_deref() {
            conf.push_str(&format!("AllowedIPs = {allowed}\n"));
        }
        conf
    }
}
