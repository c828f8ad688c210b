//! SQL schema definitions.

/// Complete schema for the Passage v1 database.
///
/// `peers.ip_address` is UNIQUE across all rows, enabled or not: peers are
/// never deleted, so an address handed out once is reserved forever.
/// `subscriptions.voucher_id` is UNIQUE: a voucher creates at most one
/// subscription.
pub const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS vouchers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL UNIQUE,
    duration_days INTEGER NOT NULL,
    is_redeemed INTEGER NOT NULL DEFAULT 0,
    redeemed_at INTEGER,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS peers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    subscription_id INTEGER REFERENCES subscriptions(id),
    public_key TEXT NOT NULL,
    private_key TEXT,
    ip_address TEXT NOT NULL UNIQUE,
    enabled INTEGER NOT NULL DEFAULT 1,
    kind TEXT NOT NULL DEFAULT 'auto',
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_peers_enabled ON peers(enabled);

CREATE TABLE IF NOT EXISTS subscriptions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL,
    phone TEXT,
    voucher_id INTEGER NOT NULL UNIQUE REFERENCES vouchers(id),
    peer_id INTEGER REFERENCES peers(id),
    expires_at INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'active',
    access_token TEXT NOT NULL UNIQUE,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_subscriptions_expiry ON subscriptions(status, expires_at);

CREATE TABLE IF NOT EXISTS settings (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    wg_interface TEXT NOT NULL,
    subnet TEXT NOT NULL,
    ip_pool_start TEXT NOT NULL,
    server_public_address TEXT NOT NULL,
    server_port INTEGER NOT NULL,
    client_dns TEXT,
    client_allowed_ips TEXT
);
"#;
