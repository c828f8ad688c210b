//! Integration tests: self-service lookup and administrative operations.

use passage_db::queries::{peers, subscriptions};
use passage_engine::EngineError;
use passage_integration_tests::Harness;
use passage_types::SubscriptionStatus;

// 32 bytes of 0x42, base64-encoded.
const IMPORT_KEY: &str = "QkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkJCQkI=";

async fn redeem_one(harness: &Harness) -> String {
    {
        let conn = harness.db.lock().await;
        passage_engine::mint::create_voucher(&conn, Some("AAAA-AAAA-AAAA-AAAA"), 30)
            .expect("voucher");
    }
    harness
        .coordinator
        .redeem("AAAA-AAAA-AAAA-AAAA", "a@b.com", Some("+491701234"))
        .await
        .expect("redeem");

    let conn = harness.db.lock().await;
    subscriptions::list(&conn).expect("list")[0]
        .access_token
        .clone()
}

#[tokio::test]
async fn token_lookup_returns_grant_details() {
    let harness = Harness::new();
    let token = redeem_one(&harness).await;

    let info = harness.subscriptions.lookup(&token).await.expect("lookup");
    assert_eq!(info.email, "a@b.com");
    assert_eq!(info.status, SubscriptionStatus::Active);
    assert_eq!(info.ip_address.as_deref(), Some("10.0.0.5"));
    assert_eq!(
        info.access_link.as_deref(),
        Some("wg://YOUR_SERVER_IP:51820?peer=10.0.0.5")
    );

    let missing = harness.subscriptions.lookup("nonexistent").await;
    assert!(matches!(
        missing,
        Err(EngineError::Store(passage_db::DbError::NotFound(_)))
    ));
}

#[tokio::test]
async fn client_config_contains_tunnel_stanzas() {
    let harness = Harness::new();
    let token = redeem_one(&harness).await;

    let config = harness
        .subscriptions
        .client_config(&token)
        .await
        .expect("config");

    assert!(config.starts_with("[Interface]"), "no leading comment");
    assert!(config.contains("PrivateKey = PRIV1"));
    assert!(config.contains("Address = 10.0.0.5/32"));
    assert!(config.contains("DNS = 8.8.8.8"));
    assert!(config.contains("[Peer]"));
    assert!(config.contains("PublicKey = SERVERPUB"));
    assert!(config.contains("Endpoint = YOUR_SERVER_IP:51820"));
    assert!(config.contains("AllowedIPs = 0.0.0.0/0"));
}

#[tokio::test]
async fn disable_subscription_takes_peer_offline() {
    let harness = Harness::new();
    let token = redeem_one(&harness).await;
    assert!(harness.live_config().contains("AllowedIPs = 10.0.0.5/32"));

    let subscription_id = {
        let conn = harness.db.lock().await;
        subscriptions::get_by_token(&conn, &token)
            .expect("get")
            .subscription
            .id
    };

    harness
        .admin
        .disable_subscription(subscription_id)
        .await
        .expect("disable");

    {
        let conn = harness.db.lock().await;
        let sub = subscriptions::get(&conn, subscription_id).expect("sub");
        assert_eq!(sub.status, SubscriptionStatus::Disabled);
    }
    assert!(
        !harness.live_config().contains("AllowedIPs = 10.0.0.5/32"),
        "disabled peer left the live configuration"
    );
}

#[tokio::test]
async fn extend_subscription_moves_expiry() {
    let harness = Harness::new();
    let token = redeem_one(&harness).await;

    let (id, before) = {
        let conn = harness.db.lock().await;
        let sub = subscriptions::get_by_token(&conn, &token)
            .expect("get")
            .subscription;
        (sub.id, sub.expires_at)
    };

    harness.admin.extend_subscription(id, 7).await.expect("extend");

    let conn = harness.db.lock().await;
    let after = subscriptions::get(&conn, id).expect("sub").expires_at;
    assert_eq!(after, before + 7 * 86_400);
}

#[tokio::test]
async fn imported_peer_goes_live_without_a_subscription() {
    let harness = Harness::new();

    let peer_id = harness
        .admin
        .import_peer(IMPORT_KEY, "10.0.0.100")
        .await
        .expect("import");

    {
        let conn = harness.db.lock().await;
        let peer = peers::get(&conn, peer_id).expect("peer");
        assert_eq!(peer.subscription_id, None);
        assert_eq!(peer.private_key, None);
        assert_eq!(peer.kind, passage_types::PeerKind::Manual);
    }
    assert!(harness
        .live_config()
        .contains(&format!("PublicKey = {IMPORT_KEY}")));

    // Its address is now reserved like any other.
    let dup = harness.admin.import_peer(IMPORT_KEY, "10.0.0.100").await;
    assert!(matches!(
        dup,
        Err(EngineError::Store(passage_db::DbError::Constraint(_)))
    ));
}

#[tokio::test]
async fn import_rejects_malformed_input() {
    let harness = Harness::new();

    let bad_key = harness.admin.import_peer("tooshort", "10.0.0.100").await;
    assert!(matches!(
        bad_key,
        Err(EngineError::Wg(passage_wg::WgError::InvalidPublicKey))
    ));

    let bad_ip = harness.admin.import_peer(IMPORT_KEY, "not-an-ip").await;
    assert!(matches!(bad_ip, Err(EngineError::InvalidInput(_))));

    let conn = harness.db.lock().await;
    assert_eq!(peers::count(&conn).expect("count"), 0);
}

#[tokio::test]
async fn voucher_listing_reflects_redemption() {
    let harness = Harness::new();
    let _token = redeem_one(&harness).await;
    {
        let conn = harness.db.lock().await;
        passage_engine::mint::create_voucher(&conn, Some("BBBB-BBBB-BBBB-BBBB"), 7)
            .expect("voucher");
    }

    let rows = harness.admin.list_vouchers().await.expect("list");
    assert_eq!(rows.len(), 2);
    let redeemed = rows
        .iter()
        .find(|v| v.code == "AAAA-AAAA-AAAA-AAAA")
        .expect("row");
    assert!(redeemed.is_redeemed);
    let fresh = rows
        .iter()
        .find(|v| v.code == "BBBB-BBBB-BBBB-BBBB")
        .expect("row");
    assert!(!fresh.is_redeemed);
}
