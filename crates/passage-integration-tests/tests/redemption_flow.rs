//! Integration tests: voucher redemption end to end.
//!
//! Exercises the full pipeline against an in-memory store and a
//! tempdir-backed live configuration: code validation, keypair
//! provisioning, address allocation, the atomic grant transaction, and the
//! post-commit synchronization, including its failure policy.

use std::collections::HashSet;
use std::sync::atomic::Ordering;

use passage_db::queries::{peers, settings, subscriptions, vouchers};
use passage_engine::{alloc, mint, RedeemError};
use passage_integration_tests::Harness;
use passage_types::clock;

const SCENARIO_CODE: &str = "AB3X-9KLM-22QW-TT58";

async fn seed_voucher(harness: &Harness, code: &str, duration_days: u32) {
    let conn = harness.db.lock().await;
    mint::create_voucher(&conn, Some(code), duration_days).expect("seed voucher");
}

#[tokio::test]
async fn scenario_first_redemption_gets_pool_start() {
    let harness = Harness::new();
    seed_voucher(&harness, SCENARIO_CODE, 30).await;

    let grant = harness
        .coordinator
        .redeem(SCENARIO_CODE, "a@b.com", None)
        .await
        .expect("redeem");

    // Pool start with no existing peers.
    assert_eq!(grant.ip_address, "10.0.0.5");
    assert_eq!(grant.access_link, "wg://YOUR_SERVER_IP:51820?peer=10.0.0.5");

    // Expiry lands within tolerance of now + 30 days.
    let now = clock::now_secs();
    {
        let conn = harness.db.lock().await;
        let sub = &subscriptions::list(&conn).expect("list")[0];
        let expected = now + 30 * 86_400;
        assert!(
            sub.expires_at.abs_diff(expected) <= 5,
            "expires_at {} should be near {expected}",
            sub.expires_at
        );
        assert_eq!(grant.expires_at, clock::to_rfc3339(sub.expires_at));

        // The voucher flipped exactly once, with a timestamp.
        let voucher = vouchers::get_by_code(&conn, SCENARIO_CODE).expect("voucher");
        assert!(voucher.is_redeemed);
        assert!(voucher.redeemed_at.is_some());

        // Subscription and peer are cross-linked.
        let peer = peers::get(&conn, sub.peer_id.expect("peer id")).expect("peer");
        assert_eq!(peer.subscription_id, Some(sub.id));
        assert_eq!(peer.ip_address, "10.0.0.5");
        assert!(peer.enabled);
    }

    // The live configuration gained exactly one [Peer] stanza with the
    // generated public key.
    let live = harness.live_config();
    assert_eq!(live.matches("[Peer]").count(), 1);
    assert!(live.contains("PublicKey = PRIV1.pub"));
    assert!(live.contains("AllowedIPs = 10.0.0.5/32"));
    assert!(live.contains("ListenPort = 51820"), "preamble preserved");
    assert_eq!(harness.runner.syncconf_count(), 1);
}

#[tokio::test]
async fn redeeming_twice_fails_and_allocates_nothing() {
    let harness = Harness::new();
    seed_voucher(&harness, SCENARIO_CODE, 30).await;

    harness
        .coordinator
        .redeem(SCENARIO_CODE, "a@b.com", None)
        .await
        .expect("first redeem");

    let result = harness
        .coordinator
        .redeem(SCENARIO_CODE, "other@b.com", None)
        .await;
    assert!(matches!(result, Err(RedeemError::AlreadyRedeemed)));

    let conn = harness.db.lock().await;
    assert_eq!(peers::count(&conn).expect("count"), 1);
    assert_eq!(subscriptions::list(&conn).expect("list").len(), 1);
}

#[tokio::test]
async fn unknown_and_malformed_codes_fail_cleanly() {
    let harness = Harness::new();

    let result = harness
        .coordinator
        .redeem("AB3X-9KLM-22QW-TT58", "a@b.com", None)
        .await;
    assert!(matches!(result, Err(RedeemError::NotFound)));

    let result = harness.coordinator.redeem("not a code", "a@b.com", None).await;
    assert!(matches!(result, Err(RedeemError::InvalidFormat)));

    // Neither attempt touched the store.
    let conn = harness.db.lock().await;
    assert_eq!(peers::count(&conn).expect("count"), 0);
}

#[tokio::test]
async fn dashless_input_redeems_the_dashed_voucher() {
    let harness = Harness::new();
    seed_voucher(&harness, SCENARIO_CODE, 7).await;

    let grant = harness
        .coordinator
        .redeem("ab3x9klm22qwtt58", "a@b.com", None)
        .await
        .expect("redeem normalized");
    assert_eq!(grant.ip_address, "10.0.0.5");
}

#[tokio::test]
async fn concurrent_redemptions_get_distinct_addresses() {
    let harness = Harness::new();
    let codes: Vec<String> = {
        let conn = harness.db.lock().await;
        mint::create_batch(&conn, 8, 30).expect("batch")
    };

    let mut handles = Vec::new();
    for (i, code) in codes.iter().enumerate() {
        let coordinator = harness.coordinator.clone();
        let code = code.clone();
        handles.push(tokio::spawn(async move {
            coordinator
                .redeem(&code, &format!("user{i}@example.com"), None)
                .await
        }));
    }

    let mut addresses = HashSet::new();
    for handle in handles {
        let grant = handle.await.expect("join").expect("redeem");
        assert!(
            grant.ip_address.starts_with("10.0.0."),
            "address {} outside pool",
            grant.ip_address
        );
        assert!(
            addresses.insert(grant.ip_address.clone()),
            "address {} handed out twice",
            grant.ip_address
        );
    }
    assert_eq!(addresses.len(), 8);
}

#[tokio::test]
async fn keygen_failure_consumes_nothing() {
    let harness = Harness::new();
    seed_voucher(&harness, SCENARIO_CODE, 30).await;
    harness.runner.fail_genkey.store(true, Ordering::SeqCst);

    let result = harness
        .coordinator
        .redeem(SCENARIO_CODE, "a@b.com", None)
        .await;
    assert!(matches!(result, Err(RedeemError::KeyGen(_))));

    let conn = harness.db.lock().await;
    let voucher = vouchers::get_by_code(&conn, SCENARIO_CODE).expect("voucher");
    assert!(!voucher.is_redeemed, "voucher must stay retryable");
    assert_eq!(peers::count(&conn).expect("count"), 0);
}

#[tokio::test]
async fn exhausted_pool_fails_without_mutation() {
    let harness = Harness::new();

    // Shrink the pool to two usable grants: /29 hosts .1-.6, start at .5.
    {
        let conn = harness.db.lock().await;
        let mut row = settings::get(&conn).expect("settings");
        row.subnet = "10.0.0.0/29".to_string();
        settings::update(&conn, &row).expect("update");
        mint::create_voucher(&conn, Some("AAAA-AAAA-AAAA-AAAA"), 30).expect("seed");
        mint::create_voucher(&conn, Some("BBBB-BBBB-BBBB-BBBB"), 30).expect("seed");
        mint::create_voucher(&conn, Some("CCCC-CCCC-CCCC-CCCC"), 30).expect("seed");
    }

    harness
        .coordinator
        .redeem("AAAA-AAAA-AAAA-AAAA", "a@b.com", None)
        .await
        .expect("first");
    harness
        .coordinator
        .redeem("BBBB-BBBB-BBBB-BBBB", "b@b.com", None)
        .await
        .expect("second");

    let result = harness
        .coordinator
        .redeem("CCCC-CCCC-CCCC-CCCC", "c@b.com", None)
        .await;
    assert!(matches!(
        result,
        Err(RedeemError::AddressPool(alloc::AllocError::PoolExhausted))
    ));

    let conn = harness.db.lock().await;
    let voucher = vouchers::get_by_code(&conn, "CCCC-CCCC-CCCC-CCCC").expect("voucher");
    assert!(!voucher.is_redeemed);
    assert_eq!(peers::count(&conn).expect("count"), 2);
}

#[tokio::test]
async fn sync_failure_keeps_the_committed_grant() {
    let harness = Harness::new();
    seed_voucher(&harness, SCENARIO_CODE, 30).await;
    harness.runner.fail_syncconf.store(true, Ordering::SeqCst);

    let err = harness
        .coordinator
        .redeem(SCENARIO_CODE, "a@b.com", None)
        .await
        .expect_err("sync must fail");

    let RedeemError::SyncFailed { grant, reason } = err else {
        unreachable!("expected SyncFailed");
    };
    assert_eq!(grant.ip_address, "10.0.0.5");
    assert!(reason.contains("syncconf rejected"));

    // The grant is in the store and the voucher is consumed.
    {
        let conn = harness.db.lock().await;
        let voucher = vouchers::get_by_code(&conn, SCENARIO_CODE).expect("voucher");
        assert!(voucher.is_redeemed);
        assert_eq!(peers::count(&conn).expect("count"), 1);
    }

    // The live file rolled back to its pre-sync content.
    assert_eq!(harness.live_config(), passage_integration_tests::SEED_CONFIG);

    // Once the daemon recovers, a manual resync makes the grant live.
    harness.runner.fail_syncconf.store(false, Ordering::SeqCst);
    harness.synchronizer.sync().await.expect("resync");
    assert!(harness.live_config().contains("AllowedIPs = 10.0.0.5/32"));
}
