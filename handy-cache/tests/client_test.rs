//! Cache client behavior over the in-process store

mod common;

use handy_cache::{CacheError, DEFAULT_RETAINED, Identity, KeyScanner, Lookup, StoreInfo};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Basket {
    owner: String,
    items: Vec<String>,
    totals: BTreeMap<String, f64>,
}

fn basket() -> Basket {
    Basket {
        owner: "bob".to_string(),
        items: vec!["apple".to_string(), "pear".to_string()],
        totals: BTreeMap::from([("eur".to_string(), 4.5), ("usd".to_string(), 4.9)]),
    }
}

#[tokio::test]
async fn test_set_get_roundtrip() {
    let cache = common::setup_memory_client();
    let bob = Identity::user("bob");

    assert!(cache.set(&bob, "basket", &basket()).await.is_done());

    let lookup: Lookup<Basket> = cache.get(&bob, "basket").await;
    assert_eq!(lookup.into_option(), Some(basket()));
}

#[tokio::test]
async fn test_missing_key_is_miss() {
    let cache = common::setup_memory_client();
    let lookup: Lookup<String> = cache.get(&Identity::user("bob"), "nothing").await;
    assert!(matches!(lookup, Lookup::Miss));
}

#[tokio::test]
async fn test_keys_scoped_per_user() {
    let cache = common::setup_memory_client();
    let bob = Identity::user("bob");
    let alice = Identity::user("alice");

    let _ = cache.set(&bob, "cart", "bob's").await;
    let _ = cache.set(&alice, "cart", "alice's").await;

    assert_eq!(
        cache.get::<String>(&bob, "cart").await.into_option().as_deref(),
        Some("bob's")
    );
    assert_eq!(
        cache.get::<String>(&alice, "cart").await.into_option().as_deref(),
        Some("alice's")
    );
    assert_eq!(
        cache.store().keys(),
        vec!["user_alice_cart".to_string(), "user_bob_cart".to_string()]
    );
}

#[tokio::test]
async fn test_marker_keys_shared() {
    let cache = common::setup_memory_client();
    let key = "menu_noUserData_";

    let _ = cache.set(&Identity::user("bob"), key, &vec![1, 2, 3]).await;

    let seen: Option<Vec<i32>> = cache.get(&Identity::user("alice"), key).await.into_option();
    assert_eq!(seen, Some(vec![1, 2, 3]));
    assert_eq!(cache.store().keys(), vec![key.to_string()]);
}

#[tokio::test]
async fn test_anonymous_and_empty_username_unscoped() {
    let cache = common::setup_memory_client();

    let _ = cache.set(&Identity::anonymous(), "motd", "hello").await;
    let _ = cache.set(&Identity::user(""), "banner", "hi").await;

    assert_eq!(
        cache.store().keys(),
        vec!["banner".to_string(), "motd".to_string()]
    );
}

#[tokio::test]
async fn test_disabled_gate_never_touches_store() {
    let cache = common::setup_disabled_client();
    let bob = Identity::user("bob");

    let write = cache.set(&bob, "cart", "apple").await;
    assert!(matches!(write.reason(), Some(CacheError::FeatureDisabled)));

    let read: Lookup<String> = cache.get(&bob, "cart").await;
    assert!(matches!(read.reason(), Some(CacheError::FeatureDisabled)));
    assert!(!cache.get_ttl(&bob, "cart").await.is_hit());
    assert!(!cache.exists("user_bob_cart").await.unwrap_or(false));
    assert_eq!(cache.delete_keys(&bob, "cart", true).await.unwrap_or(0), 0);
    assert_eq!(cache.delete_all_except("x").await.unwrap_or(0), 0);
    assert!(cache.info().await.unwrap_or_default().is_empty());
    assert!(!cache.flush().await.is_done());
    assert!(!cache.ping().await.is_done());

    assert!(cache.store().is_empty());
    let stats = cache.store().stats();
    assert_eq!(stats.gets + stats.sets + stats.scans, 0);
}

#[tokio::test]
async fn test_zero_ttl_is_noop() {
    let cache = common::setup_memory_client();
    let bob = Identity::user("bob");

    let write = cache.set_with_ttl(&bob, "cart", "apple", 0).await;
    assert!(matches!(write.reason(), Some(CacheError::InvalidArgument(_))));

    assert!(!cache.get::<String>(&bob, "cart").await.is_hit());
    assert!(cache.store().is_empty());
    assert_eq!(cache.store().stats().sets, 0);
}

#[tokio::test]
async fn test_unrepresentable_ttl_degrades() {
    let cache = common::setup_memory_client();
    let anon = Identity::anonymous();

    let write = cache.set_with_ttl(&anon, "k", "v", u64::MAX).await;
    assert!(matches!(write.reason(), Some(CacheError::Store(_))));

    assert!(!cache.get::<String>(&anon, "k").await.is_hit());
    assert!(cache.store().is_empty());
}

#[tokio::test]
async fn test_default_ttl_applied() {
    let cache = common::setup_memory_client();
    let bob = Identity::user("bob");

    let _ = cache.set(&bob, "cart", "apple").await;

    let ttl = cache.get_ttl(&bob, "cart").await.into_option().unwrap();
    assert!(ttl <= Duration::from_secs(21_600));
    assert!(ttl >= Duration::from_secs(21_590));
    assert_eq!(cache.default_ttl(), Duration::from_secs(21_600));
}

#[tokio::test]
async fn test_explicit_ttl() {
    let cache = common::setup_memory_client();
    let bob = Identity::user("bob");

    let _ = cache.set_with_ttl(&bob, "otp", &123_456u32, 60).await;

    let ttl = cache.get_ttl(&bob, "otp").await.into_option().unwrap();
    assert!(ttl <= Duration::from_secs(60) && ttl >= Duration::from_secs(59));
}

#[tokio::test]
async fn test_ttl_without_expiry_or_missing_is_miss() {
    let cache = common::setup_memory_client();
    cache.store().set_raw("forever", vec![1, 2, 3], None);

    let anon = Identity::anonymous();
    assert!(matches!(cache.get_ttl(&anon, "forever").await, Lookup::Miss));
    assert!(matches!(cache.get_ttl(&anon, "absent").await, Lookup::Miss));
}

#[tokio::test]
async fn test_entry_expires() {
    let cache = common::setup_memory_client();
    let bob = Identity::user("bob");

    let _ = cache.set_with_ttl(&bob, "flash", "soon gone", 1).await;
    assert!(cache.get::<String>(&bob, "flash").await.is_hit());

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert!(!cache.get::<String>(&bob, "flash").await.is_hit());
}

#[tokio::test]
async fn test_corrupt_payload_is_not_a_hit() {
    let cache = common::setup_memory_client();
    cache
        .store()
        .set_raw("user_bob_cart", b"definitely not zstd".to_vec(), None);

    let lookup: Lookup<Basket> = cache.get(&Identity::user("bob"), "cart").await;
    assert!(matches!(lookup.reason(), Some(CacheError::CorruptPayload(_))));
    assert!(lookup.into_option().is_none());
}

#[tokio::test]
async fn test_compression_level_independence() {
    let mut cache = common::setup_memory_client();
    let bob = Identity::user("bob");

    cache.set_compress_level(9);
    let _ = cache.set(&bob, "high", &basket()).await;
    cache.set_compress_level(0);
    assert_eq!(cache.get(&bob, "high").await.into_option(), Some(basket()));

    let _ = cache.set(&bob, "low", &basket()).await;
    cache.set_compress_level(9);
    assert_eq!(cache.get(&bob, "low").await.into_option(), Some(basket()));
}

#[tokio::test]
async fn test_exists_uses_key_as_given() {
    let cache = common::setup_memory_client();
    let bob = Identity::user("bob");
    let _ = cache.set(&bob, "cart", "apple").await;

    assert!(!cache.exists("cart").await.unwrap_or(false));
    let effective = cache.effective_key(&bob, "cart");
    assert!(cache.exists(&effective).await.unwrap_or(false));
}

#[tokio::test]
async fn test_delete_single_key() {
    let cache = common::setup_memory_client();
    let bob = Identity::user("bob");
    let _ = cache.set(&bob, "cart", "apple").await;
    let _ = cache.set(&bob, "cart:old", "pear").await;

    assert_eq!(cache.delete_keys(&bob, "cart", false).await.unwrap_or(0), 1);
    assert_eq!(cache.delete_keys(&bob, "cart", false).await.unwrap_or(0), 0);
    assert_eq!(cache.store().keys(), vec!["user_bob_cart:old".to_string()]);
}

#[tokio::test]
async fn test_recursive_delete_stays_in_scope() {
    common::init_tracing();
    let cache = common::setup_memory_client();
    let bob = Identity::user("bob");
    let alice = Identity::user("alice");

    for i in 0..30 {
        let _ = cache.set(&bob, &format!("report:{i}"), &i).await;
    }
    let _ = cache.set(&bob, "profile", "bob").await;
    let _ = cache.set(&alice, "report:1", &1).await;
    cache.store().set_raw("report:shared", vec![1], None);

    let removed = cache.delete_keys(&bob, "report:", true).await.unwrap_or(0);
    assert_eq!(removed, 30);
    assert_eq!(
        cache.store().keys(),
        vec![
            "report:shared".to_string(),
            "user_alice_report:1".to_string(),
            "user_bob_profile".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_recursive_delete_escapes_glob_characters() {
    let cache = common::setup_memory_client();
    let anon = Identity::anonymous();
    cache.store().set_raw("a*:1", vec![1], None);
    cache.store().set_raw("ab:1", vec![1], None);

    assert_eq!(cache.delete_keys(&anon, "a*", true).await.unwrap_or(0), 1);
    assert_eq!(cache.store().keys(), vec!["ab:1".to_string()]);
}

#[tokio::test]
async fn test_delete_all_except_retains_matching() {
    let cache = common::setup_memory_client();
    for key in ["PHPREDIS_SESSION:a", "PHPREDIS_SESSION:b", "menu", "user_bob_cart"] {
        cache.store().set_raw(key, vec![1], None);
    }

    let removed = cache.delete_all_except(DEFAULT_RETAINED).await.unwrap_or(0);
    assert_eq!(removed, 2);
    assert_eq!(
        cache.store().keys(),
        vec![
            "PHPREDIS_SESSION:a".to_string(),
            "PHPREDIS_SESSION:b".to_string()
        ]
    );
}

#[tokio::test]
async fn test_delete_without_prefixes_retains_allowed() {
    let cache = common::setup_memory_client();
    for key in ["a:1", "b:1", "c:1"] {
        cache.store().set_raw(key, vec![1], None);
    }

    let removed = cache.delete_without_prefixes(&["a:", "b:"]).await.unwrap_or(0);
    assert_eq!(removed, 1);
    assert_eq!(cache.store().keys(), vec!["a:1".to_string(), "b:1".to_string()]);
}

#[tokio::test]
async fn test_bulk_delete_over_many_pages() {
    let mut config = handy_cache::CacheConfig::default();
    config.scan_page_size = 16;
    config.delete_batch_size = 5;
    let cache = common::setup_memory_client_with(config);

    for i in 0..500 {
        cache.store().set_raw(&format!("junk:{i}"), vec![1], None);
    }
    for i in 0..10 {
        cache.store().set_raw(&format!("keep:{i}"), vec![1], None);
    }

    let removed = cache.delete_without_prefixes(&["keep:"]).await.unwrap_or(0);
    assert_eq!(removed, 500);
    assert_eq!(cache.store().len(), 10);
    assert!(cache.store().stats().scans >= 500 / 16);
}

#[tokio::test]
async fn test_scan_visits_every_key_once() {
    let cache = common::setup_memory_client();
    for i in 0..250 {
        cache.store().set_raw(&format!("k:{i}"), vec![1], None);
    }

    let mut scanner = KeyScanner::new(cache.store(), "*", 40);
    let mut seen = Vec::new();
    let mut pages = 0;
    while let Some(page) = scanner.next_page().await.unwrap() {
        pages += 1;
        seen.extend(page);
    }

    let unique: HashSet<&String> = seen.iter().collect();
    assert_eq!(seen.len(), 250);
    assert_eq!(unique.len(), 250);
    assert!(pages > 1);
    assert!(scanner.is_finished());
}

#[tokio::test]
async fn test_client_scanner_uses_pattern() {
    let cache = common::setup_memory_client();
    let bob = Identity::user("bob");
    let _ = cache.set(&bob, "a", &1).await;
    let _ = cache.set(&bob, "b", &2).await;
    let _ = cache.set(&Identity::user("alice"), "a", &3).await;

    let mut keys = cache.scanner("user_bob_*").collect_all().await.unwrap();
    keys.sort();
    assert_eq!(keys, vec!["user_bob_a".to_string(), "user_bob_b".to_string()]);
}

#[tokio::test]
async fn test_offline_store_degrades() {
    common::init_tracing();
    let cache = common::setup_memory_client();
    let bob = Identity::user("bob");
    let _ = cache.set(&bob, "cart", "apple").await;
    cache.store().set_offline(true);

    let read: Lookup<String> = cache.get(&bob, "cart").await;
    assert!(read.reason().is_some_and(CacheError::is_connection_error));
    assert!(!cache.set(&bob, "cart", "pear").await.is_done());
    assert!(!cache.exists("user_bob_cart").await.unwrap_or(false));
    assert_eq!(cache.info().await.unwrap_or_default(), StoreInfo::default());
    assert!(!cache.ping().await.is_done());

    cache.store().set_offline(false);
    assert_eq!(
        cache.get::<String>(&bob, "cart").await.into_option().as_deref(),
        Some("apple")
    );
}

#[tokio::test]
async fn test_info_and_flush() {
    let cache = common::setup_memory_client();
    let bob = Identity::user("bob");
    for key in ["a", "b", "c"] {
        let _ = cache.set(&bob, key, key).await;
    }

    let info = cache.info().await.unwrap_or_default();
    assert_eq!(info.keyspace_keys(0), Some(3));
    assert_eq!(info.get("server", "store_mode"), Some("memory"));

    assert!(cache.flush().await.is_done());
    assert!(cache.store().is_empty());
    assert_eq!(cache.info().await.unwrap_or_default().keyspace_keys(0), None);
}
