use crate::fixtures::{engine_with, id, loaded_engine, ReceiptBuilder};
use entitlement_engine::{
    services::entitlement_service::ReloadOutcome, Config, Feature, Product, Provider,
    PurchaseOutcome,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;

fn all_features() -> Vec<Product> {
    Feature::ALL.into_iter().map(Product::Feature).collect()
}

#[test]
fn test_absent_receipt_grants_nothing() {
    let test = loaded_engine(None);
    let engine = &test.engine;

    assert!(!engine.is_full_version());
    for feature in all_features() {
        assert!(!engine.is_eligible(&feature));
    }
    for provider in Provider::ALL {
        assert!(!engine.is_eligible_for_provider(provider.name()));
    }
    assert!(engine.entitlements().is_empty());
}

#[test]
fn test_legacy_version_grants_full_version() {
    let test = loaded_engine(Some(ReceiptBuilder::new("1.8.1").build()));
    let engine = &test.engine;

    assert!(engine.is_full_version());
    for feature in all_features() {
        assert!(engine.is_eligible(&feature));
    }
    assert!(engine.is_eligible_for_provider("Windscribe"));
    // any provider name, even one the catalog does not know
    assert!(engine.is_eligible_for_provider("acme"));
}

#[test]
fn test_provider_purchase_unlocks_only_that_provider() {
    let receipt = ReceiptBuilder::new("2.0.0")
        .product(id("providers.Mullvad"))
        .build();
    let test = loaded_engine(Some(receipt));
    let engine = &test.engine;

    assert!(!engine.is_full_version());
    assert!(engine.is_eligible_for_provider("Mullvad"));
    assert!(!engine.is_eligible_for_provider("mullvad"));
    assert!(!engine.is_eligible_for_provider("PIA"));
    assert!(!engine.is_eligible(&Product::Feature(Feature::UnlimitedHosts)));
    assert!(engine.is_eligible(&Product::Provider(Provider::Mullvad)));
}

#[test]
fn test_feature_purchase_unlocks_only_that_feature() {
    let receipt = ReceiptBuilder::new("2.0.0")
        .product(id("features.trusted_networks"))
        .product("com.algoritmico.ios.Passepartout.donations.Maxi")
        .build();
    let test = loaded_engine(Some(receipt));
    let engine = &test.engine;

    assert!(engine.is_eligible(&Product::Feature(Feature::TrustedNetworks)));
    assert!(!engine.is_eligible(&Product::Feature(Feature::SiriShortcuts)));
    assert_eq!(engine.entitlements().len(), 1);
}

#[test]
fn test_lexicographic_threshold_quirk() {
    // "1.10" sorts before "1.8.1" as a string, so it is grandfathered
    let test = loaded_engine(Some(ReceiptBuilder::new("1.10").build()));
    assert!(test.engine.is_full_version());

    let test = loaded_engine(Some(ReceiptBuilder::new("1.9").build()));
    assert!(!test.engine.is_full_version());
}

#[test]
fn test_beta_override_ignores_receipt() {
    let mut config = Config::default();
    config.entitlements.beta_override = true;

    for receipt in [
        None,
        Some(b"garbage".to_vec()),
        Some(ReceiptBuilder::new("3.0.0").build()),
    ] {
        let test = engine_with(&config, receipt, Ok(PurchaseOutcome::Cancelled), None);
        test.engine.reload();
        assert!(test.engine.is_full_version());
        assert!(test.engine.is_eligible(&Product::Feature(Feature::SiriShortcuts)));
        assert!(test.engine.is_eligible_for_provider("PIA"));
    }
}

#[test]
fn test_custom_legacy_version_and_prefix() {
    let mut config = Config::default();
    config.entitlements.legacy_version = "1.0".to_string();
    config.catalog.identifier_prefix = "org.example.vpn".to_string();

    let receipt = ReceiptBuilder::new("1.5")
        .product("org.example.vpn.providers.PIA")
        .product(id("providers.Mullvad"))
        .build();
    let test = engine_with(&config, Some(receipt), Ok(PurchaseOutcome::Cancelled), None);
    test.engine.reload();

    assert_eq!(test.engine.catalog().prefix(), "org.example.vpn");
    assert!(!test.engine.is_full_version());
    assert!(test.engine.is_eligible_for_provider("PIA"));
    assert!(!test.engine.is_eligible_for_provider("Mullvad"));
}

#[test]
fn test_unknown_provider_record_grants_nothing() {
    let receipt = ReceiptBuilder::new("2.0.0")
        .product(id("providers.acme"))
        .build();
    let test = loaded_engine(Some(receipt));
    let engine = &test.engine;

    // the suffix matches, but the catalog has no such product
    assert!(engine.entitlements().is_empty());
    assert!(!engine.is_eligible_for_provider("acme"));
    assert!(!engine.is_full_version());
}

#[test]
fn test_nothing_is_granted_before_reload() {
    let receipt = ReceiptBuilder::new("1.0").build();
    let test = engine_with(
        &Config::default(),
        Some(receipt),
        Ok(PurchaseOutcome::Cancelled),
        None,
    );
    assert!(!test.engine.is_full_version());

    assert!(test.engine.reload().is_resolved());
    assert!(test.engine.is_full_version());
}

#[test]
fn test_corrupted_receipt_replaces_previous_entitlements() {
    let test = loaded_engine(Some(ReceiptBuilder::new("1.0").build()));
    assert!(test.engine.is_full_version());

    test.receipts.replace(Some(vec![0x30, 0x03, 0x02]));
    assert!(matches!(test.engine.reload(), ReloadOutcome::Rejected(_)));
    assert!(!test.engine.is_full_version());

    test.receipts.replace(None);
    assert!(matches!(test.engine.reload(), ReloadOutcome::Unavailable));
    assert!(test.engine.entitlements().is_empty());
}

#[test]
fn test_reload_reports_fingerprint() {
    let bytes = ReceiptBuilder::new("2.0.0").build();
    let test = engine_with(
        &Config::default(),
        Some(bytes.clone()),
        Ok(PurchaseOutcome::Cancelled),
        None,
    );

    match test.engine.reload() {
        ReloadOutcome::Resolved { fingerprint, entitlements } => {
            assert_eq!(fingerprint.len(), 64);
            assert_eq!(
                fingerprint,
                entitlement_engine::ReceiptParser::fingerprint(&bytes)
            );
            assert!(entitlements.is_empty());
        }
        other => panic!("unexpected reload outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_readers_never_observe_partial_sets() {
    let full = ReceiptBuilder::new("2.0.0")
        .product(id("features.full_version"))
        .product(id("features.siri"))
        .product(id("providers.PIA"))
        .build();
    let empty = ReceiptBuilder::new("2.0.0").build();

    let test = Arc::new(loaded_engine(Some(full.clone())));
    let mut tasks = JoinSet::new();

    for i in 0..4 {
        let test = test.clone();
        let (full, empty) = (full.clone(), empty.clone());
        tasks.spawn(async move {
            for round in 0..50 {
                let bytes = if (round + i) % 2 == 0 { &full } else { &empty };
                test.receipts.replace(Some(bytes.clone()));
                test.engine.reload();
                tokio::task::yield_now().await;
            }
        });
    }

    for _ in 0..4 {
        let test = test.clone();
        tasks.spawn(async move {
            for _ in 0..200 {
                let len = test.engine.entitlements().len();
                assert!(len == 0 || len == 3, "observed partial set of {}", len);
                tokio::task::yield_now().await;
            }
        });
    }

    while let Some(result) = tasks.join_next().await {
        result.unwrap();
    }
}

#[test]
fn test_queries_stay_granted_while_receipts_swap() {
    // every receipt grants siri and PIA, one directly and one through the full version
    let direct = ReceiptBuilder::new("2.0.0")
        .product(id("features.siri"))
        .product(id("providers.PIA"))
        .build();
    let full = ReceiptBuilder::new("2.0.0")
        .product(id("features.full_version"))
        .build();

    let test = loaded_engine(Some(direct.clone()));
    let engine = &test.engine;
    let done = AtomicBool::new(false);

    std::thread::scope(|scope| {
        scope.spawn(|| {
            for round in 0..2_000 {
                let bytes = if round % 2 == 0 { &full } else { &direct };
                test.receipts.replace(Some(bytes.clone()));
                engine.reload();
            }
            done.store(true, Ordering::SeqCst);
        });

        for _ in 0..4 {
            scope.spawn(|| {
                while !done.load(Ordering::SeqCst) {
                    assert!(engine.is_eligible(&Product::Feature(Feature::SiriShortcuts)));
                    assert!(engine.is_eligible_for_provider("PIA"));
                }
            });
        }
    });
}
