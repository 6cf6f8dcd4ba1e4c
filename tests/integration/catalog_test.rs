use crate::fixtures::{descriptor, id, MockProductStore};
use entitlement_engine::{services::CatalogService, ProductCatalog, StoreError};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

fn service(store: Arc<MockProductStore>) -> CatalogService {
    CatalogService::new(ProductCatalog::default(), store)
}

#[tokio::test]
async fn test_descriptors_fetched_once_for_all_identifiers() {
    let store = Arc::new(MockProductStore::new(vec![Ok(vec![
        descriptor(&id("features.full_version")),
        descriptor(&id("providers.PIA")),
    ])]));
    let catalog = service(store.clone());

    assert!(catalog.cached_products().is_empty());
    assert_eq!(store.calls(), 0);

    let first = catalog.list_products().await;
    let second = catalog.list_products().await;

    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
    assert_eq!(catalog.cached_products(), first);
    assert_eq!(store.calls(), 1);

    let expected: BTreeSet<String> = ProductCatalog::default().identifiers().into_iter().collect();
    assert_eq!(store.requested.lock().unwrap().as_slice(), &[expected]);
}

#[tokio::test]
async fn test_concurrent_first_calls_share_one_request() {
    let store = Arc::new(
        MockProductStore::new(vec![Ok(vec![descriptor(&id("features.siri"))])])
            .with_delay(Duration::from_millis(20)),
    );
    let catalog = service(store.clone());

    let results = futures::future::join_all((0..8).map(|_| catalog.list_products())).await;

    assert_eq!(store.calls(), 1);
    for products in results {
        assert_eq!(products.len(), 1);
    }
    assert_eq!(catalog.cached_products().len(), 1);
}

#[tokio::test]
async fn test_concurrent_first_calls_share_one_failure() {
    let store = Arc::new(
        MockProductStore::new(vec![
            Err(StoreError::Unavailable("timeout".to_string())),
            Ok(vec![descriptor(&id("features.siri"))]),
        ])
        .with_delay(Duration::from_millis(20)),
    );
    let catalog = service(store.clone());

    let results = futures::future::join_all((0..8).map(|_| catalog.list_products())).await;

    assert_eq!(store.calls(), 1);
    assert!(results.iter().all(Vec::is_empty));
    assert!(catalog.cached_products().is_empty());

    // the failed request is not kept, so the next call asks again
    assert_eq!(catalog.list_products().await.len(), 1);
    assert_eq!(store.calls(), 2);
}

#[tokio::test]
async fn test_store_failure_yields_empty_list_and_retries() {
    let store = Arc::new(MockProductStore::new(vec![
        Err(StoreError::Unavailable("timeout".to_string())),
        Ok(vec![]),
        Ok(vec![descriptor(&id("features.full_version"))]),
    ]));
    let catalog = service(store.clone());

    assert!(catalog.list_products().await.is_empty());
    assert!(catalog.list_products().await.is_empty());
    assert_eq!(catalog.list_products().await.len(), 1);
    assert_eq!(catalog.list_products().await.len(), 1);
    assert_eq!(store.calls(), 3);
}
