use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument, warn};

use crate::{
    error::StoreError,
    models::{product::ProductCatalog, purchase::ProductDescriptor},
    services::store::ProductStore,
};

type DescriptorRequest = Shared<BoxFuture<'static, Result<Vec<ProductDescriptor>, StoreError>>>;

#[derive(Default)]
struct DescriptorCache {
    descriptors: Option<Vec<ProductDescriptor>>,
    in_flight: Option<DescriptorRequest>,
}

/// Lazily fetched store metadata for every catalog product.
///
/// The first successful, non-empty answer is kept for the process lifetime.
/// Callers that arrive while a request is in flight await that same request,
/// whether it ends up succeeding or failing.
pub struct CatalogService {
    catalog: ProductCatalog,
    store: Arc<dyn ProductStore>,
    cache: Mutex<DescriptorCache>,
}

impl CatalogService {
    pub fn new(catalog: ProductCatalog, store: Arc<dyn ProductStore>) -> Self {
        Self {
            catalog,
            store,
            cache: Mutex::new(DescriptorCache::default()),
        }
    }

    /// Cached descriptors, without triggering a request
    pub fn cached_products(&self) -> Vec<ProductDescriptor> {
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.descriptors.clone().unwrap_or_default()
    }

    /// List purchasable products, requesting them from the store on first use.
    /// Store failures yield an empty list and the next call tries again.
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Vec<ProductDescriptor> {
        let request = {
            let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(descriptors) = &cache.descriptors {
                return descriptors.clone();
            }
            match &cache.in_flight {
                Some(request) => {
                    debug!("Joining in-flight product request");
                    request.clone()
                }
                None => {
                    let request = self.request_descriptors().shared();
                    cache.in_flight = Some(request.clone());
                    request
                }
            }
        };

        let result = request.clone().await;

        {
            let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            if cache
                .in_flight
                .as_ref()
                .is_some_and(|current| current.ptr_eq(&request))
            {
                cache.in_flight = None;
            }
            if let Ok(descriptors) = &result {
                cache.descriptors.get_or_insert_with(|| descriptors.clone());
            }
        }

        match result {
            Ok(descriptors) => descriptors,
            Err(e) => {
                warn!("Could not list products: {}", e);
                Vec::new()
            }
        }
    }

    fn request_descriptors(&self) -> BoxFuture<'static, Result<Vec<ProductDescriptor>, StoreError>> {
        let store = self.store.clone();
        let identifiers: BTreeSet<String> = self.catalog.identifiers().into_iter().collect();

        async move {
            let descriptors = store.request_descriptors(&identifiers).await?;
            if descriptors.is_empty() {
                return Err(StoreError::Unavailable("store returned no products".to_string()));
            }

            info!("Fetched {} product descriptors", descriptors.len());
            Ok(descriptors)
        }
        .boxed()
    }
}
