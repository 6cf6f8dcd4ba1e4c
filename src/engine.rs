use std::sync::Arc;

use crate::{
    config::Config,
    models::{
        entitlement::EntitlementSet,
        product::{Product, ProductCatalog},
        purchase::{ProductDescriptor, PurchaseOutcome},
    },
    error::Result,
    services::{
        entitlement_service::{EngineFlags, LegacyVersion, ReloadOutcome},
        store::{ProductStore, ReceiptSource, TransactionStore},
        CatalogService, EntitlementService, PurchaseService, ReceiptParser,
    },
};

/// Explicitly constructed entitlement engine. Nothing is loaded until [`reload`] is called.
///
/// [`reload`]: EntitlementEngine::reload
#[derive(Clone)]
pub struct EntitlementEngine {
    pub entitlement_service: Arc<EntitlementService>,
    pub catalog_service: Arc<CatalogService>,
    pub purchase_service: Arc<PurchaseService>,
}

/// Collaborators supplied by the platform
pub struct StoreBindings {
    pub receipt_source: Arc<dyn ReceiptSource>,
    pub product_store: Arc<dyn ProductStore>,
    pub transaction_store: Arc<dyn TransactionStore>,
}

impl EntitlementEngine {
    pub fn new(config: &Config, stores: StoreBindings) -> Self {
        Self::with_parser(config, stores, ReceiptParser::new())
    }

    /// Build with a custom parser, e.g. one carrying a signature verifier
    pub fn with_parser(config: &Config, stores: StoreBindings, parser: ReceiptParser) -> Self {
        let catalog = ProductCatalog::new(config.catalog.identifier_prefix.clone());

        let entitlement_service = Arc::new(EntitlementService::new(
            stores.receipt_source,
            parser,
            catalog.clone(),
            LegacyVersion::new(config.entitlements.legacy_version.clone()),
            EngineFlags {
                beta_override: config.entitlements.beta_override,
            },
        ));
        let catalog_service = Arc::new(CatalogService::new(catalog, stores.product_store));
        let purchase_service = Arc::new(PurchaseService::new(
            stores.transaction_store,
            entitlement_service.clone(),
        ));

        Self {
            entitlement_service,
            catalog_service,
            purchase_service,
        }
    }

    pub fn reload(&self) -> ReloadOutcome {
        self.entitlement_service.reload()
    }

    pub fn entitlements(&self) -> Arc<EntitlementSet> {
        self.entitlement_service.entitlements()
    }

    pub fn catalog(&self) -> &ProductCatalog {
        self.entitlement_service.catalog()
    }

    pub fn is_full_version(&self) -> bool {
        self.entitlement_service.is_full_version()
    }

    pub fn is_eligible(&self, feature: &Product) -> bool {
        self.entitlement_service.is_eligible(feature)
    }

    pub fn is_eligible_for_provider(&self, name: &str) -> bool {
        self.entitlement_service.is_eligible_for_provider(name)
    }

    pub async fn list_products(&self) -> Vec<ProductDescriptor> {
        self.catalog_service.list_products().await
    }

    pub async fn purchase(&self, descriptor: &ProductDescriptor) -> Result<PurchaseOutcome> {
        self.purchase_service.purchase(descriptor).await
    }
}
