use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::{
    error::{EngineError, Result},
    models::purchase::{ProductDescriptor, PurchaseOutcome},
    services::{entitlement_service::EntitlementService, store::TransactionStore},
};

/// Runs purchase transactions and refreshes entitlements after a success
pub struct PurchaseService {
    store: Arc<dyn TransactionStore>,
    entitlements: Arc<EntitlementService>,
}

impl PurchaseService {
    pub fn new(store: Arc<dyn TransactionStore>, entitlements: Arc<EntitlementService>) -> Self {
        Self {
            store,
            entitlements,
        }
    }

    /// Purchase a product. Failures are returned as `PurchaseFailed` and never retried.
    /// When the future resolves with `Succeeded`, the entitlement set already reflects
    /// the new receipt.
    #[instrument(skip(self, descriptor), fields(product_id = %descriptor.identifier))]
    pub async fn purchase(&self, descriptor: &ProductDescriptor) -> Result<PurchaseOutcome> {
        let outcome = self.store.submit(descriptor).await.map_err(|e| {
            warn!("Purchase failed: {}", e);
            EngineError::PurchaseFailed(e.to_string())
        })?;

        info!(outcome = outcome.as_str(), "Purchase completed");

        if outcome == PurchaseOutcome::Succeeded {
            let reload = self.entitlements.reload();
            if !reload.is_resolved() {
                warn!("Receipt reload after purchase did not resolve: {:?}", reload);
            }
        }

        Ok(outcome)
    }
}
