use std::sync::{Arc, RwLock};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    error::{EngineError, Result},
    models::{
        entitlement::EntitlementSet,
        product::{Product, ProductCatalog},
        receipt::Receipt,
    },
    services::{receipt_parser::ReceiptParser, store::ReceiptSource},
};

/// Original app versions at or below this threshold are granted the full version.
///
/// Versions are compared as plain strings, byte by byte. This is not semantic
/// version ordering: `"1.10"` sorts before `"1.8.1"` and is therefore grandfathered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyVersion(String);

impl LegacyVersion {
    pub fn new(threshold: impl Into<String>) -> Self {
        Self(threshold.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn grandfathers(&self, original_app_version: &str) -> bool {
        original_app_version <= self.0.as_str()
    }
}

impl Default for LegacyVersion {
    fn default() -> Self {
        Self::new(crate::models::product::LAST_FULL_VERSION)
    }
}

/// Process-wide flags fixed at build/launch time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineFlags {
    /// Beta builds unlock everything
    pub beta_override: bool,
}

/// Compute the entitlement set for a receipt. Absent receipt yields an empty set.
pub fn resolve(
    receipt: Option<&Receipt>,
    catalog: &ProductCatalog,
    legacy: &LegacyVersion,
) -> EntitlementSet {
    let Some(receipt) = receipt else {
        return EntitlementSet::empty();
    };

    let grandfathered = legacy
        .grandfathers(&receipt.original_app_version)
        .then_some(Product::FullVersion);

    grandfathered
        .into_iter()
        .chain(
            receipt
                .in_app_purchases
                .iter()
                .filter_map(|record| catalog.product(&record.product_identifier)),
        )
        .collect()
}

/// Result of a receipt reload, for diagnostics. Entitlements are replaced in every case.
#[derive(Debug)]
pub enum ReloadOutcome {
    Resolved {
        fingerprint: String,
        entitlements: Arc<EntitlementSet>,
    },
    /// No receipt on the device
    Unavailable,
    /// Receipt could not be read or decoded
    Rejected(EngineError),
}

impl ReloadOutcome {
    pub fn is_resolved(&self) -> bool {
        matches!(self, ReloadOutcome::Resolved { .. })
    }

    /// Surface the failure, for callers that want to report why nothing was granted
    pub fn into_result(self) -> Result<Arc<EntitlementSet>> {
        match self {
            ReloadOutcome::Resolved { entitlements, .. } => Ok(entitlements),
            ReloadOutcome::Unavailable => Err(EngineError::ReceiptUnavailable),
            ReloadOutcome::Rejected(e) => Err(e),
        }
    }
}

/// Owns the current entitlement set and answers eligibility queries
pub struct EntitlementService {
    source: Arc<dyn ReceiptSource>,
    parser: ReceiptParser,
    catalog: ProductCatalog,
    legacy: LegacyVersion,
    flags: EngineFlags,
    current: RwLock<Arc<EntitlementSet>>,
}

impl EntitlementService {
    pub fn new(
        source: Arc<dyn ReceiptSource>,
        parser: ReceiptParser,
        catalog: ProductCatalog,
        legacy: LegacyVersion,
        flags: EngineFlags,
    ) -> Self {
        Self {
            source,
            parser,
            catalog,
            legacy,
            flags,
            current: RwLock::new(Arc::new(EntitlementSet::empty())),
        }
    }

    pub fn catalog(&self) -> &ProductCatalog {
        &self.catalog
    }

    /// Re-read the receipt and replace the entitlement set. Never fails: a missing or
    /// malformed receipt leaves the user with no entitlements.
    #[instrument(skip(self))]
    pub fn reload(&self) -> ReloadOutcome {
        let bytes = match self.source.read() {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                warn!("No App Store receipt found");
                self.replace(EntitlementSet::empty());
                return ReloadOutcome::Unavailable;
            }
            Err(e) => {
                error!("Could not read App Store receipt: {}", e);
                self.replace(EntitlementSet::empty());
                return ReloadOutcome::Rejected(EngineError::ReceiptIo(e));
            }
        };

        let fingerprint = ReceiptParser::fingerprint(&bytes);
        let receipt = match self.parser.parse(&bytes) {
            Ok(receipt) => receipt,
            Err(e) => {
                error!(fingerprint = %fingerprint, "Could not parse App Store receipt: {}", e);
                self.replace(EntitlementSet::empty());
                return ReloadOutcome::Rejected(EngineError::ReceiptDecode(e));
            }
        };

        debug!("Original purchased version: {}", receipt.original_app_version);
        for record in &receipt.in_app_purchases {
            debug!(
                product_id = %record.product_identifier,
                original_purchase_date = ?record.original_purchase_date,
                "In-app receipt"
            );
        }

        let entitlements = self.replace(resolve(Some(&receipt), &self.catalog, &self.legacy));
        info!(
            fingerprint = %fingerprint,
            "Purchased features: {:?}",
            entitlements.iter().collect::<Vec<_>>()
        );

        ReloadOutcome::Resolved {
            fingerprint,
            entitlements,
        }
    }

    /// Snapshot of the current set
    pub fn entitlements(&self) -> Arc<EntitlementSet> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_full_version(&self) -> bool {
        self.unlocks_everything(&self.entitlements())
    }

    pub fn is_eligible(&self, feature: &Product) -> bool {
        let set = self.entitlements();
        self.unlocks_everything(&set) || set.contains(feature)
    }

    /// Exact, case-sensitive match on the `providers.<name>` identifier suffix
    pub fn is_eligible_for_provider(&self, name: &str) -> bool {
        let set = self.entitlements();
        self.unlocks_everything(&set)
            || set
                .iter()
                .any(|product| self.catalog.unlocks_provider(product, name))
    }

    // Every query answers from a single snapshot
    fn unlocks_everything(&self, set: &EntitlementSet) -> bool {
        self.flags.beta_override || set.contains(&Product::FullVersion)
    }

    fn replace(&self, entitlements: EntitlementSet) -> Arc<EntitlementSet> {
        let entitlements = Arc::new(entitlements);
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = entitlements.clone();
        entitlements
    }
}
