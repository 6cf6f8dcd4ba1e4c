// Library exports for embedding and testing
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use config::Config;
pub use engine::{EntitlementEngine, StoreBindings};
pub use error::{EngineError, Result, StoreError};
pub use services::ReceiptParser;
pub use models::{
    entitlement::EntitlementSet,
    product::{Feature, Product, ProductCatalog, Provider},
    purchase::{ProductDescriptor, PurchaseOutcome},
    receipt::{PurchaseRecord, Receipt},
};
