// Service modules
pub mod catalog_service;
pub mod entitlement_service;
pub mod purchase_service;
pub mod receipt_parser;
pub mod store;

pub use catalog_service::CatalogService;
pub use entitlement_service::EntitlementService;
pub use purchase_service::PurchaseService;
pub use receipt_parser::ReceiptParser;
