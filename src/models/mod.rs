// Domain models
pub mod entitlement;
pub mod product;
pub mod purchase;
pub mod receipt;
