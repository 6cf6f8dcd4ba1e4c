use serde::{Deserialize, Serialize};

/// Store-side metadata of a purchasable product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDescriptor {
    pub identifier: String,
    pub localized_title: String,
    /// Decimal price as reported by the store, e.g. "4.99"
    pub price: String,
    pub currency_code: String,
}

/// Non-failing outcome of a purchase transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseOutcome {
    Succeeded,
    Cancelled,
    /// Deferred, e.g. awaiting parental approval
    Pending,
}

impl PurchaseOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Cancelled => "cancelled",
            Self::Pending => "pending",
        }
    }
}
