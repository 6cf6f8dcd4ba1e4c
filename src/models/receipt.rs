use serde::Serialize;
use time::OffsetDateTime;

/// Decoded App Store receipt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    /// Version under which the app was originally purchased
    pub original_app_version: String,
    pub bundle_identifier: Option<String>,
    pub app_version: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub creation_date: Option<OffsetDateTime>,
    /// In-app purchases, in receipt order
    pub in_app_purchases: Vec<PurchaseRecord>,
}

impl Receipt {
    pub fn new(original_app_version: impl Into<String>) -> Self {
        Self {
            original_app_version: original_app_version.into(),
            bundle_identifier: None,
            app_version: None,
            creation_date: None,
            in_app_purchases: Vec::new(),
        }
    }

    pub fn with_purchase(mut self, record: PurchaseRecord) -> Self {
        self.in_app_purchases.push(record);
        self
    }
}

/// One historical in-app purchase. The identifier may not match a known product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRecord {
    pub product_identifier: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub original_purchase_date: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub purchase_date: Option<OffsetDateTime>,
    pub transaction_identifier: Option<String>,
    pub original_transaction_identifier: Option<String>,
    pub quantity: Option<i64>,
}

impl PurchaseRecord {
    pub fn new(product_identifier: impl Into<String>) -> Self {
        Self {
            product_identifier: product_identifier.into(),
            original_purchase_date: None,
            purchase_date: None,
            transaction_identifier: None,
            original_transaction_identifier: None,
            quantity: None,
        }
    }

    pub fn purchased_at(mut self, date: OffsetDateTime) -> Self {
        self.original_purchase_date = Some(date);
        self
    }
}
