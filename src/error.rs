use crate::services::receipt_parser::ReceiptDecodeError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("No App Store receipt available")]
    ReceiptUnavailable,

    #[error("Could not parse App Store receipt: {0}")]
    ReceiptDecode(#[from] ReceiptDecodeError),

    #[error("Could not read App Store receipt: {0}")]
    ReceiptIo(#[from] std::io::Error),

    #[error("Purchase failed: {0}")]
    PurchaseFailed(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl EngineError {
    /// Stable code for diagnostics output
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::ReceiptUnavailable => "RECEIPT_UNAVAILABLE",
            EngineError::ReceiptDecode(_) => "RECEIPT_DECODE_ERROR",
            EngineError::ReceiptIo(_) => "RECEIPT_IO_ERROR",
            EngineError::PurchaseFailed(_) => "PURCHASE_FAILED",
            EngineError::Config(_) => "CONFIG_ERROR",
        }
    }
}

/// Errors reported by the platform store collaborators
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Payment declined: {0}")]
    Declined(String),
}

// Helper type for results
pub type Result<T> = std::result::Result<T, EngineError>;
