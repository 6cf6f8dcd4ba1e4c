//! Boundaries to the platform: receipt storage and the App Store services.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::{
    config::ReceiptEncoding,
    error::StoreError,
    models::purchase::{ProductDescriptor, PurchaseOutcome},
};

/// Where the raw receipt blob lives. `Ok(None)` means there is no receipt at all.
pub trait ReceiptSource: Send + Sync {
    fn read(&self) -> io::Result<Option<Vec<u8>>>;
}

/// Receipt stored on the local filesystem
#[derive(Debug, Clone)]
pub struct FileReceiptSource {
    path: PathBuf,
    encoding: ReceiptEncoding,
}

impl FileReceiptSource {
    pub fn new(path: impl Into<PathBuf>, encoding: ReceiptEncoding) -> Self {
        Self {
            path: path.into(),
            encoding,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReceiptSource for FileReceiptSource {
    fn read(&self) -> io::Result<Option<Vec<u8>>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        match self.encoding {
            ReceiptEncoding::Binary => Ok(Some(bytes)),
            ReceiptEncoding::Base64 => {
                let text = String::from_utf8_lossy(&bytes);
                let compact: String = text.split_whitespace().collect();
                STANDARD
                    .decode(compact)
                    .map(Some)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
            }
        }
    }
}

/// In-memory receipt, replaceable at runtime
#[derive(Debug, Default)]
pub struct StaticReceiptSource {
    bytes: RwLock<Option<Vec<u8>>>,
}

impl StaticReceiptSource {
    pub fn new(bytes: Option<Vec<u8>>) -> Self {
        Self {
            bytes: RwLock::new(bytes),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn replace(&self, bytes: Option<Vec<u8>>) {
        let mut guard = self.bytes.write().unwrap_or_else(|e| e.into_inner());
        *guard = bytes;
    }
}

impl ReceiptSource for StaticReceiptSource {
    fn read(&self) -> io::Result<Option<Vec<u8>>> {
        let guard = self.bytes.read().unwrap_or_else(|e| e.into_inner());
        Ok(guard.clone())
    }
}

/// Store service that enumerates purchasable products
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn request_descriptors(
        &self,
        identifiers: &BTreeSet<String>,
    ) -> Result<Vec<ProductDescriptor>, StoreError>;
}

/// Store service that runs purchase transactions, one outcome per call
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn submit(&self, descriptor: &ProductDescriptor) -> Result<PurchaseOutcome, StoreError>;
}

/// Store binding for processes without App Store access
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineStore;

#[async_trait]
impl ProductStore for OfflineStore {
    async fn request_descriptors(
        &self,
        _identifiers: &BTreeSet<String>,
    ) -> Result<Vec<ProductDescriptor>, StoreError> {
        Err(StoreError::Unavailable("offline".to_string()))
    }
}

#[async_trait]
impl TransactionStore for OfflineStore {
    async fn submit(&self, _descriptor: &ProductDescriptor) -> Result<PurchaseOutcome, StoreError> {
        Err(StoreError::Unavailable("offline".to_string()))
    }
}
