use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub receipt: ReceiptConfig,
    #[serde(default)]
    pub entitlements: EntitlementsConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReceiptConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub encoding: ReceiptEncoding,
}

impl Default for ReceiptConfig {
    fn default() -> Self {
        Self {
            path: None,
            encoding: ReceiptEncoding::Binary,
        }
    }
}

/// On-disk representation of the receipt blob
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptEncoding {
    #[default]
    Binary,
    Base64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntitlementsConfig {
    /// Purchases made under this version or earlier are treated as full versions
    #[serde(default = "default_legacy_version")]
    pub legacy_version: String,
    /// Build-time override that unlocks everything (beta builds)
    #[serde(default)]
    pub beta_override: bool,
}

impl Default for EntitlementsConfig {
    fn default() -> Self {
        Self {
            legacy_version: default_legacy_version(),
            beta_override: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_identifier_prefix")]
    pub identifier_prefix: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            identifier_prefix: default_identifier_prefix(),
        }
    }
}

fn default_legacy_version() -> String {
    crate::models::product::LAST_FULL_VERSION.to_string()
}

fn default_identifier_prefix() -> String {
    crate::models::product::DEFAULT_IDENTIFIER_PREFIX.to_string()
}

impl Config {
    pub fn load() -> crate::error::Result<Self> {
        // Load .env file if it exists (for environment variable overrides)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("ENTITLEMENTS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
