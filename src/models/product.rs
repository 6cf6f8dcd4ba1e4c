use serde::{Deserialize, Serialize};

/// Identifier prefix shared by every in-app product of the app
pub const DEFAULT_IDENTIFIER_PREFIX: &str = "com.algoritmico.ios.Passepartout";

/// Last app version sold as a paid download, before in-app purchases existed
pub const LAST_FULL_VERSION: &str = "1.8.1";

/// Purchasable capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Product {
    /// Unlocks every feature and provider
    FullVersion,
    Feature(Feature),
    Provider(Provider),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Feature {
    UnlimitedHosts,
    TrustedNetworks,
    SiriShortcuts,
}

impl Feature {
    pub const ALL: [Feature; 3] = [
        Feature::UnlimitedHosts,
        Feature::TrustedNetworks,
        Feature::SiriShortcuts,
    ];

    fn slug(&self) -> &'static str {
        match self {
            Feature::UnlimitedHosts => "unlimited_hosts",
            Feature::TrustedNetworks => "trusted_networks",
            Feature::SiriShortcuts => "siri",
        }
    }
}

/// Network provider sold as a separate unlock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Provider {
    Mullvad,
    NordVpn,
    Pia,
    ProtonVpn,
    TunnelBear,
    VyprVpn,
    Windscribe,
}

impl Provider {
    pub const ALL: [Provider; 7] = [
        Provider::Mullvad,
        Provider::NordVpn,
        Provider::Pia,
        Provider::ProtonVpn,
        Provider::TunnelBear,
        Provider::VyprVpn,
        Provider::Windscribe,
    ];

    /// Infrastructure name, case-sensitive
    pub fn name(&self) -> &'static str {
        match self {
            Provider::Mullvad => "Mullvad",
            Provider::NordVpn => "NordVPN",
            Provider::Pia => "PIA",
            Provider::ProtonVpn => "ProtonVPN",
            Provider::TunnelBear => "TunnelBear",
            Provider::VyprVpn => "VyprVPN",
            Provider::Windscribe => "Windscribe",
        }
    }
}

impl Product {
    /// Identifier without the app prefix, e.g. `features.siri`
    pub fn suffix(&self) -> String {
        match self {
            Product::FullVersion => "features.full_version".to_string(),
            Product::Feature(feature) => format!("features.{}", feature.slug()),
            Product::Provider(provider) => format!("providers.{}", provider.name()),
        }
    }
}

/// The closed set of products known to this build, bound to an identifier prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductCatalog {
    prefix: String,
}

impl Default for ProductCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_IDENTIFIER_PREFIX)
    }
}

impl ProductCatalog {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Every product, features first
    pub fn all(&self) -> Vec<Product> {
        let mut products = vec![Product::FullVersion];
        products.extend(Feature::ALL.into_iter().map(Product::Feature));
        products.extend(Provider::ALL.into_iter().map(Product::Provider));
        products
    }

    pub fn identifiers(&self) -> Vec<String> {
        self.all().iter().map(|p| self.identifier(p)).collect()
    }

    pub fn identifier(&self, product: &Product) -> String {
        format!("{}.{}", self.prefix, product.suffix())
    }

    /// Maps a store identifier back to a product, `None` when unknown
    pub fn product(&self, identifier: &str) -> Option<Product> {
        let suffix = identifier
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('.'))?;

        match suffix {
            "features.full_version" => Some(Product::FullVersion),
            "features.unlimited_hosts" => Some(Product::Feature(Feature::UnlimitedHosts)),
            "features.trusted_networks" => Some(Product::Feature(Feature::TrustedNetworks)),
            "features.siri" => Some(Product::Feature(Feature::SiriShortcuts)),
            "providers.Mullvad" => Some(Product::Provider(Provider::Mullvad)),
            "providers.NordVPN" => Some(Product::Provider(Provider::NordVpn)),
            "providers.PIA" => Some(Product::Provider(Provider::Pia)),
            "providers.ProtonVPN" => Some(Product::Provider(Provider::ProtonVpn)),
            "providers.TunnelBear" => Some(Product::Provider(Provider::TunnelBear)),
            "providers.VyprVPN" => Some(Product::Provider(Provider::VyprVpn)),
            "providers.Windscribe" => Some(Product::Provider(Provider::Windscribe)),
            _ => None,
        }
    }

    /// True if the product identifier ends with `providers.<name>`
    pub fn unlocks_provider(&self, product: &Product, name: &str) -> bool {
        self.identifier(product)
            .ends_with(&format!("providers.{}", name))
    }
}
