use serde::Serialize;
use std::collections::BTreeSet;

use super::product::Product;

/// Products the user is currently granted. Replaced whole on every resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EntitlementSet {
    products: BTreeSet<Product>,
}

impl EntitlementSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, product: &Product) -> bool {
        self.products.contains(product)
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Product> {
        self.products.iter()
    }
}

impl FromIterator<Product> for EntitlementSet {
    fn from_iter<I: IntoIterator<Item = Product>>(iter: I) -> Self {
        Self {
            products: iter.into_iter().collect(),
        }
    }
}
