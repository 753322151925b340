use std::collections::HashMap;

use rust_decimal::Decimal;
use tokio::sync::RwLock;

use shipquote_core::domain::product::{Product, ProductId};
use shipquote_core::domain::shipping::{
    validate_rate_bands, ShippingMethod, ShippingMethodId, ShippingRate,
};
use shipquote_core::domain::tax::{validate_tax_scopes, TaxRate};
use shipquote_core::rates::table::RateTable;

use super::{ProductRepository, RateRepository, RepositoryError};

/// `RateRepository` over a `RateTable` snapshot. Used by tests and by callers
/// that preload reference data.
#[derive(Default)]
pub struct InMemoryRateRepository {
    table: RwLock<RateTable>,
}

impl InMemoryRateRepository {
    pub fn new(table: RateTable) -> Self {
        Self { table: RwLock::new(table) }
    }
}

#[async_trait::async_trait]
impl RateRepository for InMemoryRateRepository {
    async fn list_active_shipping_methods(&self) -> Result<Vec<ShippingMethod>, RepositoryError> {
        let table = self.table.read().await;
        Ok(table.list_active_shipping_methods())
    }

    async fn find_shipping_method(
        &self,
        id: &ShippingMethodId,
    ) -> Result<Option<ShippingMethod>, RepositoryError> {
        let table = self.table.read().await;
        Ok(table.find_shipping_method(id).cloned())
    }

    async fn find_shipping_rates(
        &self,
        method_id: &ShippingMethodId,
        country: &str,
        state: Option<&str>,
    ) -> Result<Vec<ShippingRate>, RepositoryError> {
        let table = self.table.read().await;
        Ok(table.find_shipping_rates(method_id, country, state))
    }

    async fn find_tax_rate(
        &self,
        country: &str,
        state: Option<&str>,
    ) -> Result<Option<TaxRate>, RepositoryError> {
        let table = self.table.read().await;
        Ok(table.find_tax_rate(country, state))
    }

    async fn upsert_shipping_method(&self, method: ShippingMethod) -> Result<(), RepositoryError> {
        let mut table = self.table.write().await;
        table.upsert_shipping_method(method);
        Ok(())
    }

    async fn upsert_shipping_rate(&self, rate: ShippingRate) -> Result<(), RepositoryError> {
        let mut table = self.table.write().await;
        let mut candidate = table.clone();
        candidate.upsert_shipping_rate(rate);
        validate_rate_bands(candidate.shipping_rates())?;
        *table = candidate;
        Ok(())
    }

    async fn upsert_tax_rate(&self, rate: TaxRate) -> Result<(), RepositoryError> {
        let mut table = self.table.write().await;
        let mut candidate = table.clone();
        candidate.upsert_tax_rate(rate);
        validate_tax_scopes(candidate.tax_rates())?;
        *table = candidate;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryProductRepository {
    products: RwLock<HashMap<String, Product>>,
}

#[async_trait::async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.get(&id.0).cloned())
    }

    async fn find_weights(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Decimal>, RepositoryError> {
        let products = self.products.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| {
                products.get(&id.0).and_then(|product| product.weight).map(|w| (id.clone(), w))
            })
            .collect())
    }

    async fn save(&self, product: Product) -> Result<(), RepositoryError> {
        let mut products = self.products.write().await;
        products.insert(product.id.0.clone(), product);
        Ok(())
    }
}
