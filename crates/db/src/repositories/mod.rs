use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use shipquote_core::domain::product::{Product, ProductId};
use shipquote_core::domain::shipping::{ShippingMethod, ShippingMethodId, ShippingRate};
use shipquote_core::domain::tax::TaxRate;
use shipquote_core::errors::DomainError;

pub mod memory;
pub mod product;
pub mod rates;

pub use memory::{InMemoryProductRepository, InMemoryRateRepository};
pub use product::SqlProductRepository;
pub use rates::SqlRateRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("rejected reference data: {0}")]
    Rejected(#[from] DomainError),
}

/// Read access to the shipping and tax reference tables, plus the upserts the
/// seeder uses. The query path never writes.
#[async_trait]
pub trait RateRepository: Send + Sync {
    async fn list_active_shipping_methods(&self) -> Result<Vec<ShippingMethod>, RepositoryError>;

    async fn find_shipping_method(
        &self,
        id: &ShippingMethodId,
    ) -> Result<Option<ShippingMethod>, RepositoryError>;

    /// Rows of `method_id` for `country` that apply to `state`. Pass `""` as
    /// the country to fetch the catch-all rows.
    async fn find_shipping_rates(
        &self,
        method_id: &ShippingMethodId,
        country: &str,
        state: Option<&str>,
    ) -> Result<Vec<ShippingRate>, RepositoryError>;

    async fn find_tax_rate(
        &self,
        country: &str,
        state: Option<&str>,
    ) -> Result<Option<TaxRate>, RepositoryError>;

    async fn upsert_shipping_method(&self, method: ShippingMethod) -> Result<(), RepositoryError>;

    async fn upsert_shipping_rate(&self, rate: ShippingRate) -> Result<(), RepositoryError>;

    async fn upsert_tax_rate(&self, rate: TaxRate) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Catalog weights for the given ids. Products without a recorded weight
    /// are absent from the map.
    async fn find_weights(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Decimal>, RepositoryError>;

    async fn save(&self, product: Product) -> Result<(), RepositoryError>;
}

pub(crate) fn parse_decimal(column: &str, value: &str) -> Result<Decimal, RepositoryError> {
    value.trim().parse::<Decimal>().map_err(|error| {
        RepositoryError::Decode(format!("column `{column}` holds invalid decimal `{value}`: {error}"))
    })
}
