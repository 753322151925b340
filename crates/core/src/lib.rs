pub mod config;
pub mod domain;
pub mod errors;
pub mod rates;

pub use domain::cart::CartLine;
pub use domain::destination::Destination;
pub use domain::estimate::{QuoteTotals, ShippingEstimate, ShippingQuote, ShippingTier};
pub use domain::product::{Product, ProductId};
pub use domain::shipping::{ShippingMethod, ShippingMethodId, ShippingRate, WeightBand};
pub use domain::tax::{TaxRate, TaxRateId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use rates::table::RateTable;
pub use rates::{DeterministicEstimateRuntime, EstimateInput, EstimateRuntime};
