pub mod connection;
pub mod estimate;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_config, connect_with_settings, DbPool};
pub use estimate::{EstimateError, EstimateRequest, EstimateService};
pub use fixtures::{SeedResult, ShippingSeedDataset, VerificationResult};
