use crate::connection::DbPool;
use crate::repositories::{parse_decimal, RepositoryError};
use sqlx::Executor;

/// Seeded shipping methods with their default cost.
const SEED_METHODS: &[SeedMethodContract] = &[
    SeedMethodContract { id: "standard", default_cost: "9.99", sort_order: 1 },
    SeedMethodContract { id: "express", default_cost: "19.99", sort_order: 2 },
    SeedMethodContract { id: "overnight", default_cost: "29.99", sort_order: 3 },
];

/// Rate rows the estimator's reference quotes depend on.
const SEED_RATES: &[SeedRateContract] = &[
    SeedRateContract {
        label: "standard-us-ca-light",
        id: "rate-standard-us-ca-1",
        country: "US",
        state: Some("CA"),
        cost: "14.95",
    },
    SeedRateContract {
        label: "standard-us-light",
        id: "rate-standard-us-1",
        country: "US",
        state: None,
        cost: "8.95",
    },
    SeedRateContract {
        label: "standard-catch-all-light",
        id: "rate-standard-row-1",
        country: "",
        state: None,
        cost: "24.95",
    },
];

const SEED_TAX_RATES: &[SeedTaxContract] = &[
    SeedTaxContract { id: "tax-us-ca", rate: "0.0725" },
    SeedTaxContract { id: "tax-us-ny", rate: "0.045" },
    SeedTaxContract { id: "tax-gb", rate: "0.2" },
];

const EXPECTED_RATE_ROWS: i64 = 12;
const EXPECTED_TAX_ROWS: i64 = 6;
const EXPECTED_PRODUCT_ROWS: i64 = 4;

/// Reference data for the storefront estimator: three shipping methods, their
/// weight bands for US, CA and the rest of the world, regional tax rates and a
/// small catalog with shipping weights.
pub struct ShippingSeedDataset;

impl ShippingSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/shipping_seed_data.sql");

    /// Upserts the dataset. Safe to run repeatedly.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;

        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let counts = Self::counts(pool).await?;
        Ok(SeedResult {
            methods_seeded: counts.methods,
            rates_seeded: counts.rates,
            tax_rates_seeded: counts.tax_rates,
            products_seeded: counts.products,
        })
    }

    /// Checks the rows the reference quotes rely on.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for method in SEED_METHODS {
            let row = sqlx::query_as::<_, (String, i64, i64)>(
                "SELECT default_cost, sort_order, active FROM shipping_method WHERE id = ?1",
            )
            .bind(method.id)
            .fetch_optional(pool)
            .await?;
            let ok = match row {
                Some((default_cost, sort_order, active)) => {
                    parse_decimal("default_cost", &default_cost)?
                        == parse_decimal("default_cost", method.default_cost)?
                        && sort_order == method.sort_order
                        && active == 1
                }
                None => false,
            };
            checks.push((method.id, ok));
        }

        for rate in SEED_RATES {
            let cost: Option<String> = sqlx::query_scalar(
                "SELECT cost FROM shipping_rate WHERE id = ?1 AND country = ?2 AND state IS ?3",
            )
            .bind(rate.id)
            .bind(rate.country)
            .bind(rate.state)
            .fetch_optional(pool)
            .await?;
            let ok = match cost {
                Some(cost) => {
                    parse_decimal("cost", &cost)? == parse_decimal("cost", rate.cost)?
                }
                None => false,
            };
            checks.push((rate.label, ok));
        }

        for tax in SEED_TAX_RATES {
            let rate: Option<String> =
                sqlx::query_scalar("SELECT rate FROM tax_rate WHERE id = ?1 AND active = 1")
                    .bind(tax.id)
                    .fetch_optional(pool)
                    .await?;
            let ok = match rate {
                Some(rate) => parse_decimal("rate", &rate)? == parse_decimal("rate", tax.rate)?,
                None => false,
            };
            checks.push((tax.id, ok));
        }

        let counts = Self::counts(pool).await?;
        checks.push(("shipping-rate-count", counts.rates >= EXPECTED_RATE_ROWS));
        checks.push(("tax-rate-count", counts.tax_rates >= EXPECTED_TAX_ROWS));
        checks.push(("product-count", counts.products >= EXPECTED_PRODUCT_ROWS));

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes every seeded row from a test database.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM shipping_rate").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM shipping_method").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM tax_rate").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM product").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn counts(pool: &DbPool) -> Result<SeedCounts, RepositoryError> {
        let methods: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM shipping_method").fetch_one(pool).await?;
        let rates: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM shipping_rate").fetch_one(pool).await?;
        let tax_rates: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM tax_rate").fetch_one(pool).await?;
        let products: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM product").fetch_one(pool).await?;
        Ok(SeedCounts { methods, rates, tax_rates, products })
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedMethodContract {
    id: &'static str,
    default_cost: &'static str,
    sort_order: i64,
}

#[derive(Debug, Clone, Copy)]
struct SeedRateContract {
    label: &'static str,
    id: &'static str,
    country: &'static str,
    state: Option<&'static str>,
    cost: &'static str,
}

#[derive(Debug, Clone, Copy)]
struct SeedTaxContract {
    id: &'static str,
    rate: &'static str,
}

struct SeedCounts {
    methods: i64,
    rates: i64,
    tax_rates: i64,
    products: i64,
}

#[derive(Debug)]
pub struct SeedResult {
    pub methods_seeded: i64,
    pub rates_seeded: i64,
    pub tax_rates_seeded: i64,
    pub products_seeded: i64,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
