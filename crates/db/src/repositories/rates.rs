use sqlx::Row;

use shipquote_core::domain::destination::normalize_region;
use shipquote_core::domain::shipping::{
    validate_rate_bands, ShippingMethod, ShippingMethodId, ShippingRate, ShippingRateId,
    WeightBand,
};
use shipquote_core::domain::tax::{validate_tax_scopes, TaxRate, TaxRateId};
use shipquote_core::rates::table::applicable_shipping_rates;
use shipquote_core::rates::tax::select_tax_rate;

use super::{parse_decimal, RateRepository, RepositoryError};
use crate::DbPool;

pub struct SqlRateRepository {
    pool: DbPool,
}

impl SqlRateRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode<T>(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<T, RepositoryError>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn row_to_method(row: &sqlx::sqlite::SqliteRow) -> Result<ShippingMethod, RepositoryError> {
    let default_cost: String = decode(row, "default_cost")?;

    Ok(ShippingMethod {
        id: ShippingMethodId(decode(row, "id")?),
        name: decode(row, "name")?,
        description: decode(row, "description")?,
        estimated_days: decode(row, "estimated_days")?,
        active: decode::<i64>(row, "active")? != 0,
        default_cost: parse_decimal("default_cost", &default_cost)?,
        sort_order: decode(row, "sort_order")?,
    })
}

fn row_to_shipping_rate(row: &sqlx::sqlite::SqliteRow) -> Result<ShippingRate, RepositoryError> {
    let min_weight: String = decode(row, "min_weight")?;
    let max_weight: String = decode(row, "max_weight")?;
    let cost: String = decode(row, "cost")?;

    Ok(ShippingRate {
        id: ShippingRateId(decode(row, "id")?),
        method_id: ShippingMethodId(decode(row, "method_id")?),
        country: decode(row, "country")?,
        state: decode(row, "state")?,
        band: WeightBand::new(
            parse_decimal("min_weight", &min_weight)?,
            parse_decimal("max_weight", &max_weight)?,
        ),
        cost: parse_decimal("cost", &cost)?,
    })
}

fn row_to_tax_rate(row: &sqlx::sqlite::SqliteRow) -> Result<TaxRate, RepositoryError> {
    let rate: String = decode(row, "rate")?;

    Ok(TaxRate {
        id: TaxRateId(decode(row, "id")?),
        country: decode(row, "country")?,
        state: decode(row, "state")?,
        rate: parse_decimal("rate", &rate)?,
        active: decode::<i64>(row, "active")? != 0,
    })
}

fn normalized_state(state: Option<&str>) -> Option<String> {
    state.map(normalize_region).filter(|state| !state.is_empty())
}

#[async_trait::async_trait]
impl RateRepository for SqlRateRepository {
    async fn list_active_shipping_methods(&self) -> Result<Vec<ShippingMethod>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, description, estimated_days, active, default_cost, sort_order
             FROM shipping_method
             WHERE active = 1
             ORDER BY sort_order ASC, name ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_method).collect()
    }

    async fn find_shipping_method(
        &self,
        id: &ShippingMethodId,
    ) -> Result<Option<ShippingMethod>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, description, estimated_days, active, default_cost, sort_order
             FROM shipping_method WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_method).transpose()
    }

    async fn find_shipping_rates(
        &self,
        method_id: &ShippingMethodId,
        country: &str,
        state: Option<&str>,
    ) -> Result<Vec<ShippingRate>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, method_id, country, state, min_weight, max_weight, cost
             FROM shipping_rate
             WHERE method_id = ? AND country = ?",
        )
        .bind(&method_id.0)
        .bind(normalize_region(country))
        .fetch_all(&self.pool)
        .await?;

        let scoped = rows.iter().map(row_to_shipping_rate).collect::<Result<Vec<_>, _>>()?;
        Ok(applicable_shipping_rates(&scoped, method_id, country, state))
    }

    async fn find_tax_rate(
        &self,
        country: &str,
        state: Option<&str>,
    ) -> Result<Option<TaxRate>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, country, state, rate, active
             FROM tax_rate
             WHERE active = 1 AND country IN (?, '')
             ORDER BY id ASC",
        )
        .bind(normalize_region(country))
        .fetch_all(&self.pool)
        .await?;

        let candidates = rows.iter().map(row_to_tax_rate).collect::<Result<Vec<_>, _>>()?;
        Ok(select_tax_rate(&candidates, country, state).cloned())
    }

    async fn upsert_shipping_method(&self, method: ShippingMethod) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO shipping_method (id, name, description, estimated_days, active,
                                          default_cost, sort_order)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 description = excluded.description,
                 estimated_days = excluded.estimated_days,
                 active = excluded.active,
                 default_cost = excluded.default_cost,
                 sort_order = excluded.sort_order,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')",
        )
        .bind(&method.id.0)
        .bind(&method.name)
        .bind(&method.description)
        .bind(&method.estimated_days)
        .bind(i64::from(method.active))
        .bind(method.default_cost.to_string())
        .bind(method.sort_order)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn upsert_shipping_rate(&self, mut rate: ShippingRate) -> Result<(), RepositoryError> {
        rate.country = normalize_region(&rate.country);
        rate.state = normalized_state(rate.state.as_deref());
        rate.validate()?;

        let rows = sqlx::query(
            "SELECT id, method_id, country, state, min_weight, max_weight, cost
             FROM shipping_rate
             WHERE method_id = ? AND country = ? AND state IS ? AND id <> ?",
        )
        .bind(&rate.method_id.0)
        .bind(&rate.country)
        .bind(&rate.state)
        .bind(&rate.id.0)
        .fetch_all(&self.pool)
        .await?;

        let mut scope = rows.iter().map(row_to_shipping_rate).collect::<Result<Vec<_>, _>>()?;
        scope.push(rate.clone());
        validate_rate_bands(&scope)?;

        sqlx::query(
            "INSERT INTO shipping_rate (id, method_id, country, state, min_weight, max_weight, cost)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 method_id = excluded.method_id,
                 country = excluded.country,
                 state = excluded.state,
                 min_weight = excluded.min_weight,
                 max_weight = excluded.max_weight,
                 cost = excluded.cost,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')",
        )
        .bind(&rate.id.0)
        .bind(&rate.method_id.0)
        .bind(&rate.country)
        .bind(&rate.state)
        .bind(rate.band.min_weight.to_string())
        .bind(rate.band.max_weight.to_string())
        .bind(rate.cost.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn upsert_tax_rate(&self, mut rate: TaxRate) -> Result<(), RepositoryError> {
        rate.country = normalize_region(&rate.country);
        rate.state = normalized_state(rate.state.as_deref());
        rate.validate()?;

        let rows = sqlx::query(
            "SELECT id, country, state, rate, active
             FROM tax_rate
             WHERE active = 1 AND country = ? AND state IS ? AND id <> ?",
        )
        .bind(&rate.country)
        .bind(&rate.state)
        .bind(&rate.id.0)
        .fetch_all(&self.pool)
        .await?;

        let mut scope = rows.iter().map(row_to_tax_rate).collect::<Result<Vec<_>, _>>()?;
        scope.push(rate.clone());
        validate_tax_scopes(&scope)?;

        sqlx::query(
            "INSERT INTO tax_rate (id, country, state, rate, active)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 country = excluded.country,
                 state = excluded.state,
                 rate = excluded.rate,
                 active = excluded.active,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')",
        )
        .bind(&rate.id.0)
        .bind(&rate.country)
        .bind(&rate.state)
        .bind(rate.rate.to_string())
        .bind(i64::from(rate.active))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use shipquote_core::domain::shipping::{
        ShippingMethod, ShippingMethodId, ShippingRate, ShippingRateId, WeightBand,
    };
    use shipquote_core::domain::tax::{TaxRate, TaxRateId};
    use shipquote_core::errors::DomainError;

    use super::SqlRateRepository;
    use crate::repositories::{RateRepository, RepositoryError};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> SqlRateRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let repo = SqlRateRepository::new(pool);
        repo.upsert_shipping_method(method("standard", 1, true)).await.expect("seed standard");
        repo
    }

    fn method(id: &str, sort_order: i32, active: bool) -> ShippingMethod {
        ShippingMethod {
            id: ShippingMethodId(id.to_string()),
            name: format!("{id} shipping"),
            description: "Ground delivery".to_string(),
            estimated_days: "5-7 business days".to_string(),
            active,
            default_cost: Decimal::new(999, 2),
            sort_order,
        }
    }

    fn rate(
        id: &str,
        country: &str,
        state: Option<&str>,
        band: (i64, i64),
        cost: i64,
    ) -> ShippingRate {
        ShippingRate {
            id: ShippingRateId(id.to_string()),
            method_id: ShippingMethodId("standard".to_string()),
            country: country.to_string(),
            state: state.map(str::to_string),
            band: WeightBand::new(Decimal::new(band.0, 0), Decimal::new(band.1, 0)),
            cost: Decimal::new(cost, 2),
        }
    }

    fn tax(id: &str, country: &str, state: Option<&str>, rate: i64) -> TaxRate {
        TaxRate {
            id: TaxRateId(id.to_string()),
            country: country.to_string(),
            state: state.map(str::to_string),
            rate: Decimal::new(rate, 4),
            active: true,
        }
    }

    #[tokio::test]
    async fn lists_active_methods_in_sort_order() {
        let repo = setup().await;
        repo.upsert_shipping_method(method("overnight", 3, true)).await.expect("overnight");
        repo.upsert_shipping_method(method("express", 2, true)).await.expect("express");
        repo.upsert_shipping_method(method("freight", 0, false)).await.expect("freight");

        let ids = repo
            .list_active_shipping_methods()
            .await
            .expect("list")
            .into_iter()
            .map(|method| method.id.0)
            .collect::<Vec<_>>();

        assert_eq!(ids, vec!["standard", "express", "overnight"]);
    }

    #[tokio::test]
    async fn find_shipping_method_round_trips_decimal_cost() {
        let repo = setup().await;

        let found = repo
            .find_shipping_method(&ShippingMethodId("standard".to_string()))
            .await
            .expect("find")
            .expect("standard exists");

        assert_eq!(found.default_cost, Decimal::new(999, 2));
        assert_eq!(found.estimated_days, "5-7 business days");
    }

    #[tokio::test]
    async fn state_rows_sort_ahead_of_country_rows() {
        let repo = setup().await;
        repo.upsert_shipping_rate(rate("us-1", "US", None, (0, 5), 895)).await.expect("us");
        repo.upsert_shipping_rate(rate("us-2", "US", None, (6, 10), 1295)).await.expect("us 2");
        repo.upsert_shipping_rate(rate("us-ca-1", "us", Some("ca"), (0, 5), 1495))
            .await
            .expect("us-ca");
        let standard = ShippingMethodId("standard".to_string());

        let california =
            repo.find_shipping_rates(&standard, "US", Some("CA")).await.expect("california");
        let ids = california.iter().map(|rate| rate.id.0.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["us-ca-1", "us-1", "us-2"]);

        let new_york = repo.find_shipping_rates(&standard, "US", Some("NY")).await.expect("ny");
        assert_eq!(new_york.len(), 2);
        assert!(new_york.iter().all(|rate| rate.state.is_none()));
    }

    #[tokio::test]
    async fn catch_all_rows_are_fetched_with_empty_country() {
        let repo = setup().await;
        repo.upsert_shipping_rate(rate("row-1", "", None, (0, 5), 2495)).await.expect("row");

        let rows = repo
            .find_shipping_rates(&ShippingMethodId("standard".to_string()), "", None)
            .await
            .expect("catch-all");

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cost, Decimal::new(2495, 2));
    }

    #[tokio::test]
    async fn overlapping_band_upsert_is_rejected() {
        let repo = setup().await;
        repo.upsert_shipping_rate(rate("us-1", "US", None, (0, 5), 895)).await.expect("us");

        let error = repo
            .upsert_shipping_rate(rate("us-dup", "US", None, (3, 8), 995))
            .await
            .expect_err("overlap must be rejected");

        assert!(matches!(
            error,
            RepositoryError::Rejected(DomainError::OverlappingWeightBands { .. })
        ));
    }

    #[tokio::test]
    async fn upsert_rate_is_idempotent() {
        let repo = setup().await;
        repo.upsert_shipping_rate(rate("us-1", "US", None, (0, 5), 895)).await.expect("first");
        repo.upsert_shipping_rate(rate("us-1", "US", None, (0, 5), 995)).await.expect("second");

        let rows = repo
            .find_shipping_rates(&ShippingMethodId("standard".to_string()), "US", None)
            .await
            .expect("rows");

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cost, Decimal::new(995, 2));
    }

    #[tokio::test]
    async fn tax_lookup_falls_back_to_country_then_international() {
        let repo = setup().await;
        repo.upsert_tax_rate(tax("us-ca", "US", Some("CA"), 725)).await.expect("us-ca");
        repo.upsert_tax_rate(tax("gb", "GB", None, 2000)).await.expect("gb");
        repo.upsert_tax_rate(tax("intl", "", None, 1000)).await.expect("intl");

        let california = repo.find_tax_rate("us", Some("ca")).await.expect("ca");
        assert_eq!(california.map(|rate| rate.rate), Some(Decimal::new(725, 4)));

        let britain = repo.find_tax_rate("GB", Some("LDN")).await.expect("gb");
        assert_eq!(britain.map(|rate| rate.id.0), Some("gb".to_string()));

        let japan = repo.find_tax_rate("JP", None).await.expect("jp");
        assert_eq!(japan.map(|rate| rate.id.0), Some("intl".to_string()));
    }

    #[tokio::test]
    async fn inactive_or_missing_tax_rates_resolve_to_none() {
        let repo = setup().await;
        let mut retired = tax("us-ny", "US", Some("NY"), 450);
        retired.active = false;
        repo.upsert_tax_rate(retired).await.expect("retired");

        assert!(repo.find_tax_rate("US", Some("NY")).await.expect("ny").is_none());
        assert!(repo.find_tax_rate("FR", None).await.expect("fr").is_none());
    }

    #[tokio::test]
    async fn out_of_range_tax_rate_is_rejected() {
        let repo = setup().await;

        let error = repo
            .upsert_tax_rate(tax("bad", "US", None, 15_000))
            .await
            .expect_err("rate above one must be rejected");

        assert!(matches!(error, RepositoryError::Rejected(DomainError::InvariantViolation(_))));
    }

    #[tokio::test]
    async fn second_active_tax_rate_for_a_region_is_rejected() {
        let repo = setup().await;
        repo.upsert_tax_rate(tax("us-ca", "US", Some("CA"), 725)).await.expect("us-ca");

        let error = repo
            .upsert_tax_rate(tax("us-ca-2", "us", Some("ca"), 800))
            .await
            .expect_err("duplicate region must be rejected");
        assert!(matches!(
            error,
            RepositoryError::Rejected(DomainError::DuplicateTaxScope { ref first, ref second })
                if first == "us-ca" && second == "us-ca-2"
        ));

        repo.upsert_tax_rate(tax("us-ca", "US", Some("CA"), 750)).await.expect("same id updates");
        let mut retired = tax("us-ca-old", "US", Some("CA"), 600);
        retired.active = false;
        repo.upsert_tax_rate(retired).await.expect("inactive rows never conflict");

        let california = repo.find_tax_rate("US", Some("CA")).await.expect("ca").expect("rate");
        assert_eq!(california.id.0, "us-ca");
        assert_eq!(california.rate, Decimal::new(750, 4));
    }
}
