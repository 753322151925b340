use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShippingMethodId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShippingRateId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingMethod {
    pub id: ShippingMethodId,
    pub name: String,
    pub description: String,
    /// Free-text delivery window shown to the customer, e.g. "5-7 business days".
    pub estimated_days: String,
    pub active: bool,
    /// Charged when no weight band applies to a shipment.
    pub default_cost: Decimal,
    pub sort_order: i32,
}

/// Inclusive weight range `[min_weight, max_weight]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightBand {
    pub min_weight: Decimal,
    pub max_weight: Decimal,
}

impl WeightBand {
    pub fn new(min_weight: Decimal, max_weight: Decimal) -> Self {
        Self { min_weight, max_weight }
    }

    pub fn contains(&self, weight: Decimal) -> bool {
        self.min_weight <= weight && weight <= self.max_weight
    }

    pub fn overlaps(&self, other: &WeightBand) -> bool {
        self.min_weight <= other.max_weight && other.min_weight <= self.max_weight
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingRate {
    pub id: ShippingRateId,
    pub method_id: ShippingMethodId,
    /// Empty string marks the catch-all "rest of world" row.
    pub country: String,
    /// `None` applies to every state of `country`.
    pub state: Option<String>,
    pub band: WeightBand,
    pub cost: Decimal,
}

impl ShippingRate {
    pub fn is_catch_all(&self) -> bool {
        self.country.is_empty()
    }

    pub fn scope_key(&self) -> (&str, &str, Option<&str>) {
        (self.method_id.0.as_str(), self.country.as_str(), self.state.as_deref())
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.band.min_weight < Decimal::ZERO {
            return Err(DomainError::InvariantViolation(format!(
                "shipping rate `{}` has a negative min_weight",
                self.id.0
            )));
        }
        if self.band.min_weight > self.band.max_weight {
            return Err(DomainError::InvariantViolation(format!(
                "shipping rate `{}` has min_weight above max_weight",
                self.id.0
            )));
        }
        if self.cost < Decimal::ZERO {
            return Err(DomainError::InvariantViolation(format!(
                "shipping rate `{}` has a negative cost",
                self.id.0
            )));
        }
        Ok(())
    }
}

/// Checks every row and rejects overlapping bands inside one
/// `(method, country, state)` scope.
pub fn validate_rate_bands(rates: &[ShippingRate]) -> Result<(), DomainError> {
    let mut scopes: BTreeMap<(&str, &str, Option<&str>), Vec<&ShippingRate>> = BTreeMap::new();
    for rate in rates {
        rate.validate()?;
        scopes.entry(rate.scope_key()).or_default().push(rate);
    }

    for rows in scopes.values_mut() {
        rows.sort_by(|left, right| left.band.min_weight.cmp(&right.band.min_weight));
        for pair in rows.windows(2) {
            if pair[0].band.overlaps(&pair[1].band) {
                return Err(DomainError::OverlappingWeightBands {
                    first: pair[0].id.0.clone(),
                    second: pair[1].id.0.clone(),
                });
            }
        }
    }

    Ok(())
}
