use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::destination::normalize_region;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaxRateId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRate {
    pub id: TaxRateId,
    /// Empty string marks the international default.
    pub country: String,
    /// `None` applies country-wide.
    pub state: Option<String>,
    /// Decimal fraction, e.g. `0.0725` for 7.25%.
    pub rate: Decimal,
    pub active: bool,
}

impl TaxRate {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.rate < Decimal::ZERO || self.rate > Decimal::ONE {
            return Err(DomainError::InvariantViolation(format!(
                "tax rate `{}` must be within 0..=1, got {}",
                self.id.0, self.rate
            )));
        }
        Ok(())
    }
}

/// Checks every row and rejects two active rates for one `(country, state)`.
/// Inactive rows never conflict.
pub fn validate_tax_scopes(rates: &[TaxRate]) -> Result<(), DomainError> {
    let mut scopes: BTreeMap<(String, Option<String>), &TaxRate> = BTreeMap::new();
    for rate in rates {
        rate.validate()?;
        if !rate.active {
            continue;
        }
        let state = rate.state.as_deref().map(normalize_region).filter(|s| !s.is_empty());
        if let Some(first) = scopes.insert((normalize_region(&rate.country), state), rate) {
            return Err(DomainError::DuplicateTaxScope {
                first: first.id.0.clone(),
                second: rate.id.0.clone(),
            });
        }
    }
    Ok(())
}
