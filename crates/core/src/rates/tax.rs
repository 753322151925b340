use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::destination::{normalize_region, Destination};
use crate::domain::tax::{TaxRate, TaxRateId};

/// One step of the tax jurisdiction fallback chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxLookup {
    /// `(country, state)`
    Exact,
    /// `(country, None)`
    CountryWide,
    /// `("", None)`
    International,
}

pub const TAX_LOOKUP_ORDER: [TaxLookup; 3] =
    [TaxLookup::Exact, TaxLookup::CountryWide, TaxLookup::International];

impl TaxLookup {
    fn matches(&self, rate: &TaxRate, country: &str, state: Option<&str>) -> bool {
        match self {
            Self::Exact => match (rate.state.as_deref(), state) {
                (Some(rate_state), Some(state)) => {
                    rate.country.eq_ignore_ascii_case(country)
                        && rate_state.eq_ignore_ascii_case(state)
                }
                _ => false,
            },
            Self::CountryWide => {
                !country.is_empty()
                    && rate.country.eq_ignore_ascii_case(country)
                    && rate.state.is_none()
            }
            Self::International => rate.country.is_empty() && rate.state.is_none(),
        }
    }
}

/// First active rate in `TAX_LOOKUP_ORDER`, or `None`.
pub fn select_tax_rate<'a>(
    rates: &'a [TaxRate],
    country: &str,
    state: Option<&str>,
) -> Option<&'a TaxRate> {
    select_tax_rate_with_lookup(rates, country, state).map(|(rate, _)| rate)
}

fn select_tax_rate_with_lookup<'a>(
    rates: &'a [TaxRate],
    country: &str,
    state: Option<&str>,
) -> Option<(&'a TaxRate, TaxLookup)> {
    let country = normalize_region(country);
    let state = state.map(normalize_region).filter(|state| !state.is_empty());

    TAX_LOOKUP_ORDER.iter().find_map(|lookup| {
        rates
            .iter()
            .filter(|rate| rate.active)
            .find(|rate| lookup.matches(rate, &country, state.as_deref()))
            .map(|rate| (rate, *lookup))
    })
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxResolution {
    pub rate: Decimal,
    pub rate_id: Option<TaxRateId>,
    /// `None` when nothing matched and the zero rate applies.
    pub lookup: Option<TaxLookup>,
}

impl TaxResolution {
    pub fn zero() -> Self {
        Self { rate: Decimal::ZERO, rate_id: None, lookup: None }
    }
}

pub trait TaxRateResolver: Send + Sync {
    fn resolve(&self, destination: &Destination, candidates: &[TaxRate]) -> TaxResolution;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DeterministicTaxResolver;

impl TaxRateResolver for DeterministicTaxResolver {
    fn resolve(&self, destination: &Destination, candidates: &[TaxRate]) -> TaxResolution {
        match select_tax_rate_with_lookup(
            candidates,
            &destination.country,
            destination.state.as_deref(),
        ) {
            Some((rate, lookup)) => TaxResolution {
                rate: rate.rate.max(Decimal::ZERO),
                rate_id: Some(rate.id.clone()),
                lookup: Some(lookup),
            },
            None => TaxResolution::zero(),
        }
    }
}
