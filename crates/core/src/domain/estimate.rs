use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::cart::out_of_range;
use crate::domain::shipping::ShippingMethodId;
use crate::errors::DomainError;

/// Currency precision used for derived amounts.
pub const CURRENCY_DP: u32 = 2;

/// Which lookup produced the shipping cost.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShippingTier {
    StateSpecific,
    CountryWide,
    CatchAll,
    MethodDefault,
}

impl ShippingTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StateSpecific => "state_specific",
            Self::CountryWide => "country_wide",
            Self::CatchAll => "catch_all",
            Self::MethodDefault => "method_default",
        }
    }
}

/// Customer-facing quote for one shipping method. Computed per request, never stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingEstimate {
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub cost: Decimal,
    pub is_free_shipping: bool,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub base_cost: Decimal,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub distance_fee: Decimal,
    pub method: String,
    pub method_id: ShippingMethodId,
    pub estimated_days: String,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub tax_rate: Decimal,
    pub tier: ShippingTier,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub weight: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteTotals {
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub subtotal: Decimal,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub shipping_cost: Decimal,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub tax_amount: Decimal,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub total: Decimal,
}

/// Estimate plus the totals the cart displays.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingQuote {
    pub estimate: ShippingEstimate,
    pub totals: QuoteTotals,
}

impl QuoteTotals {
    /// `tax_amount = subtotal * tax_rate` rounded to cents; `total` is the exact sum.
    pub fn from_estimate(
        subtotal: Decimal,
        estimate: &ShippingEstimate,
    ) -> Result<Self, DomainError> {
        let subtotal = subtotal.max(Decimal::ZERO);
        let tax_amount = subtotal
            .checked_mul(estimate.tax_rate.max(Decimal::ZERO))
            .map(round_currency)
            .ok_or_else(|| out_of_range("tax amount"))?;
        let total = subtotal
            .checked_add(estimate.cost)
            .and_then(|sum| sum.checked_add(tax_amount))
            .ok_or_else(|| out_of_range("quote total"))?;

        Ok(Self { subtotal, shipping_cost: estimate.cost, tax_amount, total })
    }
}

pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(CURRENCY_DP, RoundingStrategy::MidpointAwayFromZero)
}
