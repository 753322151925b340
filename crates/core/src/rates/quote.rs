use rust_decimal::Decimal;

use crate::domain::estimate::{QuoteTotals, ShippingEstimate, ShippingQuote};
use crate::domain::shipping::ShippingMethod;
use crate::errors::DomainError;
use crate::rates::shipping::ShippingResolution;
use crate::rates::tax::TaxResolution;

pub struct QuoteInput<'a> {
    pub method: &'a ShippingMethod,
    pub shipping: &'a ShippingResolution,
    pub tax: &'a TaxResolution,
    pub subtotal: Decimal,
    pub weight: Decimal,
}

pub trait QuoteCalculator: Send + Sync {
    fn calculate(&self, input: &QuoteInput<'_>) -> Result<ShippingQuote, DomainError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DeterministicQuoteCalculator;

impl QuoteCalculator for DeterministicQuoteCalculator {
    fn calculate(&self, input: &QuoteInput<'_>) -> Result<ShippingQuote, DomainError> {
        let estimate = ShippingEstimate {
            cost: input.shipping.cost,
            is_free_shipping: input.shipping.is_free_shipping,
            base_cost: input.shipping.base_cost,
            distance_fee: input.shipping.distance_fee,
            method: input.method.name.clone(),
            method_id: input.method.id.clone(),
            estimated_days: input.method.estimated_days.clone(),
            tax_rate: input.tax.rate.max(Decimal::ZERO),
            tier: input.shipping.tier,
            weight: input.weight,
        };
        let totals = QuoteTotals::from_estimate(input.subtotal, &estimate)?;

        Ok(ShippingQuote { estimate, totals })
    }
}
