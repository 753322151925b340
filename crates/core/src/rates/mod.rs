pub mod quote;
pub mod shipping;
pub mod table;
pub mod tax;

use rust_decimal::Decimal;

use crate::domain::destination::Destination;
use crate::domain::estimate::ShippingQuote;
use crate::domain::shipping::{ShippingMethod, ShippingRate};
use crate::domain::tax::TaxRate;
use crate::errors::DomainError;

use self::{
    quote::{DeterministicQuoteCalculator, QuoteCalculator, QuoteInput},
    shipping::{ShippingRateResolver, ShippingRequest, ShippingResolution, TieredShippingResolver},
    tax::{DeterministicTaxResolver, TaxRateResolver, TaxResolution},
};

#[derive(Clone, Debug)]
pub struct EstimateInput<'a> {
    pub method: &'a ShippingMethod,
    pub destination: &'a Destination,
    pub weight: Decimal,
    pub subtotal: Decimal,
    pub free_shipping_threshold: Option<Decimal>,
    pub shipping_candidates: &'a [ShippingRate],
    pub tax_candidates: &'a [TaxRate],
}

pub trait EstimateRuntime: Send + Sync {
    fn resolve_shipping(&self, input: &EstimateInput<'_>) -> ShippingResolution;

    fn resolve_tax(&self, input: &EstimateInput<'_>) -> TaxResolution;

    fn combine(
        &self,
        input: &EstimateInput<'_>,
        shipping: &ShippingResolution,
        tax: &TaxResolution,
    ) -> Result<ShippingQuote, DomainError>;

    fn estimate(&self, input: EstimateInput<'_>) -> Result<ShippingQuote, DomainError> {
        let shipping = self.resolve_shipping(&input);
        let tax = self.resolve_tax(&input);
        self.combine(&input, &shipping, &tax)
    }
}

pub struct DeterministicEstimateRuntime<S, T, Q> {
    shipping_resolver: S,
    tax_resolver: T,
    calculator: Q,
}

impl<S, T, Q> DeterministicEstimateRuntime<S, T, Q> {
    pub fn new(shipping_resolver: S, tax_resolver: T, calculator: Q) -> Self {
        Self { shipping_resolver, tax_resolver, calculator }
    }
}

impl Default
    for DeterministicEstimateRuntime<
        TieredShippingResolver,
        DeterministicTaxResolver,
        DeterministicQuoteCalculator,
    >
{
    fn default() -> Self {
        Self::new(
            TieredShippingResolver::default(),
            DeterministicTaxResolver,
            DeterministicQuoteCalculator,
        )
    }
}

impl<S, T, Q> EstimateRuntime for DeterministicEstimateRuntime<S, T, Q>
where
    S: ShippingRateResolver,
    T: TaxRateResolver,
    Q: QuoteCalculator,
{
    fn resolve_shipping(&self, input: &EstimateInput<'_>) -> ShippingResolution {
        self.shipping_resolver.resolve(&ShippingRequest {
            method: input.method,
            destination: input.destination,
            weight: input.weight,
            subtotal: input.subtotal,
            free_shipping_threshold: input.free_shipping_threshold,
            candidates: input.shipping_candidates,
        })
    }

    fn resolve_tax(&self, input: &EstimateInput<'_>) -> TaxResolution {
        self.tax_resolver.resolve(&input.destination.normalized(), input.tax_candidates)
    }

    fn combine(
        &self,
        input: &EstimateInput<'_>,
        shipping: &ShippingResolution,
        tax: &TaxResolution,
    ) -> Result<ShippingQuote, DomainError> {
        self.calculator.calculate(&QuoteInput {
            method: input.method,
            shipping,
            tax,
            subtotal: input.subtotal,
            weight: input.weight.max(Decimal::ZERO),
        })
    }
}
