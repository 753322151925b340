use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, warn};

use shipquote_core::config::ShippingConfig;
use shipquote_core::domain::cart::{cart_subtotal, total_weight, CartLine};
use shipquote_core::domain::destination::Destination;
use shipquote_core::domain::estimate::ShippingQuote;
use shipquote_core::domain::product::ProductId;
use shipquote_core::domain::shipping::{ShippingMethod, ShippingMethodId, ShippingRate};
use shipquote_core::domain::tax::TaxRate;
use shipquote_core::errors::{ApplicationError, DomainError};
use shipquote_core::rates::{DeterministicEstimateRuntime, EstimateInput, EstimateRuntime};

use crate::repositories::{ProductRepository, RateRepository};

/// One cart estimate request. Missing destination falls back to the configured
/// default address; an explicit `weight` skips per-item weight derivation.
#[derive(Clone, Debug, Default)]
pub struct EstimateRequest {
    pub destination: Option<Destination>,
    pub method_id: Option<ShippingMethodId>,
    pub items: Vec<CartLine>,
    pub subtotal: Option<Decimal>,
    pub weight: Option<Decimal>,
}

#[derive(Debug, Error)]
pub enum EstimateError {
    #[error("unknown shipping method `{0}`")]
    UnknownMethod(String),
    #[error("shipping estimates unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Rejected(#[from] DomainError),
}

impl From<EstimateError> for ApplicationError {
    fn from(value: EstimateError) -> Self {
        match value {
            EstimateError::UnknownMethod(id) => {
                ApplicationError::Domain(DomainError::UnknownShippingMethod(id))
            }
            EstimateError::Unavailable(message) => ApplicationError::EstimateUnavailable(message),
            EstimateError::Rejected(error) => ApplicationError::Domain(error),
        }
    }
}

#[derive(Clone)]
pub struct EstimateService {
    rates: Arc<dyn RateRepository>,
    products: Arc<dyn ProductRepository>,
    runtime: Arc<dyn EstimateRuntime>,
    shipping: ShippingConfig,
}

impl EstimateService {
    pub fn new(
        rates: Arc<dyn RateRepository>,
        products: Arc<dyn ProductRepository>,
        shipping: ShippingConfig,
    ) -> Self {
        Self {
            rates,
            products,
            runtime: Arc::new(DeterministicEstimateRuntime::default()),
            shipping,
        }
    }

    pub fn with_runtime(mut self, runtime: Arc<dyn EstimateRuntime>) -> Self {
        self.runtime = runtime;
        self
    }

    pub async fn list_methods(&self) -> Result<Vec<ShippingMethod>, EstimateError> {
        self.rates
            .list_active_shipping_methods()
            .await
            .map_err(|error| EstimateError::Unavailable(error.to_string()))
    }

    /// Quote for the requested method, or the first active method when none
    /// is named.
    pub async fn estimate(
        &self,
        request: &EstimateRequest,
        correlation_id: &str,
    ) -> Result<ShippingQuote, EstimateError> {
        let methods = self.active_methods(correlation_id).await?;
        let method = select_method(&methods, request.method_id.as_ref())?;
        let destination = self.resolve_destination(request);

        let (candidates, tax_candidates, weight) = tokio::join!(
            self.shipping_candidates(method, &destination, correlation_id),
            self.tax_candidates(&destination, correlation_id),
            self.cart_weight(request, correlation_id),
        );

        let quote = self.quote(
            method,
            &destination,
            request,
            weight?,
            &candidates,
            &tax_candidates,
        )?;
        log_quote(&quote, &destination, correlation_id);
        Ok(quote)
    }

    /// One quote per active method, in display order.
    pub async fn estimate_all(
        &self,
        request: &EstimateRequest,
        correlation_id: &str,
    ) -> Result<Vec<ShippingQuote>, EstimateError> {
        let methods = self.active_methods(correlation_id).await?;
        let destination = self.resolve_destination(request);

        let (tax_candidates, weight) = tokio::join!(
            self.tax_candidates(&destination, correlation_id),
            self.cart_weight(request, correlation_id),
        );
        let weight = weight?;

        let mut quotes = Vec::with_capacity(methods.len());
        for method in &methods {
            let candidates = self.shipping_candidates(method, &destination, correlation_id).await;
            let quote = self.quote(
                method,
                &destination,
                request,
                weight,
                &candidates,
                &tax_candidates,
            )?;
            log_quote(&quote, &destination, correlation_id);
            quotes.push(quote);
        }
        Ok(quotes)
    }

    fn quote(
        &self,
        method: &ShippingMethod,
        destination: &Destination,
        request: &EstimateRequest,
        weight: Decimal,
        candidates: &[ShippingRate],
        tax_candidates: &[TaxRate],
    ) -> Result<ShippingQuote, EstimateError> {
        let subtotal = match request.subtotal {
            Some(subtotal) => subtotal,
            None => cart_subtotal(&request.items)?,
        };

        let quote = self.runtime.estimate(EstimateInput {
            method,
            destination,
            weight,
            subtotal: subtotal.max(Decimal::ZERO),
            free_shipping_threshold: self.shipping.free_shipping_threshold,
            shipping_candidates: candidates,
            tax_candidates,
        })?;
        Ok(quote)
    }

    async fn active_methods(
        &self,
        correlation_id: &str,
    ) -> Result<Vec<ShippingMethod>, EstimateError> {
        let methods = self.list_methods().await.map_err(|error| {
            warn!(
                event_name = "shipping.methods.unavailable",
                correlation_id = %correlation_id,
                error = %error,
                "shipping methods could not be loaded"
            );
            error
        })?;

        if methods.is_empty() {
            warn!(
                event_name = "shipping.methods.empty",
                correlation_id = %correlation_id,
                "no active shipping methods are configured"
            );
            return Err(EstimateError::Unavailable(
                "no active shipping methods are configured".to_string(),
            ));
        }
        Ok(methods)
    }

    fn resolve_destination(&self, request: &EstimateRequest) -> Destination {
        request
            .destination
            .as_ref()
            .filter(|destination| destination.has_country())
            .map(Destination::normalized)
            .unwrap_or_else(|| self.shipping.default_destination())
    }

    /// Country rows plus catch-all rows for `method`. A failed lookup yields no
    /// rows, so the method's default cost applies.
    async fn shipping_candidates(
        &self,
        method: &ShippingMethod,
        destination: &Destination,
        correlation_id: &str,
    ) -> Vec<ShippingRate> {
        let (country_rows, catch_all_rows) = tokio::join!(
            self.rates.find_shipping_rates(
                &method.id,
                &destination.country,
                destination.state.as_deref()
            ),
            self.rates.find_shipping_rates(&method.id, "", None),
        );

        match (country_rows, catch_all_rows) {
            (Ok(mut rows), Ok(catch_all)) => {
                rows.extend(catch_all);
                rows
            }
            (Err(error), _) | (_, Err(error)) => {
                warn!(
                    event_name = "shipping.rates.degraded",
                    correlation_id = %correlation_id,
                    method_id = %method.id.0,
                    country = %destination.country,
                    error = %error,
                    "shipping rate lookup failed, falling back to method default cost"
                );
                Vec::new()
            }
        }
    }

    async fn tax_candidates(&self, destination: &Destination, correlation_id: &str) -> Vec<TaxRate> {
        match self.rates.find_tax_rate(&destination.country, destination.state.as_deref()).await {
            Ok(rate) => rate.into_iter().collect(),
            Err(error) => {
                warn!(
                    event_name = "tax.rates.degraded",
                    correlation_id = %correlation_id,
                    country = %destination.country,
                    error = %error,
                    "tax rate lookup failed, applying zero tax"
                );
                Vec::new()
            }
        }
    }

    async fn cart_weight(
        &self,
        request: &EstimateRequest,
        correlation_id: &str,
    ) -> Result<Decimal, EstimateError> {
        if let Some(weight) = request.weight {
            return Ok(weight.max(Decimal::ZERO));
        }

        let ids = request.items.iter().map(|line| line.product_id.clone()).collect::<Vec<_>>();
        let catalog = match self.products.find_weights(&ids).await {
            Ok(weights) => weights,
            Err(error) => {
                warn!(
                    event_name = "catalog.weights.degraded",
                    correlation_id = %correlation_id,
                    error = %error,
                    "product weights unavailable, using default item weight"
                );
                HashMap::<ProductId, Decimal>::new()
            }
        };

        Ok(total_weight(&request.items, &catalog, self.shipping.default_item_weight)?)
    }
}

fn select_method<'a>(
    methods: &'a [ShippingMethod],
    requested: Option<&ShippingMethodId>,
) -> Result<&'a ShippingMethod, EstimateError> {
    match requested {
        Some(id) => methods
            .iter()
            .find(|method| &method.id == id)
            .ok_or_else(|| EstimateError::UnknownMethod(id.0.clone())),
        None => methods
            .first()
            .ok_or_else(|| EstimateError::Unavailable("no active shipping methods".to_string())),
    }
}

fn log_quote(quote: &ShippingQuote, destination: &Destination, correlation_id: &str) {
    info!(
        event_name = "shipping.estimate.computed",
        correlation_id = %correlation_id,
        method_id = %quote.estimate.method_id.0,
        country = %destination.country,
        state = destination.state.as_deref().unwrap_or(""),
        tier = quote.estimate.tier.as_str(),
        cost = %quote.estimate.cost,
        tax_rate = %quote.estimate.tax_rate,
        total = %quote.totals.total,
        "shipping estimate computed"
    );
}
