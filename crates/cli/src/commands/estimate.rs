use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::Value;
use shipquote_core::domain::destination::Destination;
use shipquote_core::domain::shipping::ShippingMethodId;
use shipquote_db::repositories::{SqlProductRepository, SqlRateRepository};
use shipquote_db::{EstimateError, EstimateRequest, EstimateService};

use crate::commands::{open_pool, prepare, CommandFailure, CommandResult};

#[derive(Debug, Clone, Default)]
pub struct EstimateArgs {
    pub country: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub method: Option<String>,
    pub weight: Option<Decimal>,
    pub subtotal: Option<Decimal>,
    pub all: bool,
}

impl EstimateArgs {
    fn to_request(&self) -> EstimateRequest {
        let destination = self.country.as_deref().map(|country| {
            let destination = Destination::new(country, self.state.as_deref());
            match self.postal_code.as_deref() {
                Some(postal_code) => destination.with_postal_code(postal_code),
                None => destination,
            }
        });

        EstimateRequest {
            destination,
            method_id: self.method.clone().map(ShippingMethodId),
            items: Vec::new(),
            subtotal: Some(self.subtotal.unwrap_or(Decimal::ZERO)),
            weight: Some(self.weight.unwrap_or(Decimal::ZERO)),
        }
    }
}

pub fn run(args: EstimateArgs) -> CommandResult {
    let (config, runtime) = match prepare("estimate") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    let correlation_id = format!("cli-{}", uuid::Uuid::new_v4());
    let request = args.to_request();

    let result = runtime.block_on(async {
        let pool = open_pool(&config).await?;
        let service = EstimateService::new(
            Arc::new(SqlRateRepository::new(pool.clone())),
            Arc::new(SqlProductRepository::new(pool.clone())),
            config.shipping.clone(),
        );

        let outcome = if args.all {
            service
                .estimate_all(&request, &correlation_id)
                .await
                .map(|quotes| (format!("{} shipping options", quotes.len()), serde_json::to_value(quotes)))
        } else {
            service.estimate(&request, &correlation_id).await.map(|quote| {
                let summary = format!(
                    "{} via {}: total {}",
                    quote.estimate.method, quote.estimate.tier.as_str(), quote.totals.total
                );
                (summary, serde_json::to_value(quote))
            })
        };
        pool.close().await;

        let (summary, data) = outcome.map_err(estimate_failure)?;
        let data: Value =
            data.map_err(|error| ("serialization", error.to_string(), 3u8))?;
        Ok::<(String, Value), CommandFailure>((summary, data))
    });

    match result {
        Ok((summary, data)) => CommandResult::success_with_data("estimate", summary, Some(data)),
        Err(failure) => CommandResult::from_failure("estimate", failure),
    }
}

fn estimate_failure(error: EstimateError) -> CommandFailure {
    match error {
        EstimateError::UnknownMethod(_) => ("unknown_method", error.to_string(), 2),
        EstimateError::Unavailable(_) => ("estimate_unavailable", error.to_string(), 4),
        EstimateError::Rejected(_) => ("invalid_request", error.to_string(), 2),
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{estimate_failure, EstimateArgs};
    use shipquote_core::errors::DomainError;
    use shipquote_db::EstimateError;

    #[test]
    fn omitted_country_defers_to_configured_destination() {
        let request = EstimateArgs { state: Some("NY".to_string()), ..EstimateArgs::default() }
            .to_request();

        assert!(request.destination.is_none());
        assert_eq!(request.weight, Some(Decimal::ZERO));
        assert_eq!(request.subtotal, Some(Decimal::ZERO));
    }

    #[test]
    fn destination_carries_postal_code() {
        let request = EstimateArgs {
            country: Some("us".to_string()),
            state: Some("ca".to_string()),
            postal_code: Some("94105".to_string()),
            method: Some("express".to_string()),
            ..EstimateArgs::default()
        }
        .to_request();

        let destination = request.destination.expect("destination");
        assert_eq!(destination.postal_code.as_deref(), Some("94105"));
        assert_eq!(request.method_id.map(|id| id.0).as_deref(), Some("express"));
    }

    #[test]
    fn unknown_method_is_a_usage_failure() {
        let (class, message, code) =
            estimate_failure(EstimateError::UnknownMethod("teleport".to_string()));

        assert_eq!(class, "unknown_method");
        assert!(message.contains("teleport"));
        assert_eq!(code, 2);
    }

    #[test]
    fn rejected_cart_is_a_usage_failure() {
        let (class, message, code) = estimate_failure(EstimateError::Rejected(
            DomainError::InvariantViolation("cart subtotal exceeds the supported amount range".to_string()),
        ));

        assert_eq!(class, "invalid_request");
        assert!(message.contains("cart subtotal"));
        assert_eq!(code, 2);
    }
}
