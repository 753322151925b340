//! Storefront shipping routes.
//!
//! - `GET  /api/v1/shipping/methods` : active methods in display order
//! - `POST /api/v1/shipping/estimate`: one quote for the requested or first method
//! - `POST /api/v1/shipping/options` : one quote per active method

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shipquote_core::domain::cart::CartLine;
use shipquote_core::domain::destination::Destination;
use shipquote_core::domain::estimate::ShippingQuote;
use shipquote_core::domain::shipping::{ShippingMethod, ShippingMethodId};
use shipquote_core::errors::{ApplicationError, DomainError, InterfaceError};
use shipquote_db::{EstimateError, EstimateRequest, EstimateService};
use tracing::warn;
use uuid::Uuid;

const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Clone)]
pub struct ShippingState {
    service: EstimateService,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateBody {
    pub country: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub method_id: Option<String>,
    #[serde(default)]
    pub items: Vec<CartLine>,
    pub subtotal: Option<Decimal>,
    /// Total cart weight; skips per-item weight derivation when present.
    pub weight: Option<Decimal>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodView {
    pub id: String,
    pub name: String,
    pub description: String,
    pub estimated_days: String,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub default_cost: Decimal,
    pub sort_order: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub error: String,
    pub detail: String,
    pub correlation_id: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

pub fn router(service: EstimateService) -> Router {
    Router::new()
        .route("/api/v1/shipping/methods", get(list_methods))
        .route("/api/v1/shipping/estimate", post(estimate))
        .route("/api/v1/shipping/options", post(options))
        .with_state(ShippingState { service })
}

impl From<ShippingMethod> for MethodView {
    fn from(method: ShippingMethod) -> Self {
        Self {
            id: method.id.0,
            name: method.name,
            description: method.description,
            estimated_days: method.estimated_days,
            default_cost: method.default_cost,
            sort_order: method.sort_order,
        }
    }
}

impl EstimateBody {
    fn into_request(self) -> Result<EstimateRequest, DomainError> {
        let negative = |value: Option<Decimal>| value.is_some_and(|value| value < Decimal::ZERO);
        if negative(self.subtotal) || negative(self.weight) {
            return Err(DomainError::InvariantViolation(
                "subtotal and weight must not be negative".to_string(),
            ));
        }
        if self.items.iter().any(|line| line.unit_price < Decimal::ZERO || negative(line.weight)) {
            return Err(DomainError::InvariantViolation(
                "cart line prices and weights must not be negative".to_string(),
            ));
        }

        let destination = self.country.map(|country| {
            let destination = Destination::new(country, self.state.as_deref());
            match self.postal_code {
                Some(postal_code) => destination.with_postal_code(postal_code),
                None => destination,
            }
        });

        Ok(EstimateRequest {
            destination,
            method_id: self.method_id.map(ShippingMethodId),
            items: self.items,
            subtotal: self.subtotal,
            weight: self.weight,
        })
    }
}

async fn list_methods(
    State(state): State<ShippingState>,
    headers: HeaderMap,
) -> ApiResult<Vec<MethodView>> {
    let correlation_id = correlation_id(&headers);
    let methods = state
        .service
        .list_methods()
        .await
        .map_err(|error| estimate_error(error, &correlation_id))?;

    Ok(Json(methods.into_iter().map(MethodView::from).collect()))
}

async fn estimate(
    State(state): State<ShippingState>,
    headers: HeaderMap,
    Json(body): Json<EstimateBody>,
) -> ApiResult<ShippingQuote> {
    let correlation_id = correlation_id(&headers);
    let request =
        body.into_request().map_err(|error| interface_error(error.into(), &correlation_id))?;

    let quote = state
        .service
        .estimate(&request, &correlation_id)
        .await
        .map_err(|error| estimate_error(error, &correlation_id))?;

    Ok(Json(quote))
}

async fn options(
    State(state): State<ShippingState>,
    headers: HeaderMap,
    Json(body): Json<EstimateBody>,
) -> ApiResult<Vec<ShippingQuote>> {
    let correlation_id = correlation_id(&headers);
    let request =
        body.into_request().map_err(|error| interface_error(error.into(), &correlation_id))?;

    let quotes = state
        .service
        .estimate_all(&request, &correlation_id)
        .await
        .map_err(|error| estimate_error(error, &correlation_id))?;

    Ok(Json(quotes))
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn estimate_error(error: EstimateError, correlation_id: &str) -> (StatusCode, Json<ApiError>) {
    interface_error(ApplicationError::from(error), correlation_id)
}

fn interface_error(error: ApplicationError, correlation_id: &str) -> (StatusCode, Json<ApiError>) {
    let interface = error.into_interface(correlation_id);
    let (status, detail) = match &interface {
        InterfaceError::BadRequest { message, .. } => (StatusCode::BAD_REQUEST, message.clone()),
        InterfaceError::ServiceUnavailable { message, .. } => {
            (StatusCode::SERVICE_UNAVAILABLE, message.clone())
        }
        InterfaceError::Internal { message, .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, message.clone())
        }
    };

    warn!(
        event_name = "shipping.request.rejected",
        correlation_id = %interface.correlation_id(),
        status = status.as_u16(),
        detail = %detail,
        "shipping request failed"
    );

    (
        status,
        Json(ApiError {
            error: interface.user_message().to_string(),
            detail,
            correlation_id: interface.correlation_id().to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use shipquote_core::config::AppConfig;
    use shipquote_db::repositories::{SqlProductRepository, SqlRateRepository};
    use shipquote_db::{connect_with_settings, migrations, EstimateService, ShippingSeedDataset};
    use tower::ServiceExt;

    use super::router;

    async fn app(seed: bool) -> Router {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        if seed {
            ShippingSeedDataset::load(&pool).await.expect("seed");
        }
        router(EstimateService::new(
            Arc::new(SqlRateRepository::new(pool.clone())),
            Arc::new(SqlProductRepository::new(pool)),
            AppConfig::default().shipping,
        ))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-correlation-id", "req-test")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn methods_are_listed_in_display_order() {
        let request =
            Request::builder().uri("/api/v1/shipping/methods").body(Body::empty()).expect("request");

        let (status, body) = send(app(true).await, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["id"], "standard");
        assert_eq!(body[0]["defaultCost"], 9.99);
        assert_eq!(body[0]["estimatedDays"], "5-7 business days");
        assert_eq!(body.as_array().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn cart_estimate_derives_weight_and_subtotal_from_items() {
        let payload = json!({
            "country": "us",
            "state": "ca",
            "postalCode": "94105",
            "items": [
                { "productId": "prod-tee", "quantity": 2, "unitPrice": 20 },
                { "productId": "prod-hoodie", "quantity": 1, "unitPrice": 45 },
                { "productId": "prod-poster", "quantity": 1, "unitPrice": 15 }
            ]
        });

        let (status, body) = send(app(true).await, post("/api/v1/shipping/estimate", payload)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["estimate"]["cost"], 14.95);
        assert_eq!(body["estimate"]["weight"], 3.5);
        assert_eq!(body["estimate"]["method"], "Standard Shipping");
        assert_eq!(body["totals"]["subtotal"], 100.0);
        assert_eq!(body["totals"]["taxAmount"], 7.25);
        assert_eq!(body["totals"]["total"], 122.2);
    }

    #[tokio::test]
    async fn options_quote_every_method() {
        let payload = json!({ "country": "GB", "weight": 2, "subtotal": 80 });

        let (status, body) = send(app(true).await, post("/api/v1/shipping/options", payload)).await;

        assert_eq!(status, StatusCode::OK);
        let costs = body
            .as_array()
            .map(|quotes| quotes.iter().map(|quote| quote["estimate"]["cost"].clone()).collect())
            .unwrap_or_else(Vec::new);
        assert_eq!(costs, vec![json!(24.95), json!(49.95), json!(29.99)]);
    }

    #[tokio::test]
    async fn unknown_method_is_bad_request_with_correlation_id() {
        let payload = json!({ "country": "US", "methodId": "teleport", "weight": 1 });

        let (status, body) = send(app(true).await, post("/api/v1/shipping/estimate", payload)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["correlationId"], "req-test");
        assert!(body["detail"].as_str().unwrap_or_default().contains("teleport"));
    }

    #[tokio::test]
    async fn negative_weight_is_rejected() {
        let payload = json!({ "country": "US", "weight": -1 });

        let (status, body) = send(app(true).await, post("/api/v1/shipping/estimate", payload)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[tokio::test]
    async fn cart_beyond_decimal_range_is_bad_request() {
        let payload = json!({
            "country": "US",
            "state": "CA",
            "items": [{
                "productId": "prod-pallet",
                "quantity": 4_000_000_000u32,
                "unitPrice": "70000000000000000000",
                "weight": "70000000000000000000"
            }]
        });

        for uri in ["/api/v1/shipping/estimate", "/api/v1/shipping/options"] {
            let (status, body) = send(app(true).await, post(uri, payload.clone())).await;

            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["correlationId"], "req-test");
            assert!(body["detail"].as_str().unwrap_or_default().contains("exceeds"));
        }
    }

    #[tokio::test]
    async fn empty_rate_data_is_service_unavailable() {
        let payload = json!({ "country": "US", "weight": 1, "subtotal": 10 });

        let (status, body) =
            send(app(false).await, post("/api/v1/shipping/estimate", payload)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "Shipping and tax estimates are temporarily unavailable.");
        assert_eq!(body["correlationId"], "req-test");
    }
}
