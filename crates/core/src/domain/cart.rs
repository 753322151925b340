use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::ProductId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
    #[serde(default)]
    pub unit_price: Decimal,
    /// Per-unit weight supplied by the caller; wins over the catalog value.
    #[serde(default)]
    pub weight: Option<Decimal>,
}

/// Sums `unit_price * quantity`. Amounts beyond the decimal range are rejected.
pub fn cart_subtotal(lines: &[CartLine]) -> Result<Decimal, DomainError> {
    lines.iter().try_fold(Decimal::ZERO, |subtotal, line| {
        line.unit_price
            .checked_mul(Decimal::from(line.quantity))
            .and_then(|amount| subtotal.checked_add(amount))
            .ok_or_else(|| out_of_range("cart subtotal"))
    })
}

/// Sums `unit weight * quantity` over the cart. A line's own weight wins, then
/// the catalog weight, then `default_item_weight`.
pub fn total_weight(
    lines: &[CartLine],
    catalog_weights: &HashMap<ProductId, Decimal>,
    default_item_weight: Decimal,
) -> Result<Decimal, DomainError> {
    lines.iter().try_fold(Decimal::ZERO, |total, line| {
        let unit_weight = line
            .weight
            .or_else(|| catalog_weights.get(&line.product_id).copied())
            .unwrap_or(default_item_weight)
            .max(Decimal::ZERO);
        unit_weight
            .checked_mul(Decimal::from(line.quantity))
            .and_then(|weight| total.checked_add(weight))
            .ok_or_else(|| out_of_range("cart weight"))
    })
}

pub(crate) fn out_of_range(what: &str) -> DomainError {
    DomainError::InvariantViolation(format!("{what} exceeds the supported amount range"))
}
