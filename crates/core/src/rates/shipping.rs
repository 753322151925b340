use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::destination::Destination;
use crate::domain::estimate::ShippingTier;
use crate::domain::shipping::{ShippingMethod, ShippingRate, ShippingRateId};

/// Result of one lookup strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TierLookup<'a> {
    Matched(&'a ShippingRate),
    /// Rows existed for this scope but none covers the weight; stop and use the default cost.
    Exhausted,
    /// No rows for this scope; try the next strategy.
    Missing,
}

pub trait TierStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn lookup<'a>(
        &self,
        rows: &[&'a ShippingRate],
        destination: &Destination,
        weight: Decimal,
    ) -> TierLookup<'a>;
}

/// Rows for the destination's exact `(country, state)`.
#[derive(Clone, Copy, Debug, Default)]
pub struct StateSpecificTier;

/// Rows for the destination country with no state. Also closes gaps between
/// the country's bands before the chain gives up on the country.
#[derive(Clone, Copy, Debug, Default)]
pub struct CountryWideTier;

/// Rows with an empty country. Only reached when the country has no rows at all.
#[derive(Clone, Copy, Debug, Default)]
pub struct CatchAllTier;

impl TierStrategy for StateSpecificTier {
    fn name(&self) -> &'static str {
        "state_specific"
    }

    fn lookup<'a>(
        &self,
        rows: &[&'a ShippingRate],
        destination: &Destination,
        weight: Decimal,
    ) -> TierLookup<'a> {
        let Some(state) = destination.state.as_deref() else {
            return TierLookup::Missing;
        };
        let scoped = rows
            .iter()
            .copied()
            .filter(|rate| in_country(rate, &destination.country))
            .filter(|rate| rate.state.as_deref().is_some_and(|s| s.eq_ignore_ascii_case(state)))
            .collect::<Vec<_>>();

        match containing_band(&scoped, weight) {
            Some(rate) => TierLookup::Matched(rate),
            None => TierLookup::Missing,
        }
    }
}

impl TierStrategy for CountryWideTier {
    fn name(&self) -> &'static str {
        "country_wide"
    }

    fn lookup<'a>(
        &self,
        rows: &[&'a ShippingRate],
        destination: &Destination,
        weight: Decimal,
    ) -> TierLookup<'a> {
        if destination.country.is_empty() {
            return TierLookup::Missing;
        }
        let country_wide = rows
            .iter()
            .copied()
            .filter(|rate| in_country(rate, &destination.country) && rate.state.is_none())
            .collect::<Vec<_>>();
        if let Some(rate) = containing_band(&country_wide, weight) {
            return TierLookup::Matched(rate);
        }

        let applicable = rows
            .iter()
            .copied()
            .filter(|rate| in_country(rate, &destination.country))
            .filter(|rate| match (rate.state.as_deref(), destination.state.as_deref()) {
                (None, _) => true,
                (Some(rate_state), Some(state)) => rate_state.eq_ignore_ascii_case(state),
                (Some(_), None) => false,
            })
            .collect::<Vec<_>>();
        if applicable.is_empty() {
            return TierLookup::Missing;
        }

        match next_band_up(&applicable, weight) {
            Some(rate) => TierLookup::Matched(rate),
            None => TierLookup::Exhausted,
        }
    }
}

impl TierStrategy for CatchAllTier {
    fn name(&self) -> &'static str {
        "catch_all"
    }

    fn lookup<'a>(
        &self,
        rows: &[&'a ShippingRate],
        _destination: &Destination,
        weight: Decimal,
    ) -> TierLookup<'a> {
        let catch_all = rows
            .iter()
            .copied()
            .filter(|rate| rate.is_catch_all() && rate.state.is_none())
            .collect::<Vec<_>>();
        if catch_all.is_empty() {
            return TierLookup::Missing;
        }

        match next_band_up(&catch_all, weight) {
            Some(rate) => TierLookup::Matched(rate),
            None => TierLookup::Exhausted,
        }
    }
}

fn in_country(rate: &ShippingRate, country: &str) -> bool {
    !rate.is_catch_all() && rate.country.eq_ignore_ascii_case(country)
}

/// Band containing `weight`, inclusive on both ends. A shared boundary goes to
/// the band with the lowest `min_weight`; state-specific rows win exact ties.
fn containing_band<'a>(rows: &[&'a ShippingRate], weight: Decimal) -> Option<&'a ShippingRate> {
    rows.iter().copied().filter(|rate| rate.band.contains(weight)).min_by(|left, right| {
        left.band
            .min_weight
            .cmp(&right.band.min_weight)
            .then_with(|| right.state.is_some().cmp(&left.state.is_some()))
            .then_with(|| left.id.cmp(&right.id))
    })
}

/// For a weight that falls between bands (or below the first one), the nearest
/// band above it. `None` once the weight is past every `max_weight`.
fn next_band_up<'a>(rows: &[&'a ShippingRate], weight: Decimal) -> Option<&'a ShippingRate> {
    if let Some(rate) = containing_band(rows, weight) {
        return Some(rate);
    }
    rows.iter().copied().filter(|rate| rate.band.min_weight > weight).min_by(|left, right| {
        left.band
            .min_weight
            .cmp(&right.band.min_weight)
            .then_with(|| right.state.is_some().cmp(&left.state.is_some()))
            .then_with(|| left.id.cmp(&right.id))
    })
}

pub struct ShippingRequest<'a> {
    pub method: &'a ShippingMethod,
    pub destination: &'a Destination,
    pub weight: Decimal,
    pub subtotal: Decimal,
    pub free_shipping_threshold: Option<Decimal>,
    pub candidates: &'a [ShippingRate],
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingResolution {
    pub cost: Decimal,
    pub base_cost: Decimal,
    pub distance_fee: Decimal,
    pub tier: ShippingTier,
    pub rate_id: Option<ShippingRateId>,
    pub is_free_shipping: bool,
}

pub trait ShippingRateResolver: Send + Sync {
    fn resolve(&self, request: &ShippingRequest<'_>) -> ShippingResolution;
}

/// Tries each strategy in order and returns on the first match.
pub struct TieredShippingResolver {
    strategies: Vec<Box<dyn TierStrategy>>,
}

impl TieredShippingResolver {
    pub fn new(strategies: Vec<Box<dyn TierStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|strategy| strategy.name()).collect()
    }

    fn match_tier<'a>(
        &self,
        rows: &[&'a ShippingRate],
        destination: &Destination,
        weight: Decimal,
    ) -> Option<&'a ShippingRate> {
        for strategy in &self.strategies {
            match strategy.lookup(rows, destination, weight) {
                TierLookup::Matched(rate) => return Some(rate),
                TierLookup::Exhausted => return None,
                TierLookup::Missing => continue,
            }
        }
        None
    }
}

impl Default for TieredShippingResolver {
    fn default() -> Self {
        Self::new(vec![
            Box::new(StateSpecificTier),
            Box::new(CountryWideTier),
            Box::new(CatchAllTier),
        ])
    }
}

impl ShippingRateResolver for TieredShippingResolver {
    fn resolve(&self, request: &ShippingRequest<'_>) -> ShippingResolution {
        let destination = request.destination.normalized();
        let weight = request.weight.max(Decimal::ZERO);
        let rows = request
            .candidates
            .iter()
            .filter(|rate| rate.method_id == request.method.id)
            .collect::<Vec<_>>();

        let (base_cost, tier, rate_id) = match self.match_tier(&rows, &destination, weight) {
            Some(rate) => (rate.cost, tier_of(rate), Some(rate.id.clone())),
            None => (request.method.default_cost, ShippingTier::MethodDefault, None),
        };
        let distance_fee = Decimal::ZERO;

        let is_free_shipping = request
            .free_shipping_threshold
            .is_some_and(|threshold| request.subtotal >= threshold);
        let cost = if is_free_shipping { Decimal::ZERO } else { base_cost + distance_fee };

        ShippingResolution { cost, base_cost, distance_fee, tier, rate_id, is_free_shipping }
    }
}

fn tier_of(rate: &ShippingRate) -> ShippingTier {
    if rate.is_catch_all() {
        ShippingTier::CatchAll
    } else if rate.state.is_some() {
        ShippingTier::StateSpecific
    } else {
        ShippingTier::CountryWide
    }
}
