use crate::domain::destination::normalize_region;
use crate::domain::shipping::{ShippingMethod, ShippingMethodId, ShippingRate};
use crate::domain::tax::TaxRate;
use crate::rates::tax::select_tax_rate;

/// In-memory snapshot of the shipping and tax reference tables.
#[derive(Clone, Debug, Default)]
pub struct RateTable {
    methods: Vec<ShippingMethod>,
    shipping_rates: Vec<ShippingRate>,
    tax_rates: Vec<TaxRate>,
}

impl RateTable {
    pub fn new(
        methods: Vec<ShippingMethod>,
        shipping_rates: Vec<ShippingRate>,
        tax_rates: Vec<TaxRate>,
    ) -> Self {
        let mut table = Self::default();
        for method in methods {
            table.upsert_shipping_method(method);
        }
        for rate in shipping_rates {
            table.upsert_shipping_rate(rate);
        }
        for rate in tax_rates {
            table.upsert_tax_rate(rate);
        }
        table
    }

    pub fn list_active_shipping_methods(&self) -> Vec<ShippingMethod> {
        let mut methods =
            self.methods.iter().filter(|method| method.active).cloned().collect::<Vec<_>>();
        sort_methods(&mut methods);
        methods
    }

    pub fn find_shipping_method(&self, id: &ShippingMethodId) -> Option<&ShippingMethod> {
        self.methods.iter().find(|method| &method.id == id)
    }

    pub fn find_shipping_rates(
        &self,
        method_id: &ShippingMethodId,
        country: &str,
        state: Option<&str>,
    ) -> Vec<ShippingRate> {
        applicable_shipping_rates(&self.shipping_rates, method_id, country, state)
    }

    pub fn find_tax_rate(&self, country: &str, state: Option<&str>) -> Option<TaxRate> {
        select_tax_rate(&self.tax_rates, country, state).cloned()
    }

    pub fn shipping_rates(&self) -> &[ShippingRate] {
        &self.shipping_rates
    }

    pub fn tax_rates(&self) -> &[TaxRate] {
        &self.tax_rates
    }

    pub fn upsert_shipping_method(&mut self, method: ShippingMethod) {
        match self.methods.iter_mut().find(|existing| existing.id == method.id) {
            Some(existing) => *existing = method,
            None => self.methods.push(method),
        }
    }

    pub fn upsert_shipping_rate(&mut self, mut rate: ShippingRate) {
        rate.country = normalize_region(&rate.country);
        rate.state = rate.state.as_deref().map(normalize_region).filter(|s| !s.is_empty());
        match self.shipping_rates.iter_mut().find(|existing| existing.id == rate.id) {
            Some(existing) => *existing = rate,
            None => self.shipping_rates.push(rate),
        }
    }

    pub fn upsert_tax_rate(&mut self, mut rate: TaxRate) {
        rate.country = normalize_region(&rate.country);
        rate.state = rate.state.as_deref().map(normalize_region).filter(|s| !s.is_empty());
        match self.tax_rates.iter_mut().find(|existing| existing.id == rate.id) {
            Some(existing) => *existing = rate,
            None => self.tax_rates.push(rate),
        }
    }
}

pub fn sort_methods(methods: &mut [ShippingMethod]) {
    methods.sort_by(|left, right| {
        left.sort_order.cmp(&right.sort_order).then_with(|| left.name.cmp(&right.name))
    });
}

/// Rows of `method_id` in `country` that apply to `state`: rows for that exact
/// state plus state-wide rows, state-specific rows first, then by band.
/// Precedence between the two is left to the resolver's strategy chain.
pub fn applicable_shipping_rates<'a>(
    rows: impl IntoIterator<Item = &'a ShippingRate>,
    method_id: &ShippingMethodId,
    country: &str,
    state: Option<&str>,
) -> Vec<ShippingRate> {
    let country = normalize_region(country);
    let state = state.map(normalize_region).filter(|state| !state.is_empty());

    let mut selected = rows
        .into_iter()
        .filter(|rate| &rate.method_id == method_id && rate.country.eq_ignore_ascii_case(&country))
        .filter(|rate| match (&rate.state, &state) {
            (None, _) => true,
            (Some(rate_state), Some(state)) => rate_state.eq_ignore_ascii_case(state),
            (Some(_), None) => false,
        })
        .cloned()
        .collect::<Vec<_>>();

    selected.sort_by(|left, right| {
        right
            .state
            .is_some()
            .cmp(&left.state.is_some())
            .then_with(|| left.band.min_weight.cmp(&right.band.min_weight))
            .then_with(|| left.id.cmp(&right.id))
    });
    selected
}
