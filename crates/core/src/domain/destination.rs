use serde::{Deserialize, Serialize};

/// Where a cart ships to. Only `country` and `state` take part in rate lookups.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    pub country: String,
    pub state: Option<String>,
    pub postal_code: Option<String>,
}

impl Destination {
    pub fn new(country: impl Into<String>, state: Option<&str>) -> Self {
        Self { country: country.into(), state: state.map(str::to_owned), postal_code: None }
    }

    pub fn with_postal_code(mut self, postal_code: impl Into<String>) -> Self {
        self.postal_code = Some(postal_code.into());
        self
    }

    /// Trims and upper-cases the lookup keys; blank states collapse to `None`.
    pub fn normalized(&self) -> Self {
        Self {
            country: normalize_region(&self.country),
            state: self
                .state
                .as_deref()
                .map(normalize_region)
                .filter(|state| !state.is_empty()),
            postal_code: self
                .postal_code
                .as_deref()
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty()),
        }
    }

    pub fn has_country(&self) -> bool {
        !self.country.trim().is_empty()
    }
}

pub fn normalize_region(value: &str) -> String {
    value.trim().to_ascii_uppercase()
}
