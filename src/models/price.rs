use std::fmt;

use serde::{Deserialize, Serialize};

/// An amount of money in minor units.
///
/// # Example
///
/// ```rust
/// use tgtg_ant::models::Price;
///
/// let price = Price::new(399, 2, "EUR");
/// assert_eq!(price.to_string(), "3.99 EUR");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in minor units (cents for EUR).
    #[serde(rename = "minor_units", default)]
    pub amount: i64,
    /// Number of decimals between minor and major units.
    #[serde(default)]
    pub decimals: u8,
    /// ISO 4217 currency code.
    #[serde(rename = "code", default)]
    pub currency_code: String,
}

impl Price {
    /// Creates a price.
    #[must_use]
    pub fn new(amount: i64, decimals: u8, currency_code: impl Into<String>) -> Self {
        Self {
            amount,
            decimals,
            currency_code: currency_code.into(),
        }
    }

    /// Returns the amount in major units.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn major_units(&self) -> f64 {
        self.amount as f64 / 10f64.powi(i32::from(self.decimals))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.major_units(), self.currency_code)
    }
}
