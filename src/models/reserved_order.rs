use std::fmt;

use serde::Deserialize;

use crate::models::{from_json, is_blank, ParseError};

/// State reported when bags were reserved.
pub const RESERVATION_SUCCESS: &str = "SUCCESS";

/// Bags reserved in a store, waiting to be paid.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReservedOrder {
    /// Order identifier.
    pub id: String,
    /// Item identifier of the store.
    pub store_id: String,
    /// Number of bags reserved.
    pub quantity: u32,
}

#[derive(Deserialize)]
struct CreateOrderResponse {
    state: Option<String>,
    order: Option<RawReservedOrder>,
}

#[derive(Deserialize)]
struct RawReservedOrder {
    #[serde(default)]
    id: String,
    #[serde(default)]
    item_id: String,
    #[serde(default)]
    order_line: Option<OrderLine>,
}

#[derive(Deserialize)]
struct OrderLine {
    #[serde(default)]
    quantity: u32,
}

impl ReservedOrder {
    /// Parses the body of an order creation.
    ///
    /// An empty body yields a default record.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::UnexpectedState`] when the state is not
    /// `SUCCESS`, and [`ParseError::Json`] if the body does not match the
    /// schema.
    pub fn parse(body: &[u8]) -> Result<Self, ParseError> {
        if is_blank(body) {
            return Ok(Self::default());
        }
        let response: CreateOrderResponse = from_json("reserved order", body)?;

        let state = response.state.unwrap_or_default();
        if state != RESERVATION_SUCCESS {
            return Err(ParseError::UnexpectedState {
                entity: "reserved order",
                state,
            });
        }

        Ok(response.order.map_or_else(Self::default, |order| Self {
            id: order.id,
            store_id: order.item_id,
            quantity: order.order_line.map_or(0, |line| line.quantity),
        }))
    }
}

impl fmt::Display for ReservedOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Order # {} in store {} with {} bags",
            self.id, self.store_id, self.quantity
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_success() {
        let body = r#"{
            "state": "SUCCESS",
            "order": {
                "id": "o-123",
                "item_id": "523087",
                "order_line": {"quantity": 2, "item_price_including_taxes": {"code": "EUR", "minor_units": 399, "decimals": 2}}
            }
        }"#;
        let order = ReservedOrder::parse(body.as_bytes()).unwrap();
        assert_eq!(
            order,
            ReservedOrder {
                id: "o-123".to_string(),
                store_id: "523087".to_string(),
                quantity: 2,
            }
        );
        assert_eq!(order.to_string(), "Order # o-123 in store 523087 with 2 bags");
    }

    #[test]
    fn test_empty_body_is_default() {
        assert_eq!(ReservedOrder::parse(b"").unwrap(), ReservedOrder::default());
    }

    #[test]
    fn test_failed_state_is_an_error() {
        let result = ReservedOrder::parse(br#"{"state": "SOLD_OUT"}"#);
        assert!(matches!(
            result,
            Err(ParseError::UnexpectedState { state, .. }) if state == "SOLD_OUT"
        ));
    }
}
