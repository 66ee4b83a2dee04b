use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::models::{from_json, is_blank, ParseError, Price};

/// Where and when an order can be picked up.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PickupDetails {
    /// Store address.
    pub address: String,
    /// Start of the pickup window.
    pub from: Option<DateTime<Utc>>,
    /// End of the pickup window.
    pub to: Option<DateTime<Utc>>,
}

impl fmt::Display for PickupDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.from, self.to) {
            (Some(from), Some(to)) => write!(
                f,
                "{} between [{}, {}]",
                self.address,
                from.to_rfc3339(),
                to.to_rfc3339()
            ),
            _ => f.write_str(&self.address),
        }
    }
}

/// An open order waiting for pickup.
///
/// Two orders are equal when they have the same identifier.
#[derive(Clone, Debug, Default)]
pub struct Order {
    /// Order identifier.
    pub id: String,
    /// Store identifier.
    pub store_id: String,
    /// Display name of the store.
    pub store_name: String,
    /// Order state, such as `ACTIVE`.
    pub state: String,
    /// Total price.
    pub price: Price,
    /// Number of bags.
    pub quantity: u32,
    /// Pickup place and window.
    pub pickup: PickupDetails,
}

#[derive(Deserialize)]
struct ListOrdersResponse {
    #[serde(default)]
    orders: Vec<RawOrder>,
}

#[derive(Deserialize)]
struct RawOrder {
    order_id: String,
    #[serde(default)]
    store_id: String,
    #[serde(default)]
    store_name: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    price_including_taxes: Price,
    #[serde(default)]
    quantity: u32,
    #[serde(default)]
    pickup_location: Option<PickupLocation>,
    #[serde(default)]
    pickup_interval: Option<PickupInterval>,
}

#[derive(Deserialize)]
struct PickupLocation {
    #[serde(default)]
    address: Address,
}

#[derive(Default, Deserialize)]
struct Address {
    #[serde(default)]
    address_line: String,
}

#[derive(Deserialize)]
struct PickupInterval {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl Order {
    /// Parses the body of an active orders listing.
    ///
    /// An empty body is an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Json`] if the body does not match the schema,
    /// including pickup times that are not RFC 3339.
    pub fn parse_list(body: &[u8]) -> Result<Vec<Self>, ParseError> {
        if is_blank(body) {
            return Ok(Vec::new());
        }
        let response: ListOrdersResponse = from_json("order list", body)?;
        Ok(response.orders.into_iter().map(Self::from).collect())
    }
}

impl From<RawOrder> for Order {
    fn from(raw: RawOrder) -> Self {
        let (from, to) = raw
            .pickup_interval
            .map_or((None, None), |interval| (interval.start, interval.end));
        Self {
            id: raw.order_id,
            store_id: raw.store_id,
            store_name: raw.store_name,
            state: raw.state,
            price: raw.price_including_taxes,
            quantity: raw.quantity,
            pickup: PickupDetails {
                address: raw
                    .pickup_location
                    .map(|location| location.address.address_line)
                    .unwrap_or_default(),
                from,
                to,
            },
        }
    }
}

impl PartialEq for Order {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Order {}

impl Hash for Order {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Order # {}, Store # {}, with {} bags to pick at {}",
            self.id, self.store_id, self.quantity, self.pickup
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const LIST: &str = r#"{
        "orders": [
            {
                "order_id": "gkmfvwixjf0",
                "state": "ACTIVE",
                "store_id": "32949",
                "store_name": "My Store name",
                "quantity": 1,
                "price_including_taxes": {"code": "EUR", "minor_units": 399, "decimals": 2},
                "pickup_interval": {"start": "2023-05-23T13:00:00Z", "end": "2023-05-23T15:00:00Z"},
                "pickup_location": {
                    "address": {"address_line": "Piazza del Colosseo, 1, 00184 Roma RM, Italia"},
                    "location": {"latitude": 41.89, "longitude": 12.49}
                }
            }
        ]
    }"#;

    #[test]
    fn test_parse_list() {
        let orders = Order::parse_list(LIST.as_bytes()).unwrap();
        assert_eq!(orders.len(), 1);

        let order = &orders[0];
        assert_eq!(order.id, "gkmfvwixjf0");
        assert_eq!(order.store_id, "32949");
        assert_eq!(order.store_name, "My Store name");
        assert_eq!(order.state, "ACTIVE");
        assert_eq!(order.quantity, 1);
        assert_eq!(order.price, Price::new(399, 2, "EUR"));
        assert_eq!(
            order.pickup,
            PickupDetails {
                address: "Piazza del Colosseo, 1, 00184 Roma RM, Italia".to_string(),
                from: Some(Utc.with_ymd_and_hms(2023, 5, 23, 13, 0, 0).unwrap()),
                to: Some(Utc.with_ymd_and_hms(2023, 5, 23, 15, 0, 0).unwrap()),
            }
        );
    }

    #[test]
    fn test_empty_body_is_empty_list() {
        assert!(Order::parse_list(b"").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_pickup_time_is_an_error() {
        let body = r#"{"orders": [{"order_id": "1", "pickup_interval": {"start": "tomorrow"}}]}"#;
        assert!(Order::parse_list(body.as_bytes()).is_err());
    }

    #[test]
    fn test_equality_uses_id_only() {
        let a = Order {
            id: "1".to_string(),
            quantity: 1,
            ..Order::default()
        };
        let b = Order {
            id: "1".to_string(),
            quantity: 3,
            ..Order::default()
        };
        assert_eq!(a, b);
    }
}
