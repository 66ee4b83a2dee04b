//! Records returned by the remote API.
//!
//! Every parser decodes into a lenient schema: optional fields fall back to
//! documented defaults instead of failing, and an empty body yields an empty
//! list (or a default record).
//!
//! # Overview
//!
//! - [`Store`]: A store offering bags, from the item search
//! - [`Order`]: An open order waiting for pickup
//! - [`PaymentMethod`]: A registered means of payment
//! - [`ReservedOrder`]: The result of reserving bags
//! - [`OrderPayment`]: The result of paying an order
//! - [`Price`]: An amount in minor units
//!
//! Stores and orders compare by identifier only; use
//! [`collection_changed`] to decide whether a new listing is worth a
//! notification.

mod errors;
mod order;
mod payment;
mod price;
mod reserved_order;
mod store;

pub use errors::ParseError;
pub use order::{Order, PickupDetails};
pub use payment::{OrderPayment, PaymentMethod, PaymentProvider, PaymentType};
pub use price::Price;
pub use reserved_order::ReservedOrder;
pub use store::Store;

use std::collections::HashSet;
use std::hash::Hash;

use serde::de::DeserializeOwned;

/// Returns `true` when `next` holds a different set of records than `prev`.
///
/// Order and duplicates are ignored; records compare by their own equality,
/// which is the identifier for stores and orders.
///
/// # Example
///
/// ```rust
/// use tgtg_ant::models::collection_changed;
///
/// assert!(!collection_changed(&["a", "b"], &["b", "a"]));
/// assert!(collection_changed(&["a", "b"], &["a", "c"]));
/// ```
#[must_use]
pub fn collection_changed<T: Eq + Hash>(prev: &[T], next: &[T]) -> bool {
    let prev: HashSet<&T> = prev.iter().collect();
    let next: HashSet<&T> = next.iter().collect();
    prev != next
}

/// Decodes a JSON body, logging it in full when it does not match.
pub(crate) fn from_json<T: DeserializeOwned>(
    entity: &'static str,
    body: &[u8],
) -> Result<T, ParseError> {
    serde_json::from_slice(body).map_err(|source| {
        tracing::debug!("full {} response: {}", entity, String::from_utf8_lossy(body));
        ParseError::Json { entity, source }
    })
}

/// Returns `true` for a body that carries no record at all.
pub(crate) fn is_blank(body: &[u8]) -> bool {
    body.iter().all(u8::is_ascii_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_changed_ignores_order_and_duplicates() {
        assert!(!collection_changed(&[1, 2, 2], &[2, 1]));
        assert!(collection_changed(&[1, 2], &[1]));
        assert!(collection_changed::<i32>(&[], &[1]));
        assert!(!collection_changed::<i32>(&[], &[]));
    }

    #[test]
    fn test_from_json_reports_entity() {
        let result = from_json::<Vec<u32>>("numbers", b"{}");
        assert!(matches!(result, Err(ParseError::Json { entity: "numbers", .. })));
    }
}
