use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Deserialize;

use crate::models::{from_json, is_blank, ParseError, Price};

/// A store offering surprise bags.
///
/// Two stores are equal when they have the same identifier, whatever their
/// price, rating or stock.
#[derive(Clone, Debug, Default)]
pub struct Store {
    /// Item identifier, used to reserve bags.
    pub id: String,
    /// Display name of the store.
    pub name: String,
    /// Average rating, zero when not rated yet.
    pub rating: f64,
    /// Price of one bag.
    pub price: Price,
    /// Number of bags still available.
    pub available_bags: u32,
}

#[derive(Deserialize)]
struct ListStoresResponse {
    #[serde(default)]
    items: Vec<StoreEntry>,
}

#[derive(Deserialize)]
struct StoreEntry {
    item: ItemInfo,
    #[serde(default)]
    store: StoreInfo,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    items_available: u32,
}

#[derive(Deserialize)]
struct ItemInfo {
    item_id: String,
    #[serde(default)]
    price_including_taxes: Option<Price>,
    #[serde(default)]
    average_overall_rating: Option<Rating>,
}

#[derive(Deserialize)]
struct Rating {
    #[serde(default)]
    average_overall_rating: f64,
}

#[derive(Default, Deserialize)]
struct StoreInfo {
    #[serde(default)]
    store_name: String,
}

impl Store {
    /// Parses the body of an item search.
    ///
    /// An empty body is an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Json`] if the body does not match the schema.
    pub fn parse_list(body: &[u8]) -> Result<Vec<Self>, ParseError> {
        if is_blank(body) {
            return Ok(Vec::new());
        }
        let response: ListStoresResponse = from_json("store list", body)?;
        Ok(response.items.into_iter().map(Self::from).collect())
    }
}

impl From<StoreEntry> for Store {
    fn from(entry: StoreEntry) -> Self {
        let name = if entry.store.store_name.is_empty() {
            entry.display_name.unwrap_or_default()
        } else {
            entry.store.store_name
        };
        Self {
            id: entry.item.item_id,
            name,
            rating: entry
                .item
                .average_overall_rating
                .map_or(0.0, |rating| rating.average_overall_rating),
            price: entry.item.price_including_taxes.unwrap_or_default(),
            available_bags: entry.items_available,
        }
    }
}

impl PartialEq for Store {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Store {}

impl Hash for Store {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, rated {}, price {}, {} bag(s) available",
            self.name, self.rating, self.price, self.available_bags
        )
    }
}
