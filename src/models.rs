use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Items keyed by the identifier the marketplace assigns to each wishlist row.
pub type ItemMap = BTreeMap<String, Item>;

/// One wishlist entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub direct_url: String,
    pub add_to_cart_url: Option<String>,
    pub reviews_url: Option<String>,
    /// Display-formatted, e.g. "$15.96". Empty when the row shows no price.
    pub price: String,
    /// Free text as displayed, e.g. "July 10, 2019".
    pub date_added: String,
    pub image_url: Option<String>,
    /// Display string, e.g. "4.5 out of 5 stars".
    pub rating: Option<String>,
    pub review_count: u32,
    pub requested_count: u32,
    pub owned_count: u32,
    pub is_prime: bool,
}

impl Item {
    pub fn new(id: impl Into<String>, name: impl Into<String>, direct_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            direct_url: direct_url.into(),
            ..Self::default()
        }
    }

    /// Fills fields that are still empty from a later sighting of the same item.
    /// Populated fields are never replaced.
    pub fn merge_from(&mut self, other: Item) {
        fill_string(&mut self.name, other.name);
        fill_string(&mut self.direct_url, other.direct_url);
        fill_string(&mut self.price, other.price);
        fill_string(&mut self.date_added, other.date_added);
        fill_option(&mut self.add_to_cart_url, other.add_to_cart_url);
        fill_option(&mut self.reviews_url, other.reviews_url);
        fill_option(&mut self.image_url, other.image_url);
        fill_option(&mut self.rating, other.rating);
        fill_count(&mut self.review_count, other.review_count);
        fill_count(&mut self.requested_count, other.requested_count);
        fill_count(&mut self.owned_count, other.owned_count);
        self.is_prime |= other.is_prime;
    }
}

fn fill_string(slot: &mut String, value: String) {
    if slot.is_empty() {
        *slot = value;
    }
}

fn fill_option(slot: &mut Option<String>, value: Option<String>) {
    if slot.is_none() {
        *slot = value;
    }
}

fn fill_count(slot: &mut u32, value: u32) {
    if *slot == 0 {
        *slot = value;
    }
}

/// Inserts `item`, merging into the existing entry when its ID was seen before.
pub fn accumulate(items: &mut ItemMap, item: Item) {
    match items.get_mut(&item.id) {
        Some(existing) => existing.merge_from(item),
        None => {
            items.insert(item.id.clone(), item);
        }
    }
}

/// What gets written to disk for one scraping run.
#[derive(Debug, Serialize, Deserialize)]
pub struct WishlistArchive {
    pub wishlist_id: String,
    pub urls: Vec<String>,
    pub timestamp: String,
    pub items: ItemMap,
}

impl WishlistArchive {
    pub fn new(wishlist_id: impl Into<String>, urls: Vec<String>, items: ItemMap) -> Self {
        Self {
            wishlist_id: wishlist_id.into(),
            urls,
            timestamp: chrono::Utc::now().to_rfc3339(),
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn litter() -> Item {
        Item {
            price: "$15.96".to_string(),
            review_count: 930,
            ..Item::new("I2G6UJO0FYWV8J", "Cat Litter", "https://www.amazon.com/dp/B0018CLTKE")
        }
    }

    #[test]
    fn merge_fills_only_empty_fields() {
        let mut item = litter();
        let later = Item {
            price: String::new(),
            date_added: "July 10, 2019".to_string(),
            review_count: 12,
            is_prime: true,
            ..Item::new("I2G6UJO0FYWV8J", "Other Name", "https://example.com/other")
        };

        item.merge_from(later);

        assert_eq!(item.name, "Cat Litter");
        assert_eq!(item.direct_url, "https://www.amazon.com/dp/B0018CLTKE");
        assert_eq!(item.price, "$15.96");
        assert_eq!(item.date_added, "July 10, 2019");
        assert_eq!(item.review_count, 930);
        assert!(item.is_prime);
    }

    #[test]
    fn accumulate_keeps_first_sighting() {
        let mut items = ItemMap::new();
        accumulate(&mut items, litter());
        accumulate(&mut items, Item::new("I2G6UJO0FYWV8J", "", ""));
        accumulate(&mut items, Item::new("OTHER", "Dog Food", "https://www.amazon.com/dp/X"));

        assert_eq!(items.len(), 2);
        assert_eq!(items["I2G6UJO0FYWV8J"], litter());
    }

    #[test]
    fn archive_serializes_items_by_id() {
        let mut items = ItemMap::new();
        accumulate(&mut items, litter());
        let archive = WishlistArchive::new("3I6EQPZ8OB1DT", vec!["https://www.amazon.com/".into()], items);

        let json = serde_json::to_value(&archive).unwrap();
        assert_eq!(json["wishlist_id"], "3I6EQPZ8OB1DT");
        assert_eq!(json["items"]["I2G6UJO0FYWV8J"]["price"], "$15.96");
        assert!(chrono::DateTime::parse_from_rfc3339(&archive.timestamp).is_ok());
    }
}
