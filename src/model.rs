//! Dispatch data model: stores and their order lines.

use serde::{Deserialize, Serialize};

/// One line item within a store's order.
///
/// Every field except `quantity` is kept verbatim (trimmed) from the source
/// cell; no units or formats are imposed on dimensions or materials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Artwork identifier / image reference.
    pub id: String,
    pub fixture: String,
    pub width: String,
    pub height: String,
    pub bleed_width: String,
    pub bleed_height: String,
    pub material: String,
    /// Process plus free-form notes.
    pub process: String,
    pub quantity: u32,
    pub gender: String,
    /// Placement descriptor within the store.
    pub point: String,
}

impl OrderItem {
    /// True when the item carries an identifier, a fixture or a point.
    pub fn has_content(&self) -> bool {
        !self.id.is_empty() || !self.fixture.is_empty() || !self.point.is_empty()
    }
}

/// One store's complete dispatch document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreOrder {
    pub pos_code: String,
    pub pos_name: String,
    pub fixture_type: String,
    pub level: String,
    /// Items in source row order.
    pub items: Vec<OrderItem>,
}

impl StoreOrder {
    pub fn new(
        pos_code: impl Into<String>,
        pos_name: impl Into<String>,
        fixture_type: impl Into<String>,
        level: impl Into<String>,
    ) -> Self {
        Self {
            pos_code: pos_code.into(),
            pos_name: pos_name.into(),
            fixture_type: fixture_type.into(),
            level: level.into(),
            items: Vec::new(),
        }
    }

    /// Sum of all item quantities, shown in the sheet's footer row.
    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_quantity_sums_items() {
        let mut store = StoreOrder::new("P001", "Store A", "Wall", "A");
        store.items.push(OrderItem {
            quantity: 5,
            ..Default::default()
        });
        store.items.push(OrderItem {
            quantity: u32::MAX,
            ..Default::default()
        });
        assert_eq!(store.total_quantity(), 5 + u64::from(u32::MAX));
    }

    #[test]
    fn content_requires_id_fixture_or_point() {
        let mut item = OrderItem {
            material: "Vinyl".into(),
            quantity: 3,
            ..Default::default()
        };
        assert!(!item.has_content());
        item.point = "Pt1".into();
        assert!(item.has_content());
    }
}
