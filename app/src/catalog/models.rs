use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use infra::ids::{Entity, Id};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductCategory {
    pub id: Id<ProductCategory>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Id<Product>,
    pub name: String,
    pub category: Option<Id<ProductCategory>>,
    pub price: Decimal,
    pub available: bool,
    pub description: String,
    pub image: String,
    pub special_status: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: Id<Restaurant>,
    pub name: String,
    pub address: String,
    pub contact_phone: String,
}

/// Whether `restaurant` currently offers `product`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestaurantMenuItem {
    pub id: Id<RestaurantMenuItem>,
    pub restaurant: Id<Restaurant>,
    pub product: Id<Product>,
    pub availability: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryRef {
    pub id: Id<ProductCategory>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestaurantRef {
    pub id: Id<Restaurant>,
    pub name: String,
}

/// A product as shown to customers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductView {
    pub id: Id<Product>,
    pub name: String,
    pub price: Decimal,
    pub special_status: bool,
    pub description: String,
    pub category: Option<CategoryRef>,
    pub image: String,
    pub restaurant: Option<RestaurantRef>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogCounts {
    pub total_products: i64,
    pub available_products: i64,
    pub total_restaurants: i64,
    pub restaurants_with_menu: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readiness {
    pub ready: bool,
    pub counts: CatalogCounts,
    pub errors: Vec<String>,
}

impl Readiness {
    pub fn from_counts(counts: CatalogCounts) -> Self {
        let checks = [
            (counts.total_products, "No products in the catalog"),
            (counts.available_products, "No products are available"),
            (counts.total_restaurants, "No restaurants registered"),
            (
                counts.restaurants_with_menu,
                "No restaurant has an available menu item",
            ),
        ];
        let errors = checks
            .iter()
            .filter(|(count, _)| *count == 0)
            .map(|(_, msg)| msg.to_string())
            .collect::<Vec<_>>();

        Readiness {
            ready: errors.is_empty(),
            counts,
            errors,
        }
    }
}

impl Entity for ProductCategory {
    const TABLE: &'static str = "product_categories";
}

impl Entity for Product {
    const TABLE: &'static str = "products";
}

impl Entity for Restaurant {
    const TABLE: &'static str = "restaurants";
}

impl Entity for RestaurantMenuItem {
    const TABLE: &'static str = "restaurant_menu_items";
}
