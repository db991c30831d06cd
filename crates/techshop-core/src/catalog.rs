//! # Catalog Helpers
//!
//! Search and grouping used by the catalog screen. Both functions work on
//! product lists already loaded from the database.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{Category, Product};
use crate::UNCATEGORIZED;

/// Products listed under one category heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CategoryGroup {
    /// `None` for the "Uncategorized" group.
    pub category_id: Option<String>,
    pub name: String,
    pub products: Vec<Product>,
}

/// Case-insensitive substring match on the product name.
///
/// An empty or whitespace-only query returns every product.
///
/// ```rust
/// use techshop_core::catalog::filter_by_name;
/// # use techshop_core::Product;
/// # fn p(name: &str) -> Product {
/// #     Product { id: name.into(), name: name.into(), description: None, brand: "x".into(),
/// #         price_cents: 0, unit_in_stock: 0, category_id: None, image_url: None,
/// #         is_active: true, created_at: chrono::Utc::now(), updated_at: chrono::Utc::now() }
/// # }
/// let products = vec![p("MacBook Air"), p("iPhone 15"), p("iMac")];
/// let found = filter_by_name(&products, "MAC");
/// assert_eq!(found.len(), 2);
/// ```
pub fn filter_by_name(products: &[Product], query: &str) -> Vec<Product> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return products.to_vec();
    }

    products
        .iter()
        .filter(|p| p.name.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

/// Groups products by category, in the order categories are first seen in
/// `products`. Products whose category is missing or unknown go under
/// "Uncategorized".
pub fn group_by_category(products: &[Product], categories: &[Category]) -> Vec<CategoryGroup> {
    let names: HashMap<&str, &str> = categories
        .iter()
        .map(|c| (c.id.as_str(), c.name.as_str()))
        .collect();

    let mut groups: Vec<CategoryGroup> = Vec::new();
    let mut index: HashMap<Option<String>, usize> = HashMap::new();

    for product in products {
        let known = product
            .category_id
            .as_deref()
            .and_then(|id| names.get(id).map(|name| (id, *name)));

        let key = known.map(|(id, _)| id.to_string());
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push(CategoryGroup {
                category_id: key,
                name: known.map_or(UNCATEGORIZED, |(_, name)| name).to_string(),
                products: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].products.push(product.clone());
    }

    groups
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(id: &str, name: &str, category: Option<&str>) -> Product {
        Product {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            brand: "Acme".to_string(),
            price_cents: 1000,
            unit_in_stock: 1,
            category_id: category.map(str::to_string),
            image_url: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn category(id: &str, name: &str) -> Category {
        Category {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_filter_by_name() {
        let products = vec![
            product("1", "Galaxy S24", None),
            product("2", "Pixel 8", None),
            product("3", "Galaxy Tab", None),
        ];

        let ids: Vec<_> = filter_by_name(&products, "  gAlAxY ")
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["1", "3"]);

        assert_eq!(filter_by_name(&products, "").len(), 3);
        assert!(filter_by_name(&products, "nokia").is_empty());
    }

    #[test]
    fn test_group_by_category() {
        let categories = vec![category("phones", "Phones"), category("laptops", "Laptops")];
        let products = vec![
            product("1", "MacBook", Some("laptops")),
            product("2", "Pixel", Some("phones")),
            product("3", "Cable", Some("deleted-category")),
            product("4", "ThinkPad", Some("laptops")),
            product("5", "Sticker", None),
        ];

        let groups = group_by_category(&products, &categories);
        let summary: Vec<(&str, usize)> = groups
            .iter()
            .map(|g| (g.name.as_str(), g.products.len()))
            .collect();
        assert_eq!(
            summary,
            vec![("Laptops", 2), ("Phones", 1), ("Uncategorized", 2)]
        );
        assert_eq!(groups[2].category_id, None);
    }
}
