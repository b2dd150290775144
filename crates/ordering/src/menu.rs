//! Menu catalog: items, categories and promotional pricing.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use snap_menu_core::ProductId;
use thiserror::Error;

/// Errors from loading a menu file.
#[derive(Debug, Error)]
pub enum MenuError {
    #[error("failed to read menu file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("menu file {path} is not a list of items: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A time-boxed promotional price.
///
/// Open-ended on either side when the corresponding date is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promotion {
    pub price: Decimal,
    #[serde(default)]
    pub starts_on: Option<NaiveDate>,
    #[serde(default)]
    pub ends_on: Option<NaiveDate>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Promotion {
    /// Whether the promotion applies on `date` (bounds inclusive).
    #[must_use]
    pub fn is_active(&self, date: NaiveDate) -> bool {
        self.starts_on.is_none_or(|start| date >= start)
            && self.ends_on.is_none_or(|end| date <= end)
    }
}

/// A product listed on the menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub promotion: Option<Promotion>,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "available_by_default")]
    pub available: bool,
}

const fn available_by_default() -> bool {
    true
}

impl MenuItem {
    /// Price charged on `date`: the promotional price while a promotion is
    /// active, the list price otherwise.
    #[must_use]
    pub fn effective_price(&self, date: NaiveDate) -> Decimal {
        self.promotion
            .as_ref()
            .filter(|promo| promo.is_active(date))
            .map_or(self.price, |promo| promo.price)
    }
}

/// Which items a category filter keeps.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Named(String),
}

impl std::str::FromStr for CategoryFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            Ok(Self::All)
        } else {
            Ok(Self::Named(s.to_string()))
        }
    }
}

/// The restaurant's menu in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Menu {
    items: Vec<MenuItem>,
}

impl Menu {
    #[must_use]
    pub const fn new(items: Vec<MenuItem>) -> Self {
        Self { items }
    }

    /// Parse a menu from a JSON array of items.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a list of items.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Load a menu from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, MenuError> {
        let raw = std::fs::read_to_string(path).map_err(|source| MenuError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw).map_err(|source| MenuError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    #[must_use]
    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    #[must_use]
    pub fn find(&self, id: &ProductId) -> Option<&MenuItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    /// Distinct categories in first-seen order.
    #[must_use]
    pub fn categories(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for category in self.items.iter().filter_map(|item| item.category.as_deref()) {
            if !seen.contains(&category) {
                seen.push(category);
            }
        }
        seen
    }

    /// Items kept by `filter`, in menu order.
    pub fn filter<'a>(&'a self, filter: &'a CategoryFilter) -> impl Iterator<Item = &'a MenuItem> {
        self.items.iter().filter(move |item| match filter {
            CategoryFilter::All => true,
            CategoryFilter::Named(name) => item.category.as_deref() == Some(name.as_str()),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_menu() -> Menu {
        Menu::from_json(
            r#"[
                {"id": "7", "name": "Burger", "price": "5.00", "category": "Mains",
                 "promotion": {"price": "4.00", "starts_on": "2026-01-01", "ends_on": "2026-01-31"}},
                {"id": "8", "name": "Fries", "price": 2.5, "category": "Sides"},
                {"id": "9", "name": "Jollof", "price": "6.00", "category": "Mains"},
                {"id": "10", "name": "Water", "price": "1.00"}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_categories_first_seen_order() {
        assert_eq!(sample_menu().categories(), vec!["Mains", "Sides"]);
    }

    #[test]
    fn test_filter_by_category() {
        let menu = sample_menu();
        let mains = "Mains".parse::<CategoryFilter>().unwrap();
        let names: Vec<_> = menu.filter(&mains).map(|item| item.name.as_str()).collect();
        assert_eq!(names, vec!["Burger", "Jollof"]);

        let all = "all".parse::<CategoryFilter>().unwrap();
        assert_eq!(menu.filter(&all).count(), 4);
    }

    #[test]
    fn test_effective_price_respects_promotion_window() {
        let menu = sample_menu();
        let burger = menu.find(&ProductId::parse("7").unwrap()).unwrap();
        assert_eq!(burger.effective_price(date(2026, 1, 15)), Decimal::new(400, 2));
        assert_eq!(burger.effective_price(date(2026, 1, 31)), Decimal::new(400, 2));
        assert_eq!(burger.effective_price(date(2026, 2, 1)), Decimal::new(500, 2));
    }

    #[test]
    fn test_load_missing_file() {
        let path = std::env::temp_dir().join("snap-menu-missing-menu-file.json");
        assert!(matches!(Menu::load(&path), Err(MenuError::Io { .. })));
    }

    #[test]
    fn test_items_available_by_default() {
        assert!(sample_menu().items().iter().all(|item| item.available));
    }
}
