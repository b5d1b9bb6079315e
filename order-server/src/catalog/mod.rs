//! Catalog Reader - read-only food lookup with an in-memory cache
//!
//! Checkout pricing only trusts prices that come from here. The default
//! implementation loads a JSON array of [`Food`] entries at startup.

use parking_lot::RwLock;
use rust_decimal::Decimal;
use shared::error::{AppError, ErrorCode};
use shared::models::{Food, FoodPrice};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid catalog file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid catalog entry {id}: {reason}")]
    InvalidEntry { id: String, reason: String },
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match &err {
            CatalogError::InvalidEntry { id, .. } => {
                AppError::with_message(ErrorCode::FoodInvalidPrice, err.to_string())
                    .with_detail("food_id", id.clone())
            }
            _ => AppError::with_message(ErrorCode::ConfigError, err.to_string()),
        }
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Result of a batch price lookup
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceLookup {
    pub found: Vec<FoodPrice>,
    /// Requested ids the catalog does not know
    pub missing: Vec<String>,
}

impl PriceLookup {
    pub fn price_of(&self, food_id: &str) -> Option<Decimal> {
        self.found.iter().find(|p| p.id == food_id).map(|p| p.price)
    }
}

/// Read-only catalog access used by checkout pricing
pub trait CatalogReader: Send + Sync {
    /// Current prices for `ids`; duplicates are looked up once
    fn get_prices_by_ids(&self, ids: &[String]) -> PriceLookup;

    /// Every food, in catalog order
    fn list_foods(&self) -> Vec<Food>;
}

/// Map and load order are swapped together under one lock
#[derive(Debug, Default)]
struct CatalogData {
    /// food id -> Food
    foods: HashMap<String, Food>,
    /// ids in load order
    order: Vec<String>,
}

/// In-memory catalog
#[derive(Clone, Default)]
pub struct InMemoryCatalog {
    data: Arc<RwLock<CatalogData>>,
}

impl std::fmt::Debug for InMemoryCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCatalog")
            .field("foods_count", &self.data.read().foods.len())
            .finish()
    }
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_foods(foods: Vec<Food>) -> CatalogResult<Self> {
        let catalog = Self::new();
        catalog.replace(foods)?;
        Ok(catalog)
    }

    /// Load a JSON array of foods from disk
    pub fn load(path: impl AsRef<Path>) -> CatalogResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let foods: Vec<Food> = serde_json::from_str(&raw).map_err(|source| CatalogError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_foods(foods)?;
        tracing::info!(path = %path.display(), foods = catalog.len(), "Catalog loaded");
        Ok(catalog)
    }

    /// Swap the whole catalog; rejected entries leave the old one in place
    pub fn replace(&self, foods: Vec<Food>) -> CatalogResult<()> {
        let mut by_id = HashMap::with_capacity(foods.len());
        let mut order = Vec::with_capacity(foods.len());
        for food in foods {
            if food.id.trim().is_empty() {
                return Err(CatalogError::InvalidEntry {
                    id: food.id,
                    reason: "empty id".into(),
                });
            }
            if food.price.is_sign_negative() {
                return Err(CatalogError::InvalidEntry {
                    id: food.id,
                    reason: format!("negative price {}", food.price),
                });
            }
            if by_id.contains_key(&food.id) {
                return Err(CatalogError::InvalidEntry {
                    id: food.id,
                    reason: "duplicate id".into(),
                });
            }
            order.push(food.id.clone());
            by_id.insert(food.id.clone(), food);
        }

        *self.data.write() = CatalogData { foods: by_id, order };
        Ok(())
    }

    pub fn get(&self, food_id: &str) -> Option<Food> {
        self.data.read().foods.get(food_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.data.read().foods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().foods.is_empty()
    }
}

impl CatalogReader for InMemoryCatalog {
    fn get_prices_by_ids(&self, ids: &[String]) -> PriceLookup {
        let data = self.data.read();
        let mut lookup = PriceLookup::default();
        for id in ids {
            if lookup.found.iter().any(|p| &p.id == id) || lookup.missing.contains(id) {
                continue;
            }
            match data.foods.get(id) {
                Some(food) => lookup.found.push(FoodPrice {
                    id: food.id.clone(),
                    price: food.price,
                }),
                None => lookup.missing.push(id.clone()),
            }
        }
        lookup
    }

    fn list_foods(&self) -> Vec<Food> {
        let data = self.data.read();
        data.order
            .iter()
            .filter_map(|id| data.foods.get(id).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn food(id: &str, price: Decimal) -> Food {
        Food {
            id: id.to_string(),
            title: format!("Food {id}"),
            price,
            image: None,
            category_id: Some("c1".into()),
            sub_category_id: None,
        }
    }

    #[test]
    fn test_lookup_reports_missing_ids() {
        let catalog = InMemoryCatalog::from_foods(vec![
            food("f1", Decimal::new(950, 2)),
            food("f2", Decimal::new(300, 2)),
        ])
        .unwrap();

        let ids = vec!["f1".to_string(), "ghost".to_string(), "f1".to_string()];
        let lookup = catalog.get_prices_by_ids(&ids);
        assert_eq!(lookup.found.len(), 1);
        assert_eq!(lookup.price_of("f1"), Some(Decimal::new(950, 2)));
        assert_eq!(lookup.missing, vec!["ghost".to_string()]);
    }

    #[test]
    fn test_list_keeps_load_order() {
        let catalog = InMemoryCatalog::from_foods(vec![
            food("b", Decimal::ONE),
            food("a", Decimal::TWO),
        ])
        .unwrap();
        let ids: Vec<_> = catalog.list_foods().into_iter().map(|f| f.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_replace_swaps_map_and_order_together() {
        let old: Vec<Food> = (0..50).map(|i| food(&format!("old{i}"), Decimal::ONE)).collect();
        let new: Vec<Food> = (0..50).rev().map(|i| food(&format!("new{i}"), Decimal::TWO)).collect();
        let old_ids: Vec<String> = old.iter().map(|f| f.id.clone()).collect();
        let new_ids: Vec<String> = new.iter().map(|f| f.id.clone()).collect();
        let catalog = InMemoryCatalog::from_foods(old.clone()).unwrap();

        let writer = {
            let catalog = catalog.clone();
            std::thread::spawn(move || {
                for i in 0..200 {
                    let foods = if i % 2 == 0 { new.clone() } else { old.clone() };
                    catalog.replace(foods).unwrap();
                }
            })
        };

        // 列表要么整份旧目录，要么整份新目录
        for _ in 0..200 {
            let ids: Vec<String> = catalog.list_foods().into_iter().map(|f| f.id).collect();
            assert!(ids == old_ids || ids == new_ids, "mixed catalog: {} foods", ids.len());
        }
        writer.join().unwrap();

        catalog.replace(vec![food("z", Decimal::ONE), food("a", Decimal::TWO)]).unwrap();
        let ids: Vec<_> = catalog.list_foods().into_iter().map(|f| f.id).collect();
        assert_eq!(ids, vec!["z", "a"]);
        assert!(catalog.get("old0").is_none());
    }

    #[test]
    fn test_rejects_bad_entries() {
        let catalog = InMemoryCatalog::from_foods(vec![food("f1", Decimal::ONE)]).unwrap();

        let err = catalog
            .replace(vec![food("f1", Decimal::ONE), food("f1", Decimal::TWO)])
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidEntry { .. }));
        let err = catalog
            .replace(vec![food("f2", Decimal::new(-1, 0))])
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidEntry { .. }));

        // Old catalog still in place
        assert_eq!(catalog.len(), 1);
        assert!(catalog.get("f1").is_some());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"[{"id":"f1","title":"Burger","price":9.5},{"id":"f2","title":"Fries","price":3}]"#,
        )
        .unwrap();

        let catalog = InMemoryCatalog::load(&path).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("f1").unwrap().price, Decimal::new(95, 1));
    }

    #[test]
    fn test_load_missing_file() {
        let err = InMemoryCatalog::load("/nonexistent/catalog.json").unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }
}
