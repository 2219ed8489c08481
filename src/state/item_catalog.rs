use std::sync::Arc;

use dashmap::DashMap;

use crate::types::Item;

/// item_id → display name. Shared between the API handlers and the label
/// resolver; hydrated from the `items` table at startup and refreshed on
/// catalog writes.
pub struct ItemCatalog {
    names: DashMap<i64, String>,
}

impl ItemCatalog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            names: DashMap::new(),
        })
    }

    pub fn replace_all(&self, items: &[Item]) {
        self.names.clear();
        for item in items {
            self.names.insert(item.id, item.name.clone());
        }
    }

    pub fn insert(&self, id: i64, name: &str) {
        self.names.insert(id, name.to_string());
    }

    pub fn resolve(&self, id: i64) -> Option<String> {
        self.names.get(&id).map(|name| name.value().clone())
    }

    pub fn contains(&self, id: i64) -> bool {
        self.names.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_and_refresh() {
        let catalog = ItemCatalog::new();
        catalog.replace_all(&[
            Item {
                id: 1101,
                name: "Espada".to_string(),
            },
            Item {
                id: 4001,
                name: "Carta Poring".to_string(),
            },
        ]);

        assert_eq!(catalog.resolve(1101), Some("Espada".to_string()));
        assert_eq!(catalog.resolve(9999), None);
        assert_eq!(catalog.len(), 2);

        catalog.insert(9999, "Carta Nova");
        assert!(catalog.contains(9999));

        catalog.replace_all(&[]);
        assert!(catalog.is_empty());
    }
}
