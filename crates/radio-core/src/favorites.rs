//! Favorites: `"artist - title"` keys, newest first, capped.

use serde_json::Value;
use tracing::warn;

use crate::store::{keys, KeyValueStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Added,
    Removed,
    /// Absent and the list is at capacity; nothing changed.
    Full,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Favorites {
    items: Vec<String>,
    max: usize,
}

impl Favorites {
    pub fn new(max: usize) -> Self {
        Self {
            items: Vec::new(),
            max,
        }
    }

    /// Load from the store, keeping only non-empty strings and at most `max`.
    /// Anything malformed yields an empty list.
    pub fn load(store: &impl KeyValueStore, max: usize) -> Self {
        let mut favorites = Self::new(max);
        let Some(raw) = store.get(keys::FAVORITES) else {
            return favorites;
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(values)) => {
                favorites.items = values
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::String(s) if !s.is_empty() => Some(s),
                        _ => None,
                    })
                    .take(max)
                    .collect();
            }
            Ok(_) => warn!("favorites: stored value is not an array, discarding"),
            Err(e) => warn!("favorites: discarding malformed stored value: {}", e),
        }
        favorites
    }

    pub fn save(&self, store: &mut impl KeyValueStore) -> Result<(), StoreError> {
        let json = serde_json::to_string(&self.items)?;
        store.set(keys::FAVORITES, &json)
    }

    pub fn toggle(&mut self, key: &str) -> ToggleOutcome {
        if let Some(idx) = self.position(key) {
            self.items.remove(idx);
            return ToggleOutcome::Removed;
        }
        if self.items.len() >= self.max {
            return ToggleOutcome::Full;
        }
        self.items.insert(0, key.to_string());
        ToggleOutcome::Added
    }

    /// Remove by position; `None` when out of range.
    pub fn remove(&mut self, index: usize) -> Option<String> {
        (index < self.items.len()).then(|| self.items.remove(index))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.items.iter().position(|f| f == key)
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn max(&self) -> usize {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_toggle_twice_restores_list() {
        let mut favs = Favorites::new(50);
        favs.toggle("A - 1");
        favs.toggle("B - 2");
        let before = favs.clone();

        assert_eq!(favs.toggle("Band - Song A"), ToggleOutcome::Added);
        assert_eq!(favs.items()[0], "Band - Song A");
        assert_eq!(favs.toggle("Band - Song A"), ToggleOutcome::Removed);
        assert_eq!(favs, before);
    }

    #[test]
    fn test_full_list_is_unchanged() {
        let mut favs = Favorites::new(2);
        favs.toggle("A - 1");
        favs.toggle("B - 2");
        let before = favs.clone();

        assert_eq!(favs.toggle("C - 3"), ToggleOutcome::Full);
        assert_eq!(favs, before);
        // removing is still allowed at capacity
        assert_eq!(favs.toggle("A - 1"), ToggleOutcome::Removed);
        assert_eq!(favs.len(), 1);
    }

    #[test]
    fn test_newest_first() {
        let mut favs = Favorites::new(5);
        favs.toggle("first");
        favs.toggle("second");
        assert_eq!(favs.items(), ["second", "first"]);
    }

    #[test]
    fn test_remove_by_index() {
        let mut favs = Favorites::new(5);
        favs.toggle("a");
        favs.toggle("b");
        assert_eq!(favs.remove(5), None);
        assert_eq!(favs.remove(0).as_deref(), Some("b"));
        assert_eq!(favs.items(), ["a"]);
    }

    #[test]
    fn test_load_discards_malformed() {
        let mut store = MemoryStore::new();
        store.set(keys::FAVORITES, "[broken").unwrap();
        assert!(Favorites::load(&store, 50).is_empty());

        store.set(keys::FAVORITES, r#"{"a": 1}"#).unwrap();
        assert!(Favorites::load(&store, 50).is_empty());
    }

    #[test]
    fn test_load_filters_and_truncates() {
        let mut store = MemoryStore::new();
        store
            .set(keys::FAVORITES, r#"["x - 1", "", 7, null, "y - 2", "z - 3"]"#)
            .unwrap();
        let favs = Favorites::load(&store, 2);
        assert_eq!(favs.items(), ["x - 1", "y - 2"]);
    }

    #[test]
    fn test_save_round_trip() {
        let mut store = MemoryStore::new();
        let mut favs = Favorites::new(10);
        favs.toggle("Band - Song A");
        favs.save(&mut store).unwrap();
        assert_eq!(
            store.get(keys::FAVORITES).as_deref(),
            Some(r#"["Band - Song A"]"#)
        );
        assert_eq!(Favorites::load(&store, 10), favs);
    }
}
