//! Index maintenance and lookup across all entity field paths.

use crate::entity::Entity;
use crate::index::{OrderedIndex, TextIndex};
use crate::value::{IndexKey, Value};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Maintains the secondary indexes for a single store.
///
/// Every indexable leaf reached by a full recursive descent through an
/// entity's fields gets an ordered-index entry under its dotted path;
/// string leaves additionally get a text-index entry. Lookups never fail:
/// a path or value with no index presence yields the empty set.
#[derive(Debug, Default)]
pub struct IndexManager {
    ordered: HashMap<String, OrderedIndex>,
    text: HashMap<String, TextIndex>,
}

impl IndexManager {
    /// Creates an empty index manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds index entries for every indexable path of `entity`.
    pub fn index(&mut self, entity: &Entity) {
        for (path, value) in leaves(entity) {
            self.add_value(path, value, entity.id());
        }
    }

    /// Removes the index entries of `entity`, pruning empty buckets.
    ///
    /// Must be called with the entity state that was indexed; the store
    /// de-indexes the old entity before replacing it.
    pub fn remove(&mut self, entity: &Entity) {
        for (path, value) in leaves(entity) {
            self.remove_value(&path, value, entity.id());
        }
    }

    /// Returns the ids whose value at `path` equals `value`.
    #[must_use]
    pub fn search_equals(&self, path: &str, value: &Value) -> HashSet<String> {
        match self.lookup_key(path, value) {
            Some(key) => self
                .ordered
                .get(path)
                .map(|index| index.lookup(&key))
                .unwrap_or_default(),
            None => HashSet::new(),
        }
    }

    /// Returns the ids whose value at `path` is strictly greater than `value`.
    #[must_use]
    pub fn search_greater_than(&self, path: &str, value: &Value) -> HashSet<String> {
        self.search_range(path, value, OrderedIndex::greater_than)
    }

    /// Returns the ids whose value at `path` is greater than or equal to `value`.
    #[must_use]
    pub fn search_greater_or_equals(&self, path: &str, value: &Value) -> HashSet<String> {
        self.search_range(path, value, OrderedIndex::greater_or_equals)
    }

    /// Returns the ids whose value at `path` is strictly less than `value`.
    #[must_use]
    pub fn search_less_than(&self, path: &str, value: &Value) -> HashSet<String> {
        self.search_range(path, value, OrderedIndex::less_than)
    }

    /// Returns the ids whose value at `path` is less than or equal to `value`.
    #[must_use]
    pub fn search_less_or_equals(&self, path: &str, value: &Value) -> HashSet<String> {
        self.search_range(path, value, OrderedIndex::less_or_equals)
    }

    /// Returns the ids whose string at `path` contains `needle`,
    /// case-insensitively.
    #[must_use]
    pub fn search_contains(&self, path: &str, needle: &str) -> HashSet<String> {
        self.text
            .get(path)
            .map(|index| index.contains(&needle.to_lowercase()))
            .unwrap_or_default()
    }

    /// Returns the ids whose string at `path` matches the SQL-style
    /// wildcard `pattern`, case-insensitively and anchored.
    #[must_use]
    pub fn search_like(&self, path: &str, pattern: &str) -> HashSet<String> {
        self.text
            .get(path)
            .map(|index| index.like(&pattern.to_lowercase()))
            .unwrap_or_default()
    }

    fn search_range(
        &self,
        path: &str,
        value: &Value,
        range: fn(&OrderedIndex, &IndexKey) -> HashSet<String>,
    ) -> HashSet<String> {
        match self.lookup_key(path, value) {
            Some(key) => self
                .ordered
                .get(path)
                .map(|index| range(index, &key))
                .unwrap_or_default(),
            None => HashSet::new(),
        }
    }

    fn lookup_key(&self, path: &str, value: &Value) -> Option<IndexKey> {
        let key = IndexKey::normalize(value);
        if key.is_none() {
            warn!(path, "index lookup with non-comparable value");
        }
        key
    }

    fn add_value(&mut self, path: String, value: &Value, id: &str) {
        if let Some(key) = IndexKey::normalize(value) {
            self.ordered.entry(path.clone()).or_default().insert(key, id);
        }
        if let Value::String(text) = value {
            self.text.entry(path).or_default().insert(id, text);
        }
    }

    fn remove_value(&mut self, path: &str, value: &Value, id: &str) {
        if let Some(key) = IndexKey::normalize(value) {
            if let Some(index) = self.ordered.get_mut(path) {
                index.remove(&key, id);
                if index.is_empty() {
                    self.ordered.remove(path);
                }
            }
        }
        if value.is_string() {
            if let Some(index) = self.text.get_mut(path) {
                index.remove(id);
                if index.is_empty() {
                    self.text.remove(path);
                }
            }
        }
    }
}

/// Collects every leaf value of an entity with its dotted path.
///
/// Objects recurse with `.<key>`, arrays with `.<index>`; everything else
/// is a leaf (including nulls, which normalize to no index entry).
fn leaves(entity: &Entity) -> Vec<(String, &Value)> {
    let mut out = Vec::new();
    for (key, value) in entity.fields() {
        descend(key.clone(), value, &mut out);
    }
    out
}

fn descend<'a>(path: String, value: &'a Value, out: &mut Vec<(String, &'a Value)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                descend(format!("{path}.{key}"), child, out);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                descend(format!("{path}.{i}"), child, out);
            }
        }
        _ => out.push((path, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(id: &str, fields: Value) -> Entity {
        Entity::from_value(id, fields).unwrap()
    }

    #[test]
    fn top_level_paths_indexed() {
        let mut indexes = IndexManager::new();
        indexes.index(&entity("1", json!({"age": 30})));

        assert_eq!(indexes.search_equals("age", &json!(30)).len(), 1);
    }

    #[test]
    fn nested_paths_indexed() {
        let mut indexes = IndexManager::new();
        indexes.index(&entity("1", json!({"address": {"city": "Belgrade"}})));

        let found = indexes.search_equals("address.city", &json!("Belgrade"));
        assert!(found.contains("1"));
    }

    #[test]
    fn list_elements_indexed_by_position() {
        let mut indexes = IndexManager::new();
        indexes.index(&entity("1", json!({"scores": [10, 20]})));

        assert!(indexes.search_equals("scores.0", &json!(10)).contains("1"));
        assert!(indexes.search_equals("scores.1", &json!(20)).contains("1"));
        assert!(indexes.search_equals("scores.2", &json!(30)).is_empty());
    }

    #[test]
    fn integer_query_matches_float_value() {
        let mut indexes = IndexManager::new();
        indexes.index(&entity("1", json!({"price": 5.0})));

        assert!(indexes.search_equals("price", &json!(5)).contains("1"));
    }

    #[test]
    fn range_queries() {
        let mut indexes = IndexManager::new();
        indexes.index(&entity("1", json!({"age": 30})));
        indexes.index(&entity("2", json!({"age": 25})));
        indexes.index(&entity("3", json!({"age": 40})));

        assert_eq!(indexes.search_greater_than("age", &json!(25)).len(), 2);
        assert_eq!(indexes.search_greater_or_equals("age", &json!(25)).len(), 3);
        assert_eq!(indexes.search_less_than("age", &json!(30)).len(), 1);
        assert_eq!(indexes.search_less_or_equals("age", &json!(30)).len(), 2);
    }

    #[test]
    fn remove_clears_all_entries() {
        let mut indexes = IndexManager::new();
        let e = entity("1", json!({"age": 30, "name": "Alice"}));
        indexes.index(&e);
        indexes.remove(&e);

        assert!(indexes.search_equals("age", &json!(30)).is_empty());
        assert!(indexes.search_contains("name", "ali").is_empty());
        // path buckets fully pruned
        assert!(indexes.ordered.is_empty());
        assert!(indexes.text.is_empty());
    }

    #[test]
    fn remove_leaves_other_entities() {
        let mut indexes = IndexManager::new();
        let a = entity("1", json!({"age": 30}));
        let b = entity("2", json!({"age": 30}));
        indexes.index(&a);
        indexes.index(&b);

        indexes.remove(&a);
        let found = indexes.search_equals("age", &json!(30));
        assert_eq!(found.len(), 1);
        assert!(found.contains("2"));
    }

    #[test]
    fn contains_is_case_insensitive() {
        let mut indexes = IndexManager::new();
        indexes.index(&entity("1", json!({"name": "Alice"})));

        assert!(indexes.search_contains("name", "LI").contains("1"));
    }

    #[test]
    fn like_is_case_insensitive_and_anchored() {
        let mut indexes = IndexManager::new();
        indexes.index(&entity("1", json!({"name": "Alice"})));

        assert!(indexes.search_like("name", "AL%").contains("1"));
        assert!(indexes.search_like("name", "LI%").is_empty());
        assert!(indexes.search_like("name", "_lice").contains("1"));
    }

    #[test]
    fn unknown_path_yields_empty() {
        let indexes = IndexManager::new();
        assert!(indexes.search_equals("missing", &json!(1)).is_empty());
        assert!(indexes.search_contains("missing", "x").is_empty());
    }

    #[test]
    fn non_comparable_lookup_yields_empty() {
        let mut indexes = IndexManager::new();
        indexes.index(&entity("1", json!({"age": 30})));

        assert!(indexes.search_equals("age", &json!([30])).is_empty());
        assert!(indexes.search_greater_than("age", &Value::Null).is_empty());
    }

    #[test]
    fn null_leaves_not_indexed() {
        let mut indexes = IndexManager::new();
        indexes.index(&entity("1", json!({"gone": null})));

        assert!(indexes.ordered.is_empty());
    }
}
