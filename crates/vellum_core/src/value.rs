//! Schemaless value model.
//!
//! Field values are [`serde_json::Value`] trees; field maps preserve
//! insertion order (the `preserve_order` feature of `serde_json`). Deep
//! copies at history and snapshot boundaries are plain `Clone` calls on
//! fully owned trees.
//!
//! This module adds the pieces JSON values lack: dotted-path resolution,
//! a heterogeneous ordered key for the secondary indexes, and the numeric
//! form shared by the filter engine.

use std::cmp::Ordering;

pub use serde_json::Value;

/// Ordered mapping from field name to value.
pub type Fields = serde_json::Map<String, Value>;

/// Resolves a dotted path against a field map.
///
/// Each segment resolves against an object by key lookup and against an
/// array by base-10 index; any other combination yields `None`.
///
/// ```
/// use serde_json::json;
/// # use vellum_core::value::resolve_path;
/// let fields = json!({"address": {"city": "Belgrade"}, "tags": ["a", "b"]});
/// let fields = fields.as_object().unwrap();
/// assert_eq!(resolve_path(fields, "address.city"), Some(&json!("Belgrade")));
/// assert_eq!(resolve_path(fields, "tags.1"), Some(&json!("b")));
/// assert_eq!(resolve_path(fields, "tags.x"), None);
/// ```
pub fn resolve_path<'a>(fields: &'a Fields, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = fields.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Returns the double form of a value for numeric comparison.
///
/// Only numbers have one. Comparisons never coerce other kinds — a string
/// holding digits stays a string — so the scan path matches exactly what
/// the ordered index, which buckets by kind, can answer.
pub fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Returns the display form of a value, used by string concatenation.
///
/// Strings render without quotes; everything else renders as compact JSON.
pub fn display_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Normalized key for the ordered index.
///
/// Values of different kinds must order without runtime type errors, so
/// the key is a tagged sum with an explicit total order: numbers sort
/// before strings, strings before booleans; within a kind the natural
/// order applies. Numbers use [`f64::total_cmp`] with `-0.0` folded into
/// `0.0` so that equal-valued keys collide.
#[derive(Debug, Clone)]
pub enum IndexKey {
    /// Numeric key; integers and floats normalize to the same double.
    Number(f64),
    /// String key, stored as written (equality is case-sensitive).
    Text(String),
    /// Boolean key; `false` sorts before `true`.
    Bool(bool),
}

impl IndexKey {
    /// Normalizes a value into an index key.
    ///
    /// Returns `None` for nulls, arrays, and objects — those kinds are not
    /// indexable and are skipped, not stored.
    pub fn normalize(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_f64().map(|f| {
                // fold -0.0 into 0.0 so the two don't form distinct keys
                Self::Number(if f == 0.0 { 0.0 } else { f })
            }),
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Bool(b) => Some(Self::Bool(*b)),
            _ => None,
        }
    }

    const fn rank(&self) -> u8 {
        match self {
            Self::Number(_) => 0,
            Self::Text(_) => 1,
            Self::Bool(_) => 2,
        }
    }
}

impl PartialEq for IndexKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IndexKey {}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}
