//! WAL record type and line codec.

use crate::value::Fields;
use serde::{Deserialize, Serialize};

/// Operation kind of a WAL record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WalOp {
    /// Entity inserted (or overwritten by id).
    Insert,
    /// Entity replaced with new fields.
    Update,
    /// Entity removed from the live map.
    Delete,
}

/// One mutation record, serialized as a single JSON object per WAL line.
///
/// The wire keys are exactly `operation`, `id`, `fields`, `timestamp`;
/// `fields` is `null` for deletes. The same type doubles as the history
/// feed entry handed to [`crate::VersionLog::bootstrap`] on open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalRecord {
    /// What the mutation did.
    pub operation: WalOp,
    /// Id of the affected entity.
    pub id: String,
    /// Field state after the mutation; `None` for deletes.
    pub fields: Option<Fields>,
    /// Milliseconds since the Unix epoch, assigned by the store.
    pub timestamp: i64,
}

impl WalRecord {
    /// Creates an insert record with a deep copy of `fields`.
    pub fn insert(id: impl Into<String>, fields: &Fields, timestamp: i64) -> Self {
        Self {
            operation: WalOp::Insert,
            id: id.into(),
            fields: Some(fields.clone()),
            timestamp,
        }
    }

    /// Creates an update record with a deep copy of `fields`.
    pub fn update(id: impl Into<String>, fields: &Fields, timestamp: i64) -> Self {
        Self {
            operation: WalOp::Update,
            id: id.into(),
            fields: Some(fields.clone()),
            timestamp,
        }
    }

    /// Creates a delete record.
    pub fn delete(id: impl Into<String>, timestamp: i64) -> Self {
        Self {
            operation: WalOp::Delete,
            id: id.into(),
            fields: None,
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields() -> Fields {
        match json!({"name": "Alice", "age": 30}) {
            crate::value::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn insert_roundtrip() {
        let record = WalRecord::insert("e1", &fields(), 1000);
        let line = serde_json::to_string(&record).unwrap();
        let decoded: WalRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(record, decoded);
    }

    #[test]
    fn delete_roundtrip() {
        let record = WalRecord::delete("e1", 2000);
        let line = serde_json::to_string(&record).unwrap();
        let decoded: WalRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(record, decoded);
        assert!(decoded.fields.is_none());
    }

    #[test]
    fn wire_format_keys() {
        let record = WalRecord::delete("e1", 2000);
        let line = serde_json::to_string(&record).unwrap();
        assert!(line.contains("\"operation\":\"DELETE\""));
        assert!(line.contains("\"id\":\"e1\""));
        assert!(line.contains("\"fields\":null"));
        assert!(line.contains("\"timestamp\":2000"));
    }

    #[test]
    fn operation_spelling() {
        for (op, spelled) in [
            (WalOp::Insert, "\"INSERT\""),
            (WalOp::Update, "\"UPDATE\""),
            (WalOp::Delete, "\"DELETE\""),
        ] {
            assert_eq!(serde_json::to_string(&op).unwrap(), spelled);
        }
    }

    #[test]
    fn unknown_operation_rejected() {
        let line = r#"{"operation":"UPSERT","id":"x","fields":null,"timestamp":1}"#;
        assert!(serde_json::from_str::<WalRecord>(line).is_err());
    }
}
