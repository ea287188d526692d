//! Per-entity version history and time-travel reads.

use crate::entity::Entity;
use crate::persist::{WalOp, WalRecord};
use crate::value::{Fields, Value};
use std::collections::{BTreeMap, HashMap};

/// One recorded state of an entity.
///
/// `fields` is a deep copy taken at record time; `None` together with
/// `deleted` marks a tombstone.
#[derive(Debug, Clone)]
struct Version {
    timestamp: i64,
    fields: Option<Fields>,
    deleted: bool,
}

/// Append-mostly version history for all entities of one store.
///
/// Versions per id are kept sorted ascending by timestamp. Appends usually
/// land at the tail; an out-of-order timestamp is inserted at its sorted
/// position, after any equal timestamps so ties keep arrival order.
#[derive(Debug, Default)]
pub struct VersionLog {
    history: HashMap<String, Vec<Version>>,
}

impl VersionLog {
    /// Creates an empty version log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an insert of `entity` at `timestamp`.
    pub fn record_insert(&mut self, entity: &Entity, timestamp: i64) {
        self.push(
            entity.id(),
            Version {
                timestamp,
                fields: Some(entity.fields().clone()),
                deleted: false,
            },
        );
    }

    /// Records a full-replacement update of `id` at `timestamp`.
    pub fn record_update(&mut self, id: &str, fields: &Fields, timestamp: i64) {
        self.push(
            id,
            Version {
                timestamp,
                fields: Some(fields.clone()),
                deleted: false,
            },
        );
    }

    /// Records a delete tombstone for `id` at `timestamp`.
    pub fn record_delete(&mut self, id: &str, timestamp: i64) {
        self.push(
            id,
            Version {
                timestamp,
                fields: None,
                deleted: true,
            },
        );
    }

    /// Returns a deep copy of the newest version of `id` recorded at or
    /// before `timestamp`, or `None` if there is none or it is a tombstone.
    #[must_use]
    pub fn get_at(&self, id: &str, timestamp: i64) -> Option<Fields> {
        let versions = self.history.get(id)?;
        let at = versions.partition_point(|v| v.timestamp <= timestamp);
        let version = versions[..at].last()?;
        if version.deleted {
            None
        } else {
            version.fields.clone()
        }
    }

    /// Returns every version of `id` in chronological order.
    ///
    /// Each returned snapshot is annotated with synthetic `_timestamp` and
    /// `_deleted` keys; tombstones yield a map holding only those two.
    #[must_use]
    pub fn history(&self, id: &str) -> Vec<Fields> {
        let Some(versions) = self.history.get(id) else {
            return Vec::new();
        };
        versions
            .iter()
            .map(|version| {
                let mut snapshot = version.fields.clone().unwrap_or_default();
                snapshot.insert("_timestamp".to_string(), Value::from(version.timestamp));
                snapshot.insert("_deleted".to_string(), Value::Bool(version.deleted));
                snapshot
            })
            .collect()
    }

    /// Assembles the live-at-`timestamp` view of every known id, omitting
    /// entities that were deleted or not yet inserted at that time.
    #[must_use]
    pub fn snapshot_at(&self, timestamp: i64) -> BTreeMap<String, Fields> {
        self.history
            .keys()
            .filter_map(|id| self.get_at(id, timestamp).map(|fields| (id.clone(), fields)))
            .collect()
    }

    /// Resets the history and replays a load feed.
    ///
    /// Entries are applied in non-decreasing timestamp order regardless of
    /// feed order; inserts and updates become versions, deletes tombstones.
    pub fn bootstrap(&mut self, feed: &[WalRecord]) {
        self.history.clear();
        let mut ordered: Vec<&WalRecord> = feed.iter().collect();
        ordered.sort_by_key(|record| record.timestamp);
        for record in ordered {
            match record.operation {
                WalOp::Insert | WalOp::Update => self.push(
                    &record.id,
                    Version {
                        timestamp: record.timestamp,
                        fields: record.fields.clone(),
                        deleted: false,
                    },
                ),
                WalOp::Delete => self.record_delete(&record.id, record.timestamp),
            }
        }
    }

    fn push(&mut self, id: &str, version: Version) {
        let versions = self.history.entry(id.to_string()).or_default();
        match versions.last() {
            Some(last) if last.timestamp > version.timestamp => {
                let at = versions.partition_point(|v| v.timestamp <= version.timestamp);
                versions.insert(at, version);
            }
            _ => versions.push(version),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(id: &str, fields: Value) -> Entity {
        Entity::from_value(id, fields).unwrap()
    }

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn get_at_before_first_version() {
        let mut log = VersionLog::new();
        log.record_insert(&entity("1", json!({"v": 1})), 100);

        assert!(log.get_at("1", 99).is_none());
    }

    #[test]
    fn get_at_picks_newest_at_or_before() {
        let mut log = VersionLog::new();
        log.record_insert(&entity("1", json!({"v": 1})), 100);
        log.record_update("1", &fields(json!({"v": 2})), 200);

        assert_eq!(log.get_at("1", 150).unwrap()["v"], json!(1));
        assert_eq!(log.get_at("1", 200).unwrap()["v"], json!(2));
        assert_eq!(log.get_at("1", 9999).unwrap()["v"], json!(2));
    }

    #[test]
    fn tombstone_reads_as_absent() {
        let mut log = VersionLog::new();
        log.record_insert(&entity("1", json!({"v": 1})), 100);
        log.record_delete("1", 200);

        assert!(log.get_at("1", 150).is_some());
        assert!(log.get_at("1", 250).is_none());
    }

    #[test]
    fn reinsert_after_delete_appends() {
        let mut log = VersionLog::new();
        log.record_insert(&entity("1", json!({"v": 1})), 100);
        log.record_delete("1", 200);
        log.record_insert(&entity("1", json!({"v": 3})), 300);

        assert_eq!(log.history("1").len(), 3);
        assert_eq!(log.get_at("1", 300).unwrap()["v"], json!(3));
    }

    #[test]
    fn history_annotations() {
        let mut log = VersionLog::new();
        log.record_insert(&entity("1", json!({"v": 1})), 100);
        log.record_delete("1", 200);

        let history = log.history("1");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0]["_timestamp"], json!(100));
        assert_eq!(history[0]["_deleted"], json!(false));
        assert_eq!(history[0]["v"], json!(1));
        assert_eq!(history[1]["_timestamp"], json!(200));
        assert_eq!(history[1]["_deleted"], json!(true));
        assert!(!history[1].contains_key("v"));
    }

    #[test]
    fn history_of_unknown_id_is_empty() {
        let log = VersionLog::new();
        assert!(log.history("ghost").is_empty());
    }

    #[test]
    fn out_of_order_append_sorts() {
        let mut log = VersionLog::new();
        log.record_update("1", &fields(json!({"v": 2})), 200);
        log.record_update("1", &fields(json!({"v": 1})), 100);

        let history = log.history("1");
        assert_eq!(history[0]["_timestamp"], json!(100));
        assert_eq!(history[1]["_timestamp"], json!(200));
        assert_eq!(log.get_at("1", 150).unwrap()["v"], json!(1));
    }

    #[test]
    fn equal_timestamps_keep_arrival_order() {
        let mut log = VersionLog::new();
        log.record_update("1", &fields(json!({"v": 1})), 100);
        log.record_update("1", &fields(json!({"v": 2})), 100);

        assert_eq!(log.get_at("1", 100).unwrap()["v"], json!(2));
    }

    #[test]
    fn snapshot_at_mixed_states() {
        let mut log = VersionLog::new();
        log.record_insert(&entity("1", json!({"v": 1})), 100);
        log.record_insert(&entity("2", json!({"v": 2})), 150);
        log.record_delete("1", 200);
        log.record_insert(&entity("3", json!({"v": 3})), 300);

        let snapshot = log.snapshot_at(250);
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains_key("2"));
    }

    #[test]
    fn bootstrap_replays_sorted() {
        let feed = vec![
            WalRecord::update("1", &fields(json!({"v": 2})), 200),
            WalRecord::insert("1", &fields(json!({"v": 1})), 100),
            WalRecord::delete("1", 300),
        ];

        let mut log = VersionLog::new();
        log.bootstrap(&feed);

        let history = log.history("1");
        assert_eq!(history.len(), 3);
        assert_eq!(history[0]["_timestamp"], json!(100));
        assert!(log.get_at("1", 400).is_none());
        assert_eq!(log.get_at("1", 250).unwrap()["v"], json!(2));
    }

    #[test]
    fn bootstrap_resets_prior_history() {
        let mut log = VersionLog::new();
        log.record_insert(&entity("old", json!({"v": 0})), 50);

        log.bootstrap(&[WalRecord::insert("new", &fields(json!({"v": 1})), 100)]);

        assert!(log.history("old").is_empty());
        assert_eq!(log.history("new").len(), 1);
    }
}
