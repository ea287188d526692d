//! Snapshot and WAL persistence.
//!
//! On-disk state is a `snapshot.json` (the last committed live map) plus a
//! `wal.log` of JSON-lines records appended since. Replaying the snapshot
//! and then the WAL reproduces the live map exactly; writing a new
//! snapshot and unlinking the WAL is the commit point.

mod record;

pub use record::{WalOp, WalRecord};

use crate::dir::StoreDir;
use crate::entity::Entity;
use crate::error::Result;
use crate::value::{Fields, Value};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use std::time::UNIX_EPOCH;
use tracing::{debug, info, warn};

/// State reconstructed by [`Persistence::load`].
#[derive(Debug, Default)]
pub struct LoadedState {
    /// Final live map after snapshot and WAL replay.
    pub entities: BTreeMap<String, Fields>,
    /// Full history feed, ordered by timestamp, for
    /// [`crate::VersionLog::bootstrap`].
    pub feed: Vec<WalRecord>,
}

/// Handles snapshot and WAL files under a locked store directory.
pub struct Persistence {
    dir: StoreDir,
    sync_on_append: bool,
    /// Open WAL handle, recreated lazily after a snapshot unlinks the file.
    wal: Mutex<Option<File>>,
}

impl Persistence {
    /// Creates a persistence manager over an opened directory.
    pub fn new(dir: StoreDir, sync_on_append: bool) -> Self {
        Self {
            dir,
            sync_on_append,
            wal: Mutex::new(None),
        }
    }

    /// Loads the persisted state: snapshot first, then WAL replay.
    ///
    /// Snapshot entries enter the feed as inserts stamped with the
    /// snapshot file's modification time; WAL records carry their own
    /// timestamps. Blank WAL lines are skipped; a malformed final line is
    /// treated as a torn write and dropped silently; malformed interior
    /// lines are skipped with a warning.
    pub fn load(&self) -> Result<LoadedState> {
        let mut state = LoadedState::default();

        let snapshot_path = self.dir.snapshot_path();
        if snapshot_path.exists() {
            let stamp = modified_millis(&snapshot_path)?;
            let file = File::open(&snapshot_path)?;
            let snapshot: BTreeMap<String, Fields> =
                serde_json::from_reader(BufReader::new(file))?;
            info!(entities = snapshot.len(), "loaded snapshot");
            for (id, fields) in snapshot {
                state.feed.push(WalRecord {
                    operation: WalOp::Insert,
                    id: id.clone(),
                    fields: Some(fields.clone()),
                    timestamp: stamp,
                });
                state.entities.insert(id, fields);
            }
        }

        let wal_path = self.dir.wal_path();
        if wal_path.exists() {
            let text = fs::read_to_string(&wal_path)?;
            let lines: Vec<&str> = text.lines().collect();
            let last = lines.len().saturating_sub(1);
            for (number, line) in lines.iter().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<WalRecord>(line) {
                    Ok(record) => {
                        apply(&mut state.entities, &record);
                        state.feed.push(record);
                    }
                    Err(err) if number == last => {
                        debug!(%err, "dropping torn final WAL line");
                    }
                    Err(err) => {
                        warn!(line = number + 1, %err, "skipping malformed WAL record");
                    }
                }
            }
        }

        state.feed.sort_by_key(|record| record.timestamp);
        Ok(state)
    }

    /// Appends an insert record for `entity`.
    pub fn append_insert(&self, entity: &Entity, timestamp: i64) -> Result<()> {
        self.append(&WalRecord::insert(entity.id(), entity.fields(), timestamp))
    }

    /// Appends an update record for `id`.
    pub fn append_update(&self, id: &str, fields: &Fields, timestamp: i64) -> Result<()> {
        self.append(&WalRecord::update(id, fields, timestamp))
    }

    /// Appends a delete record for `id`.
    pub fn append_delete(&self, id: &str, timestamp: i64) -> Result<()> {
        self.append(&WalRecord::delete(id, timestamp))
    }

    /// Writes the live map atomically to `snapshot.json` and truncates the
    /// WAL.
    ///
    /// The snapshot goes to a temporary file in the same directory, is
    /// fsynced, then renamed over the previous snapshot; a reader observes
    /// either the old snapshot or the new one, never a partial file.
    /// Unlinking the WAL afterwards is the commit point.
    pub fn save_snapshot<'a, I>(&self, entities: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Entity>,
    {
        let mut snapshot = Fields::new();
        for entity in entities {
            snapshot.insert(
                entity.id().to_string(),
                Value::Object(entity.fields().clone()),
            );
        }

        let temp_path = self.dir.snapshot_temp_path();
        {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, &snapshot)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&temp_path, self.dir.snapshot_path())?;

        let mut wal = self.wal.lock();
        *wal = None;
        match fs::remove_file(self.dir.wal_path()) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        info!(entities = snapshot.len(), "snapshot committed, WAL truncated");
        Ok(())
    }

    fn append(&self, record: &WalRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut wal = self.wal.lock();
        if wal.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.dir.wal_path())?;
            *wal = Some(file);
        }
        if let Some(file) = wal.as_mut() {
            file.write_all(line.as_bytes())?;
            if self.sync_on_append {
                file.sync_data()?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Persistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persistence")
            .field("dir", &self.dir.path())
            .field("sync_on_append", &self.sync_on_append)
            .finish_non_exhaustive()
    }
}

fn apply(entities: &mut BTreeMap<String, Fields>, record: &WalRecord) {
    match record.operation {
        WalOp::Insert | WalOp::Update => {
            if let Some(fields) = &record.fields {
                entities.insert(record.id.clone(), fields.clone());
            }
        }
        WalOp::Delete => {
            entities.remove(&record.id);
        }
    }
}

fn modified_millis(path: &Path) -> Result<i64> {
    let modified = fs::metadata(path)?.modified()?;
    let millis = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);
    Ok(millis)
}
