// ABOUTME: In-memory SnapshotStore used by embedded hosts and tests.
// ABOUTME: Append-only per key; a lock guards the map, never the snapshots.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::{SnapshotKey, SnapshotStore, StoreError};
use crate::snapshot::PhaseSnapshot;

#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<SnapshotKey, PhaseSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemoryStore {
    fn write(&self, key: SnapshotKey, snapshot: PhaseSnapshot) -> Result<(), StoreError> {
        let mut entries = self.entries.write();
        if entries.contains_key(&key) {
            return Err(StoreError::AlreadyWritten(key.phase_name));
        }
        entries.insert(key, snapshot);
        Ok(())
    }

    fn read(&self, key: &SnapshotKey) -> Result<Option<PhaseSnapshot>, StoreError> {
        Ok(self.entries.read().get(key).cloned())
    }
}
