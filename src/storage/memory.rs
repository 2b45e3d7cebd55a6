//! In-memory storage implementation
//!
//! Nothing outlives the process. Used for dry runs and tests.

use crate::storage::traits::{GameStore, StorageError, StorageResult};
use crate::storage::{Catalog, DetailRecord};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct MemoryState {
    closed: bool,
    catalogs: HashMap<String, Catalog>,
    records: HashMap<String, HashMap<String, DetailRecord>>,
}

/// In-memory storage backend
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose catalog for `platform` is already populated
    pub fn with_catalog(platform: &str, catalog: Catalog) -> Self {
        let store = Self::new();
        if let Ok(mut state) = store.state.lock() {
            state.catalogs.insert(platform.to_string(), catalog);
        }
        store
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, MemoryState>> {
        let state = self
            .state
            .lock()
            .map_err(|_| StorageError::Backend("memory store lock poisoned".to_string()))?;
        if state.closed {
            return Err(StorageError::Closed);
        }
        Ok(state)
    }
}

impl GameStore for MemoryStore {
    fn get_catalog(&self, platform: &str) -> StorageResult<Catalog> {
        Ok(self
            .lock()?
            .catalogs
            .get(platform)
            .cloned()
            .unwrap_or_default())
    }

    fn save_catalog(&self, platform: &str, catalog: &Catalog) -> StorageResult<()> {
        self.lock()?
            .catalogs
            .insert(platform.to_string(), catalog.clone());
        Ok(())
    }

    fn save_record(
        &self,
        platform: &str,
        sub_id: &str,
        record: &DetailRecord,
    ) -> StorageResult<()> {
        self.lock()?
            .records
            .entry(platform.to_string())
            .or_default()
            .insert(sub_id.to_string(), record.clone());
        Ok(())
    }

    fn get_record(&self, platform: &str, sub_id: &str) -> StorageResult<Option<DetailRecord>> {
        Ok(self
            .lock()?
            .records
            .get(platform)
            .and_then(|records| records.get(sub_id))
            .cloned())
    }

    fn list_records(&self, platform: &str) -> StorageResult<Vec<(String, DetailRecord)>> {
        let mut records: Vec<_> = self
            .lock()?
            .records
            .get(platform)
            .map(|records| {
                records
                    .iter()
                    .map(|(sub_id, record)| (sub_id.clone(), record.clone()))
                    .collect()
            })
            .unwrap_or_default();
        records.sort_by_key(|(_, record)| record.id);
        Ok(records)
    }

    fn close(&self) -> StorageResult<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| StorageError::Backend("memory store lock poisoned".to_string()))?;
        state.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_catalog() {
        let store = MemoryStore::with_catalog("steam", [(1, "A".to_string())].into());
        assert_eq!(store.get_catalog("steam").unwrap().len(), 1);
        assert!(store.get_catalog("gog").unwrap().is_empty());
    }

    #[test]
    fn test_records_sorted_by_id() {
        let store = MemoryStore::new();
        for id in [5, 1, 3] {
            let record = DetailRecord {
                id,
                ..Default::default()
            };
            store.save_record("steam", &id.to_string(), &record).unwrap();
        }

        let ids: Vec<u32> = store
            .list_records("steam")
            .unwrap()
            .iter()
            .map(|(_, record)| record.id)
            .collect();
        assert_eq!(ids, vec![1, 3, 5]);
    }

    #[test]
    fn test_close() {
        let store = MemoryStore::new();
        store.close().unwrap();
        assert!(matches!(
            store.save_catalog("steam", &Catalog::new()),
            Err(StorageError::Closed)
        ));
    }
}
