use anyhow::Result;
use graph::{CommitDetail, CommitId};
use indexmap::IndexMap;
use parking_lot::Mutex;

/// Bounded commit-detail cache in front of the VCS.
///
/// Entries are kept in recency order, least recently used first. Safe to
/// share between threads; the only invariant is per key: a cached detail is
/// never fetched again.
pub struct CommitDetailCache {
    capacity: usize,
    entries: Mutex<IndexMap<CommitId, CommitDetail>>,
}

impl CommitDetailCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(IndexMap::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn get(&self, id: &CommitId) -> Option<CommitDetail> {
        let mut entries = self.entries.lock();
        let detail = entries.shift_remove(id)?;
        entries.insert(id.clone(), detail.clone());
        Some(detail)
    }

    pub fn insert(&self, detail: CommitDetail) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock();
        entries.shift_remove(&detail.id);
        entries.insert(detail.id.clone(), detail);
        while entries.len() > self.capacity {
            entries.shift_remove_index(0);
        }
    }

    /// Details for `ids` in the given order. Only ids missing from the cache
    /// are passed to `fetch`; ids it does not return are left out.
    pub fn get_or_fetch<F>(&self, ids: &[CommitId], fetch: F) -> Result<Vec<CommitDetail>>
    where
        F: FnOnce(&[CommitId]) -> Result<Vec<CommitDetail>>,
    {
        let mut found: IndexMap<CommitId, Option<CommitDetail>> =
            ids.iter().map(|id| (id.clone(), self.get(id))).collect();
        let missing: Vec<CommitId> = found
            .iter()
            .filter(|(_, detail)| detail.is_none())
            .map(|(id, _)| id.clone())
            .collect();

        if !missing.is_empty() {
            for detail in fetch(&missing)? {
                self.insert(detail.clone());
                if let Some(slot) = found.get_mut(&detail.id) {
                    *slot = Some(detail);
                }
            }
        }

        Ok(ids
            .iter()
            .filter_map(|id| found.get(id).cloned().flatten())
            .collect())
    }
}
