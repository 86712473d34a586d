// Copyright (C) 2024 rk8s authors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use super::{FileHandle, Owner};

struct Slot {
    handle: Arc<FileHandle>,
    opens: usize,
}

#[derive(Default)]
struct Indices {
    by_id: HashMap<u64, Slot>,
    by_path: HashMap<String, u64>,
}

impl Indices {
    fn remove(&mut self, id: u64) -> Option<Arc<FileHandle>> {
        let slot = self.by_id.remove(&id)?;
        if self.by_path.get(slot.handle.path()) == Some(&id) {
            self.by_path.remove(slot.handle.path());
        }
        Some(slot.handle)
    }
}

/// Live handles indexed by path and by id. Both indices change together
/// under one write lock; lookups take the read lock.
pub struct HandleTable {
    inner: RwLock<Indices>,
    next_id: AtomicU64,
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Indices::default()),
            next_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Open `path`: share the live handle if there is one, otherwise create
    /// it with a fresh id.
    pub fn acquire(&self, path: &str, is_dir: bool, owner: Owner) -> Arc<FileHandle> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = inner
            .by_path
            .get(path)
            .copied()
            .and_then(|id| inner.by_id.get_mut(&id))
        {
            slot.opens += 1;
            return slot.handle.clone();
        }
        let id = self.next_id();
        let handle = Arc::new(FileHandle::new(path.to_string(), id, is_dir, owner));
        inner.by_path.insert(path.to_string(), id);
        inner.by_id.insert(
            id,
            Slot {
                handle: handle.clone(),
                opens: 1,
            },
        );
        handle
    }

    /// A handle that is never registered, for synthesizing a stat. It starts
    /// with an empty cache and goes away with its last reference.
    pub fn transient(&self, path: &str, is_dir: bool, owner: Owner) -> Arc<FileHandle> {
        Arc::new(FileHandle::new(path.to_string(), self.next_id(), is_dir, owner))
    }

    /// Drop one reference. Returns the handle if this removed it from the
    /// table.
    pub fn release(&self, path: &str, id: u64) -> Option<Arc<FileHandle>> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let slot = inner.by_id.get_mut(&id)?;
        if slot.handle.path() != path {
            debug!("release of {id} under {path}, handle is at {}", slot.handle.path());
        }
        slot.opens = slot.opens.saturating_sub(1);
        if slot.opens > 0 {
            return None;
        }
        inner.remove(id)
    }

    /// Remove the handle at `path` (or with `id`) whatever its reference
    /// count.
    pub fn purge(&self, path: &str, id: Option<u64>) -> Vec<Arc<FileHandle>> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let mut removed = Vec::new();
        if let Some(id) = inner.by_path.get(path).copied() {
            removed.extend(inner.remove(id));
        }
        if let Some(id) = id {
            removed.extend(inner.remove(id));
        }
        removed
    }

    /// Remove `root` and every handle below it. `/a` does not cover `/ab`.
    pub fn purge_subtree(&self, root: &str) -> Vec<Arc<FileHandle>> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let doomed: Vec<u64> = inner
            .by_path
            .iter()
            .filter(|(path, _)| crate::vfs::path::is_within(path, root))
            .map(|(_, id)| *id)
            .collect();
        doomed.into_iter().filter_map(|id| inner.remove(id)).collect()
    }

    pub fn lookup_by_path(&self, path: &str) -> Option<Arc<FileHandle>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let id = inner.by_path.get(path)?;
        inner.by_id.get(id).map(|slot| slot.handle.clone())
    }

    pub fn lookup_by_id(&self, id: u64) -> Option<Arc<FileHandle>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.by_id.get(&id).map(|slot| slot.handle.clone())
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_id
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Paths of every live handle, sorted.
    pub fn paths(&self) -> Vec<String> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut paths: Vec<String> = inner.by_path.keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_shares_handle_per_path() {
        let table = HandleTable::new();
        let a = table.acquire("/f", false, Owner::default());
        let b = table.acquire("/f", false, Owner::default());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.id(), 1);

        let c = table.acquire("/g", false, Owner::default());
        assert_eq!(c.id(), 2);

        assert!(table.release("/f", a.id()).is_none());
        assert!(table.lookup_by_path("/f").is_some());
        assert!(table.release("/f", a.id()).is_some());
        assert!(table.lookup_by_path("/f").is_none());
        assert!(table.lookup_by_id(1).is_none());

        // Ids are never reused.
        assert_eq!(table.acquire("/f", false, Owner::default()).id(), 3);
    }

    #[test]
    fn test_transient_handles_stay_out_of_the_table() {
        let table = HandleTable::new();
        let opened = table.acquire("/f", false, Owner::default());
        let t = table.transient("/f", false, Owner::default());
        assert!(!Arc::ptr_eq(&opened, &t));
        assert_ne!(t.id(), opened.id());
        assert!(table.lookup_by_id(t.id()).is_none());

        table.transient("/g", true, Owner::default());
        assert_eq!(table.paths(), ["/f"]);
        assert!(table.release("/f", opened.id()).is_some());
        assert!(table.is_empty());
    }

    #[test]
    fn test_purge_ignores_reference_count() {
        let table = HandleTable::new();
        let h = table.acquire("/f", false, Owner::default());
        table.acquire("/f", false, Owner::default());

        let removed = table.purge("/f", None);
        assert_eq!(removed.len(), 1);
        assert!(table.lookup_by_id(h.id()).is_none());
        assert!(table.release("/f", h.id()).is_none());
        assert!(table.purge("/f", Some(h.id())).is_empty());
    }

    #[test]
    fn test_purge_subtree_uses_real_containment() {
        let table = HandleTable::new();
        for path in ["/a", "/a/x", "/a/b/z", "/ab", "/b"] {
            table.acquire(path, false, Owner::default());
        }
        let removed = table.purge_subtree("/a");
        assert_eq!(removed.len(), 3);
        assert_eq!(table.paths(), ["/ab", "/b"]);

        table.purge_subtree("/");
        assert!(table.is_empty());
    }
}
