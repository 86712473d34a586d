// Copyright (C) 2024 rk8s authors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inode numbers for the kernel. The filesystem itself is path based, so
//! every inode handed out is just a name for a normalized path, kept until
//! the kernel forgets it or the path disappears.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::vfs::path::{is_within, rebase};

pub const ROOT_INO: u64 = 1;

struct Node {
    path: String,
    lookups: u64,
}

#[derive(Default)]
struct Maps {
    by_ino: HashMap<u64, Node>,
    by_path: HashMap<String, u64>,
}

impl Maps {
    fn remove(&mut self, ino: u64) {
        if ino == ROOT_INO {
            return;
        }
        if let Some(node) = self.by_ino.remove(&ino) {
            if self.by_path.get(&node.path) == Some(&ino) {
                self.by_path.remove(&node.path);
            }
        }
    }
}

pub struct InodeMap {
    inner: RwLock<Maps>,
    next_ino: AtomicU64,
}

impl Default for InodeMap {
    fn default() -> Self {
        Self::new()
    }
}

impl InodeMap {
    pub fn new() -> Self {
        let mut maps = Maps::default();
        maps.by_ino.insert(
            ROOT_INO,
            Node {
                path: "/".to_string(),
                lookups: 0,
            },
        );
        maps.by_path.insert("/".to_string(), ROOT_INO);
        Self {
            inner: RwLock::new(maps),
            next_ino: AtomicU64::new(ROOT_INO + 1),
        }
    }

    pub fn path_of(&self, ino: u64) -> Option<String> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.by_ino.get(&ino).map(|node| node.path.clone())
    }

    pub fn ino_of(&self, path: &str) -> Option<u64> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.by_path.get(path).copied()
    }

    /// Inode for `path`, allocated on first use. Counts one kernel lookup,
    /// undone by [`forget`](Self::forget).
    pub fn remember(&self, path: &str) -> u64 {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(ino) = inner.by_path.get(path).copied() {
            if let Some(node) = inner.by_ino.get_mut(&ino) {
                node.lookups += 1;
            }
            return ino;
        }
        let ino = self.next_ino.fetch_add(1, Ordering::Relaxed);
        inner.by_path.insert(path.to_string(), ino);
        inner.by_ino.insert(
            ino,
            Node {
                path: path.to_string(),
                lookups: 1,
            },
        );
        ino
    }

    /// Drop `nlookup` kernel references; the inode goes away with the last.
    /// The root is never dropped.
    pub fn forget(&self, ino: u64, nlookup: u64) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let Some(node) = inner.by_ino.get_mut(&ino) else {
            return;
        };
        node.lookups = node.lookups.saturating_sub(nlookup);
        if node.lookups == 0 {
            inner.remove(ino);
        }
    }

    /// Forget `root` and every path below it, after it left the backend.
    pub fn remove_subtree(&self, root: &str) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let doomed: Vec<u64> = inner
            .by_path
            .iter()
            .filter(|(path, _)| is_within(path, root))
            .map(|(_, ino)| *ino)
            .collect();
        for ino in doomed {
            inner.remove(ino);
        }
    }

    /// Move `old` and everything below it under `new`, keeping inode numbers.
    /// Whatever was known at the destination is dropped.
    pub fn rename(&self, old: &str, new: &str) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let overwritten: Vec<u64> = inner
            .by_path
            .iter()
            .filter(|(path, _)| is_within(path, new))
            .map(|(_, ino)| *ino)
            .collect();
        for ino in overwritten {
            inner.remove(ino);
        }

        let moved: Vec<(String, u64)> = inner
            .by_path
            .iter()
            .filter(|(path, _)| is_within(path, old))
            .map(|(path, ino)| (path.clone(), *ino))
            .collect();
        for (path, ino) in moved {
            let Some(target) = rebase(&path, old, new) else {
                continue;
            };
            inner.by_path.remove(&path);
            if let Some(node) = inner.by_ino.get_mut(&ino) {
                node.path = target.clone();
            }
            inner.by_path.insert(target, ino);
        }
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_ino
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
