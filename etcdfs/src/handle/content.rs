// Copyright (C) 2024 rk8s authors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-handle buffers: a shared read snapshot plus a copy-on-write staging
//! buffer owned by at most one writer identity.

use bytes::Bytes;

use super::{Identity, MAX_FILE_SIZE};
use crate::error::{FsError, Result};

/// `Clean` while `staging` is empty, `Dirty` once a writer has touched it.
#[derive(Debug, Default)]
pub struct Content {
    /// Last committed snapshot, absent until the first read-through.
    cache: Option<Bytes>,
    /// The writer's pending content, seeded from `cache` on first write.
    staging: Option<Vec<u8>>,
    writer: Option<Identity>,
}

fn window(len: usize, offset: u64, size: usize) -> std::ops::Range<usize> {
    let start = usize::try_from(offset).unwrap_or(usize::MAX).min(len);
    let end = start.saturating_add(size).min(len);
    start..end
}

/// Checked end offset of a region, bounded by [`MAX_FILE_SIZE`].
fn bounded(offset: u64, len: usize) -> Result<usize> {
    offset
        .checked_add(len as u64)
        .filter(|end| *end <= MAX_FILE_SIZE)
        .and_then(|end| usize::try_from(end).ok())
        .ok_or(FsError::FileTooLarge)
}

/// Zero-extend `buf` to `len` bytes without aborting on allocation failure.
fn grow(buf: &mut Vec<u8>, len: usize) -> Result<()> {
    if let Some(extra) = len.checked_sub(buf.len()).filter(|n| *n > 0) {
        buf.try_reserve(extra).map_err(|_| FsError::NoSpace)?;
        buf.resize(len, 0);
    }
    Ok(())
}

impl Content {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    pub fn is_dirty(&self) -> bool {
        self.staging.is_some()
    }

    pub fn writer(&self) -> Option<Identity> {
        self.writer
    }

    /// Install a freshly loaded snapshot.
    pub fn fill(&mut self, data: Bytes) {
        self.cache = Some(data);
    }

    fn owns(&self, who: Identity) -> bool {
        self.writer == Some(who)
    }

    pub fn acquire_for_write(&mut self, who: Identity) -> Result<()> {
        if self.writer.is_some() && !self.owns(who) {
            return Err(FsError::ConcurrentWriteConflict);
        }
        self.writer = Some(who);
        Ok(())
    }

    /// Staging buffer, materialized from the snapshot on first use. The
    /// snapshot itself is never written through.
    fn staging_mut(&mut self) -> &mut Vec<u8> {
        let cache = &self.cache;
        self.staging
            .get_or_insert_with(|| cache.as_ref().map(|c| c.to_vec()).unwrap_or_default())
    }

    pub fn write(&mut self, who: Identity, data: &[u8], offset: u64) -> Result<usize> {
        if !self.owns(who) {
            return Err(FsError::PermissionDenied);
        }
        if data.is_empty() {
            return Ok(0);
        }
        let end = bounded(offset, data.len())?;
        let start = end - data.len();
        let staging = self.staging_mut();
        grow(staging, end)?;
        staging[start..end].copy_from_slice(data);
        Ok(data.len())
    }

    /// The owning writer sees its own pending edits; everyone else sees the
    /// last committed snapshot.
    pub fn read(&self, who: Identity, offset: u64, size: usize) -> Bytes {
        match (&self.staging, &self.cache) {
            (Some(staging), _) if self.owns(who) => {
                Bytes::copy_from_slice(&staging[window(staging.len(), offset, size)])
            }
            (_, Some(cache)) => cache.slice(window(cache.len(), offset, size)),
            (_, None) => Bytes::new(),
        }
    }

    /// Snapshot of the pending content, if any, for draining to the backend.
    pub fn staged(&self) -> Option<Bytes> {
        self.staging.as_deref().map(Bytes::copy_from_slice)
    }

    /// Record that `drained` reached the backend. The owner's view becomes
    /// the new snapshot; the staging buffer is dropped either way.
    pub fn commit(&mut self, who: Identity, drained: Bytes) {
        self.staging = None;
        if self.owns(who) {
            self.cache = Some(drained);
        }
    }

    /// Resize the effective content to `len`, zero-filling on growth. Only
    /// the current writer may truncate.
    pub fn truncate(&mut self, who: Identity, len: u64) -> Result<()> {
        if !self.owns(who) {
            return Err(FsError::ConcurrentWriteConflict);
        }
        let len = bounded(len, 0)?;
        let staging = self.staging_mut();
        if len <= staging.len() {
            staging.truncate(len);
            Ok(())
        } else {
            grow(staging, len)
        }
    }

    /// Drop write ownership held by `who`. [`Identity::Admin`] clears it
    /// whoever holds it.
    pub fn release(&mut self, who: Identity) {
        if who == Identity::Admin || self.owns(who) {
            self.writer = None;
        }
    }

    /// Size as reported by stat: pending content when there is any.
    pub fn len(&self) -> u64 {
        match (&self.staging, &self.cache) {
            (Some(staging), _) => staging.len() as u64,
            (None, cache) => cache.as_ref().map_or(0, |c| c.len() as u64),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
