// Copyright (C) 2024 rk8s authors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Path-based filesystem over the KV adapter: resolves handles, drives the
//! content engine and keeps the handle table consistent with the backend.

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;

use super::path::{child_name, join, normalize, rebase};
use crate::backend::{KvAdapter, KvStore};
use crate::error::{FsError, Result};
use crate::handle::{FileHandle, FileStat, HandleTable, Identity, Owner};

/// The process issuing a request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Caller {
    pub uid: u32,
    pub gid: u32,
    pub pid: u32,
}

impl Caller {
    pub fn new(uid: u32, gid: u32, pid: u32) -> Self {
        Self { uid, gid, pid }
    }

    pub fn identity(&self) -> Identity {
        Identity::Process(self.pid)
    }

    pub fn owner(&self) -> Owner {
        Owner {
            uid: self.uid,
            gid: self.gid,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OpenIntent {
    pub create: bool,
    pub write: bool,
}

impl OpenIntent {
    pub fn from_flags(flags: u32) -> Self {
        let flags = flags as i32;
        let access = flags & libc::O_ACCMODE;
        Self {
            create: flags & (libc::O_CREAT | libc::O_TRUNC | libc::O_EXCL) != 0,
            write: access == libc::O_WRONLY || access == libc::O_RDWR,
        }
    }
}

#[derive(Clone, Debug)]
pub struct DirEntry {
    pub name: String,
    pub stat: FileStat,
}

pub struct EtcdFs<S> {
    backend: KvAdapter<S>,
    handles: HandleTable,
}

impl<S: KvStore> EtcdFs<S> {
    pub fn new(backend: KvAdapter<S>) -> Self {
        Self {
            backend,
            handles: HandleTable::new(),
        }
    }

    pub fn backend(&self) -> &KvAdapter<S> {
        &self.backend
    }

    pub fn handles(&self) -> &HandleTable {
        &self.handles
    }

    pub async fn init(&self, caller: &Caller) -> Arc<FileHandle> {
        self.opendir(caller, "/")
    }

    pub async fn destroy(&self) {
        self.backend.close().await;
    }

    async fn read_through(&self, handle: &FileHandle) -> Result<()> {
        handle
            .read_through(|| self.backend.read(handle.path()))
            .await
    }

    /// Handle by id, falling back to the path index.
    fn resolve(&self, path: Option<&str>, fh: Option<u64>) -> Option<Arc<FileHandle>> {
        fh.and_then(|id| self.handles.lookup_by_id(id))
            .or_else(|| path.and_then(|p| self.handles.lookup_by_path(&normalize(p))))
    }

    fn resolve_or_missing(&self, path: Option<&str>, fh: Option<u64>) -> Result<Arc<FileHandle>> {
        self.resolve(path, fh).ok_or(FsError::NotExist)
    }

    async fn discard(&self, removed: Vec<Arc<FileHandle>>) {
        for handle in removed {
            handle.release(Identity::Admin).await;
        }
    }

    /// Drop `who`'s ownership and one table reference.
    async fn release_handle(&self, who: Identity, handle: &FileHandle) {
        handle.release(who).await;
        if let Some(removed) = self.handles.release(handle.path(), handle.id()) {
            removed.release(Identity::Admin).await;
        }
    }

    async fn reject_directory(&self, path: Option<&str>, handle: Option<&FileHandle>) -> Result<()> {
        if handle.is_some_and(FileHandle::is_dir) {
            return Err(FsError::IsADirectory);
        }
        if let Some(path) = path {
            let path = normalize(path);
            if path == "/" || self.backend.dir_exists(&path).await {
                return Err(FsError::IsADirectory);
            }
        }
        Ok(())
    }

    pub async fn mkdir(&self, caller: &Caller, path: &str) -> Result<FileStat> {
        let path = normalize(path);
        match self.backend.mkdir_marker(&path).await {
            Ok(()) => {}
            Err(FsError::NotADirectory) => return Err(FsError::AlreadyExists),
            Err(e) => return Err(e),
        }
        Ok(self.transient_stat(caller, &path, true).await)
    }

    /// Remove the directory and everything below it.
    pub async fn rmdir(&self, path: &str) -> Result<()> {
        let path = normalize(path);
        if path == "/" {
            return Err(FsError::PermissionDenied);
        }
        let result = self.backend.remove_subtree(&path).await;
        self.discard(self.handles.purge_subtree(&path)).await;
        result
    }

    pub async fn rename(&self, old: &str, new: &str) -> Result<()> {
        let (old, new) = (normalize(old), normalize(new));
        if old == new {
            return Ok(());
        }
        let is_dir = match self.handles.lookup_by_path(&old) {
            Some(handle) => handle.is_dir(),
            None if self.backend.dir_exists(&old).await => true,
            None if self.backend.file_exists(&old).await => false,
            None => return Err(FsError::NotExist),
        };
        debug!("rename {old} -> {new} (dir: {is_dir})");
        if is_dir {
            self.rename_dir(&old, &new).await
        } else {
            self.rename_file(&old, &new).await
        }
    }

    async fn rename_file(&self, old: &str, new: &str) -> Result<()> {
        self.backend.rename_file(old, new).await?;
        let removed = self.backend.remove(old).await;
        self.discard(self.handles.purge(old, None)).await;
        self.discard(self.handles.purge(new, None)).await;
        removed
    }

    /// Copy every key below `old` under `new`, then drop `old`. The listing
    /// is flat, nested directories move along with their markers.
    async fn rename_dir(&self, old: &str, new: &str) -> Result<()> {
        match self.backend.mkdir_marker(new).await {
            Ok(()) => {}
            Err(FsError::AlreadyExists | FsError::NotADirectory) => {
                return Err(FsError::DuplicateDestination);
            }
            Err(e) => return Err(e),
        }
        for key in self.backend.list_children(old).await? {
            let Some(target) = rebase(&key, old, new) else {
                continue;
            };
            self.backend.rename_file(&key, &target).await?;
        }
        let removed = self.backend.remove_subtree(old).await;
        self.discard(self.handles.purge_subtree(old)).await;
        self.discard(self.handles.purge_subtree(new)).await;
        removed
    }

    pub async fn create(&self, caller: &Caller, path: &str) -> Result<Arc<FileHandle>> {
        let path = normalize(path);
        self.backend.create(&path).await?;
        let handle = self.handles.acquire(&path, false, caller.owner());
        handle.read_through(|| async { Ok(Vec::new()) }).await?;
        Ok(handle)
    }

    pub async fn open(&self, caller: &Caller, path: &str, flags: u32) -> Result<Arc<FileHandle>> {
        let path = normalize(path);
        let intent = OpenIntent::from_flags(flags);
        if intent.create {
            match self.backend.create(&path).await {
                Ok(()) | Err(FsError::AlreadyExists) => {}
                Err(e) => return Err(e),
            }
        }

        if intent.write {
            let is_dir = self.backend.dir_exists(&path).await;
            let handle = self.handles.acquire(&path, is_dir, caller.owner());
            if !is_dir {
                if let Err(e) = self.read_through(&handle).await {
                    warn!("open {path}: read-through failed: {e}");
                }
            }
            return Ok(handle);
        }

        if !self.backend.file_exists(&path).await {
            return Err(FsError::NotExist);
        }
        let handle = self.handles.acquire(&path, false, caller.owner());
        if let Err(e) = self.read_through(&handle).await {
            self.release_handle(caller.identity(), &handle).await;
            return Err(e);
        }
        Ok(handle)
    }

    pub fn opendir(&self, caller: &Caller, path: &str) -> Arc<FileHandle> {
        self.handles.acquire(&normalize(path), true, caller.owner())
    }

    /// Close a directory handle. The root handle outlives every close.
    pub async fn releasedir(&self, fh: u64) {
        let Some(handle) = self.handles.lookup_by_id(fh) else {
            return;
        };
        if handle.path() == "/" {
            return;
        }
        if let Some(removed) = self.handles.release(handle.path(), fh) {
            removed.release(Identity::Admin).await;
        }
    }

    /// Stat from a fresh, unregistered handle, loaded from the backend.
    async fn transient_stat(&self, caller: &Caller, path: &str, is_dir: bool) -> FileStat {
        let handle = self.handles.transient(path, is_dir, caller.owner());
        if !is_dir {
            if let Err(e) = self.read_through(&handle).await {
                warn!("stat {path}: read-through failed: {e}");
            }
        }
        handle.stat().await
    }

    async fn stat_from_backend(&self, caller: &Caller, path: &str) -> Result<FileStat> {
        let is_dir = if self.backend.is_directory(path).await {
            true
        } else if self.backend.file_exists(path).await {
            false
        } else {
            return Err(FsError::NotExist);
        };
        Ok(self.transient_stat(caller, path, is_dir).await)
    }

    pub async fn getattr(
        &self,
        caller: &Caller,
        path: Option<&str>,
        fh: Option<u64>,
    ) -> Result<FileStat> {
        if let Some(handle) = self.resolve(path, fh) {
            return Ok(handle.stat().await);
        }
        let path = path.map(normalize).ok_or(FsError::NotExist)?;
        self.stat_from_backend(caller, &path).await
    }

    pub async fn read(
        &self,
        caller: &Caller,
        path: Option<&str>,
        fh: Option<u64>,
        offset: u64,
        size: u32,
    ) -> Result<Bytes> {
        let handle = self.resolve(path, fh);
        self.reject_directory(path, handle.as_deref()).await?;
        let handle = handle.ok_or(FsError::NotExist)?;
        Ok(handle.read(caller.identity(), offset, size as usize).await)
    }

    /// Stage `data` at `offset`. The caller becomes the handle's writer and
    /// stays so until flush or release.
    pub async fn write(
        &self,
        caller: &Caller,
        path: Option<&str>,
        fh: Option<u64>,
        offset: u64,
        data: &[u8],
    ) -> Result<usize> {
        let handle = self.resolve(path, fh);
        self.reject_directory(path, handle.as_deref()).await?;
        let handle = handle.ok_or(FsError::NotExist)?;
        let who = caller.identity();
        handle.acquire_for_write(who).await?;
        handle.write(who, data, offset).await
    }

    async fn flush_handle(&self, who: Identity, handle: &FileHandle) -> Result<()> {
        handle.acquire_for_write(who).await?;
        let result = handle
            .flush(who, |data| async move {
                self.backend.write(handle.path(), &data).await
            })
            .await;
        handle.release(who).await;
        if let Err(e) = &result {
            error!("flush {}: {e}", handle.path());
        }
        result
    }

    pub async fn flush(&self, caller: &Caller, path: Option<&str>, fh: Option<u64>) -> Result<()> {
        let handle = self.resolve_or_missing(path, fh)?;
        if handle.is_dir() {
            return Ok(());
        }
        self.flush_handle(caller.identity(), &handle).await
    }

    /// Close one reference. Unknown handles are ignored.
    pub async fn release(&self, caller: &Caller, path: Option<&str>, fh: Option<u64>) {
        if let Some(handle) = self.resolve(path, fh) {
            self.release_handle(caller.identity(), &handle).await;
        }
    }

    /// Resize the file's pending content. Through an open handle the caller
    /// keeps write ownership; a bare path truncate is committed right away.
    pub async fn truncate(
        &self,
        caller: &Caller,
        path: Option<&str>,
        fh: Option<u64>,
        size: u64,
    ) -> Result<()> {
        let who = caller.identity();
        if let Some(handle) = fh.and_then(|id| self.handles.lookup_by_id(id)) {
            self.reject_directory(None, Some(handle.as_ref())).await?;
            handle.acquire_for_write(who).await?;
            return handle.truncate(who, size).await;
        }

        let path = path.map(normalize).ok_or(FsError::NotExist)?;
        self.reject_directory(Some(path.as_str()), None).await?;
        let handle = self.open(caller, &path, libc::O_RDONLY as u32).await?;
        let result = async {
            handle.acquire_for_write(who).await?;
            handle.truncate(who, size).await?;
            self.flush_handle(who, &handle).await
        }
        .await;
        self.release_handle(who, &handle).await;
        result
    }

    pub async fn unlink(&self, path: &str) -> Result<()> {
        let path = normalize(path);
        let result = self.backend.remove(&path).await;
        self.discard(self.handles.purge(&path, None)).await;
        result
    }

    /// Immediate children of `path`, each with a synthesized stat.
    pub async fn readdir(&self, caller: &Caller, path: &str) -> Result<Vec<DirEntry>> {
        let path = normalize(path);
        let keys = self.backend.list_children(&path).await?;

        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for key in &keys {
            let (name, is_dir) = child_name(&path, key);
            if name.is_empty() || !seen.insert(name) {
                continue;
            }
            let child = join(&path, name);
            let stat = match self.handles.lookup_by_path(&child) {
                Some(open) => open.stat().await,
                None => self.transient_stat(caller, &child, is_dir).await,
            };
            entries.push(DirEntry {
                name: name.to_string(),
                stat,
            });
        }
        Ok(entries)
    }
}
