// Copyright (C) 2024 rk8s authors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Path-level operations over a flat key space.
//!
//! A directory has no representation of its own: it exists when the key
//! `path + "/"` (the marker, empty value) exists, or when any key lives under
//! that prefix. Files are plain keys without a trailing slash.

use tokio::sync::Mutex;

use super::{KvStore, StoreError};
use crate::error::{FsError, Result};

/// Marker key of the directory at `path`.
pub fn marker(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}

fn backend_err(err: StoreError) -> FsError {
    match err {
        StoreError::NotFound => FsError::NotExist,
        other => FsError::BackendUnavailable(other.to_string()),
    }
}

pub struct KvAdapter<S> {
    store: S,
    // Held across every check-then-put (create, mkdir, rename) so a path
    // never ends up as both a file and a directory marker.
    namespace_lock: Mutex<()>,
}

impl<S: KvStore> KvAdapter<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            namespace_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create an empty file. Fails if a file or a directory already lives at
    /// `path`.
    pub async fn create(&self, path: &str) -> Result<()> {
        let _guard = self.namespace_lock.lock().await;
        if self.store.count_key(path).await.map_err(backend_err)? > 0 {
            return Err(FsError::AlreadyExists);
        }
        if self.store.count_prefix(&marker(path)).await.map_err(backend_err)? > 0 {
            return Err(FsError::AlreadyExists);
        }
        self.store.put(path, &[]).await.map_err(backend_err)
    }

    pub async fn mkdir_marker(&self, path: &str) -> Result<()> {
        let _guard = self.namespace_lock.lock().await;
        if self.store.count_key(path).await.map_err(backend_err)? > 0 {
            return Err(FsError::NotADirectory);
        }
        let marker = marker(path);
        if self.store.count_prefix(&marker).await.map_err(backend_err)? > 0 {
            return Err(FsError::AlreadyExists);
        }
        self.store.put(&marker, &[]).await.map_err(backend_err)
    }

    pub async fn read(&self, path: &str) -> Result<Vec<u8>> {
        match self.store.get(path).await {
            Ok(Some(value)) => Ok(value),
            Ok(None) => Err(FsError::NotExist),
            Err(e) => Err(backend_err(e)),
        }
    }

    pub async fn write(&self, path: &str, value: &[u8]) -> Result<()> {
        self.store.put(path, value).await.map_err(backend_err)
    }

    /// Delete a single key. A missing key is not an error.
    pub async fn remove(&self, path: &str) -> Result<()> {
        match self.store.delete(path).await {
            Ok(()) | Err(StoreError::NotFound) => Ok(()),
            Err(e) => Err(backend_err(e)),
        }
    }

    /// Delete `path` and everything under `path/`.
    pub async fn remove_subtree(&self, path: &str) -> Result<()> {
        self.remove(path).await?;
        match self.store.delete_prefix(&marker(path)).await {
            Ok(()) | Err(StoreError::NotFound) => Ok(()),
            Err(e) => Err(backend_err(e)),
        }
    }

    /// Every key below `path/`, at any depth. The marker of `path` itself is
    /// left out.
    pub async fn list_children(&self, path: &str) -> Result<Vec<String>> {
        let marker = marker(path);
        let keys = self
            .store
            .keys_with_prefix(&marker)
            .await
            .map_err(backend_err)?;
        Ok(keys.into_iter().filter(|k| *k != marker).collect())
    }

    /// Root, or anything that lives under `path/`.
    pub async fn is_directory(&self, path: &str) -> bool {
        path == "/" || self.dir_exists(path).await
    }

    pub async fn file_exists(&self, path: &str) -> bool {
        self.answer(self.store.count_key(path).await, path)
    }

    pub async fn dir_exists(&self, path: &str) -> bool {
        self.answer(self.store.count_prefix(&marker(path)).await, path)
    }

    fn answer(&self, count: std::result::Result<u64, StoreError>, path: &str) -> bool {
        match count {
            Ok(n) => n > 0,
            Err(e) => {
                warn!("existence check for {path} failed: {e}");
                false
            }
        }
    }

    /// Copy `old` to `new`. The source key is left in place.
    pub async fn rename_file(&self, old: &str, new: &str) -> Result<()> {
        let _guard = self.namespace_lock.lock().await;
        if self.dir_exists(new).await {
            return Err(FsError::DuplicateDestination);
        }
        let content = self.read(old).await?;
        self.write(new, &content).await
    }

    pub async fn close(&self) {
        self.store.close().await;
    }
}
