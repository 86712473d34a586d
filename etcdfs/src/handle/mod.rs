// Copyright (C) 2024 rk8s authors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Open-file state: one [`FileHandle`] per live path, shared by every opener
//! of that path, indexed by the [`HandleTable`].

mod content;
mod table;

use std::future::Future;
use std::time::SystemTime;

use bytes::Bytes;
use tokio::sync::Mutex;

pub use content::Content;
pub use table::HandleTable;

use crate::error::Result;

pub const FILE_PERM: u16 = 0o666;
pub const DIR_PERM: u16 = 0o777;
pub const DIR_SIZE: u64 = 4096;
/// Largest file content a handle will stage. Whole values travel in one
/// etcd request, so anything near this is already far past what a server
/// accepts with default limits.
pub const MAX_FILE_SIZE: u64 = 64 * 1024 * 1024;

/// Who is acting on a handle. Write ownership is keyed by this.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Identity {
    Process(u32),
    /// Handle teardown; clears ownership regardless of holder.
    Admin,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Owner {
    pub uid: u32,
    pub gid: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileType {
    File,
    Dir,
}

#[derive(Clone, Debug)]
pub struct FileStat {
    pub ino: u64,
    pub kind: FileType,
    pub size: u64,
    pub perm: u16,
    pub uid: u32,
    pub gid: u32,
    pub time: SystemTime,
}

#[derive(Debug)]
pub struct FileHandle {
    path: String,
    id: u64,
    is_dir: bool,
    owner: Owner,
    created: SystemTime,
    content: Mutex<Content>,
}

impl FileHandle {
    pub(crate) fn new(path: String, id: u64, is_dir: bool, owner: Owner) -> Self {
        Self {
            path,
            id,
            is_dir,
            owner,
            created: SystemTime::now(),
            content: Mutex::new(Content::new()),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    pub async fn stat(&self) -> FileStat {
        let (kind, size, perm) = if self.is_dir {
            (FileType::Dir, DIR_SIZE, DIR_PERM)
        } else {
            (FileType::File, self.content.lock().await.len(), FILE_PERM)
        };
        FileStat {
            ino: self.id,
            kind,
            size,
            perm,
            uid: self.owner.uid,
            gid: self.owner.gid,
            time: self.created,
        }
    }

    /// Populate the read cache with `loader` unless it is already filled.
    /// The handle lock is held across the load so concurrent openers trigger
    /// a single fetch.
    pub async fn read_through<F, Fut>(&self, loader: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>>>,
    {
        let mut content = self.content.lock().await;
        if content.is_cached() {
            return Ok(());
        }
        let data = loader().await?;
        content.fill(Bytes::from(data));
        Ok(())
    }

    pub async fn acquire_for_write(&self, who: Identity) -> Result<()> {
        self.content.lock().await.acquire_for_write(who)
    }

    pub async fn write(&self, who: Identity, data: &[u8], offset: u64) -> Result<usize> {
        self.content.lock().await.write(who, data, offset)
    }

    pub async fn read(&self, who: Identity, offset: u64, size: usize) -> Bytes {
        self.content.lock().await.read(who, offset, size)
    }

    pub async fn truncate(&self, who: Identity, len: u64) -> Result<()> {
        self.content.lock().await.truncate(who, len)
    }

    pub async fn release(&self, who: Identity) {
        self.content.lock().await.release(who)
    }

    pub async fn writer(&self) -> Option<Identity> {
        self.content.lock().await.writer()
    }

    /// Push pending writes through `drain`. Without pending writes nothing
    /// happens. A failed drain keeps the staging buffer for a later retry.
    pub async fn flush<F, Fut>(&self, who: Identity, drain: F) -> Result<()>
    where
        F: FnOnce(Bytes) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut content = self.content.lock().await;
        let Some(staged) = content.staged() else {
            return Ok(());
        };
        drain(staged.clone()).await?;
        content.commit(who, staged);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::FsError;

    const W: Identity = Identity::Process(7);

    fn file(path: &str) -> FileHandle {
        FileHandle::new(path.into(), 3, false, Owner { uid: 1000, gid: 100 })
    }

    #[tokio::test]
    async fn test_read_through_loads_once() {
        let h = file("/f");
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            h.read_through(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(b"hello".to_vec())
            })
            .await
            .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.read(W, 0, 16).await, &b"hello"[..]);
    }

    #[tokio::test]
    async fn test_failed_read_through_can_be_retried() {
        let h = file("/f");
        let err = h
            .read_through(|| async { Err(FsError::NotExist) })
            .await
            .unwrap_err();
        assert_eq!(err, FsError::NotExist);
        h.read_through(|| async { Ok(b"x".to_vec()) }).await.unwrap();
        assert_eq!(h.stat().await.size, 1);
    }

    #[tokio::test]
    async fn test_flush_drains_once() {
        let h = file("/f");
        h.acquire_for_write(W).await.unwrap();
        h.write(W, b"abc", 0).await.unwrap();

        let drained = Arc::new(std::sync::Mutex::new(Vec::new()));
        for _ in 0..2 {
            let sink = drained.clone();
            h.flush(W, |data| async move {
                sink.lock().unwrap().push(data);
                Ok(())
            })
            .await
            .unwrap();
        }
        assert_eq!(*drained.lock().unwrap(), [Bytes::from_static(b"abc")]);
        assert_eq!(h.read(Identity::Process(8), 0, 8).await, &b"abc"[..]);
    }

    #[tokio::test]
    async fn test_failed_flush_keeps_staging() {
        let h = file("/f");
        h.acquire_for_write(W).await.unwrap();
        h.write(W, b"abc", 0).await.unwrap();

        let err = h
            .flush(W, |_| async { Err(FsError::BackendUnavailable("down".into())) })
            .await;
        assert!(err.is_err());
        assert_eq!(h.read(W, 0, 8).await, &b"abc"[..]);
        assert!(h.read(Identity::Process(8), 0, 8).await.is_empty());

        h.flush(W, |_| async { Ok(()) }).await.unwrap();
        assert_eq!(h.read(Identity::Process(8), 0, 8).await, &b"abc"[..]);
    }

    #[tokio::test]
    async fn test_stat() {
        let h = file("/f");
        let st = h.stat().await;
        assert_eq!((st.ino, st.kind, st.size, st.perm), (3, FileType::File, 0, FILE_PERM));
        assert_eq!((st.uid, st.gid), (1000, 100));

        let d = FileHandle::new("/d".into(), 4, true, Owner::default());
        let st = d.stat().await;
        assert_eq!((st.kind, st.size, st.perm), (FileType::Dir, DIR_SIZE, DIR_PERM));
    }
}
