// Copyright (C) 2024 rk8s authors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! FUSE adapter.
//!
//! Implements the rfuse3 raw `Filesystem` for [`EtcdFuse`], which pairs an
//! [`EtcdFs`] with the [`InodeMap`] translating kernel inodes into paths.
//! [`FsError`]s become errno values here and nowhere else.

pub mod inode;
pub mod mount;

use std::ffi::{OsStr, OsString};
use std::num::NonZeroU32;
use std::pin::Pin;
use std::time::{Duration, SystemTime};

use futures_util::stream::{self, Stream};
use rfuse3::raw::prelude::*;
use rfuse3::{Errno, Result as FuseResult, Timestamp};

use crate::backend::KvStore;
use crate::error::FsError;
use crate::handle::{FILE_PERM, FileStat, FileType as StatKind};
use crate::vfs::path::{join, parent as parent_path};
use crate::vfs::{Caller, DirEntry, EtcdFs};

pub use inode::{InodeMap, ROOT_INO};
pub use mount::{MountConfig, mount_etcdfs, mount_options};

const TTL: Duration = Duration::from_secs(1);
const MAX_WRITE: u32 = 1024 * 1024;
const BLOCK_SIZE: u32 = 4096;

// Bypass the page cache: readers and the writer of one handle must see
// different content until flush.
const FOPEN_DIRECT_IO: u32 = 1 << 0;

// Inode reported by readdir for entries the kernel has not looked up yet.
const UNKNOWN_INO: u64 = 0xffff_ffff;

impl From<FsError> for Errno {
    fn from(e: FsError) -> Self {
        Errno::from(e.errno())
    }
}

fn caller(req: &Request) -> Caller {
    Caller::new(req.uid, req.gid, req.pid)
}

fn utf8(name: &OsStr) -> FuseResult<&str> {
    name.to_str().ok_or_else(|| Errno::from(libc::EINVAL))
}

fn file_type(kind: StatKind) -> FileType {
    match kind {
        StatKind::File => FileType::RegularFile,
        StatKind::Dir => FileType::Directory,
    }
}

fn to_attr(ino: u64, stat: &FileStat) -> FileAttr {
    let time = Timestamp::from(stat.time);
    FileAttr {
        ino,
        size: stat.size,
        blocks: stat.size.div_ceil(512),
        atime: time,
        mtime: time,
        ctime: time,
        #[cfg(target_os = "macos")]
        crtime: time,
        kind: file_type(stat.kind),
        perm: stat.perm,
        nlink: if stat.kind == StatKind::Dir { 2 } else { 1 },
        uid: stat.uid,
        gid: stat.gid,
        rdev: 0,
        #[cfg(target_os = "macos")]
        flags: 0,
        blksize: BLOCK_SIZE,
    }
}

/// The mounted filesystem: path operations plus kernel inode bookkeeping.
pub struct EtcdFuse<S> {
    fs: EtcdFs<S>,
    inodes: InodeMap,
}

impl<S> EtcdFuse<S>
where
    S: KvStore + 'static,
{
    pub fn new(fs: EtcdFs<S>) -> Self {
        Self {
            fs,
            inodes: InodeMap::new(),
        }
    }

    pub fn fs(&self) -> &EtcdFs<S> {
        &self.fs
    }

    pub fn inodes(&self) -> &InodeMap {
        &self.inodes
    }

    fn path_of(&self, ino: u64) -> FuseResult<String> {
        self.inodes.path_of(ino).ok_or_else(|| libc::ENOENT.into())
    }

    fn child_of(&self, parent: u64, name: &OsStr) -> FuseResult<String> {
        Ok(join(&self.path_of(parent)?, utf8(name)?))
    }

    /// Entry reply for `path`; the kernel now holds one more lookup on it.
    fn entry(&self, path: &str, stat: &FileStat) -> ReplyEntry {
        let ino = self.inodes.remember(path);
        ReplyEntry {
            ttl: TTL,
            attr: to_attr(ino, stat),
            generation: 0,
        }
    }

    async fn attr(&self, req: &Request, ino: u64, fh: Option<u64>) -> FuseResult<FileAttr> {
        let path = self.inodes.path_of(ino);
        let stat = self.fs.getattr(&caller(req), path.as_deref(), fh).await?;
        Ok(to_attr(ino, &stat))
    }

    /// Path, stat and children of the directory `ino`.
    async fn listing(
        &self,
        req: &Request,
        ino: u64,
    ) -> FuseResult<(String, FileStat, Vec<DirEntry>)> {
        let path = self.path_of(ino)?;
        let who = caller(req);
        let stat = self.fs.getattr(&who, Some(path.as_str()), None).await?;
        if stat.kind != StatKind::Dir {
            return Err(libc::ENOTDIR.into());
        }
        let children = self.fs.readdir(&who, &path).await?;
        Ok((path, stat, children))
    }

    fn parent_ino(&self, path: &str) -> u64 {
        self.inodes.ino_of(parent_path(path)).unwrap_or(ROOT_INO)
    }
}

impl<S> Filesystem for EtcdFuse<S>
where
    S: KvStore + 'static,
{
    type DirEntryStream<'a>
        = Pin<Box<dyn Stream<Item = FuseResult<DirectoryEntry>> + Send + 'a>>
    where
        Self: 'a;

    type DirEntryPlusStream<'a>
        = Pin<Box<dyn Stream<Item = FuseResult<DirectoryEntryPlus>> + Send + 'a>>
    where
        Self: 'a;

    async fn init(&self, req: Request) -> FuseResult<ReplyInit> {
        let root = self.fs.init(&caller(&req)).await;
        info!("filesystem initialised, root handle {}", root.id());
        Ok(ReplyInit {
            max_write: NonZeroU32::new(MAX_WRITE).unwrap_or(NonZeroU32::MIN),
        })
    }

    async fn destroy(&self, _req: Request) {
        info!("filesystem destroyed, closing backend");
        self.fs.destroy().await;
    }

    async fn lookup(&self, req: Request, parent: u64, name: &OsStr) -> FuseResult<ReplyEntry> {
        let path = self.child_of(parent, name)?;
        debug!("lookup {path}");
        let stat = self.fs.getattr(&caller(&req), Some(path.as_str()), None).await?;
        Ok(self.entry(&path, &stat))
    }

    async fn forget(&self, _req: Request, inode: u64, nlookup: u64) {
        self.inodes.forget(inode, nlookup);
    }

    async fn batch_forget(&self, _req: Request, inodes: &[(u64, u64)]) {
        for (inode, nlookup) in inodes {
            self.inodes.forget(*inode, *nlookup);
        }
    }

    async fn getattr(
        &self,
        req: Request,
        inode: u64,
        fh: Option<u64>,
        _flags: u32,
    ) -> FuseResult<ReplyAttr> {
        Ok(ReplyAttr {
            ttl: TTL,
            attr: self.attr(&req, inode, fh).await?,
        })
    }

    /// Only size changes have an effect; mode, ownership and times are
    /// accepted and ignored.
    async fn setattr(
        &self,
        req: Request,
        inode: u64,
        fh: Option<u64>,
        set_attr: SetAttr,
    ) -> FuseResult<ReplyAttr> {
        if let Some(size) = set_attr.size {
            let path = self.inodes.path_of(inode);
            debug!("truncate {path:?} fh={fh:?} to {size}");
            self.fs
                .truncate(&caller(&req), path.as_deref(), fh, size)
                .await?;
        }
        Ok(ReplyAttr {
            ttl: TTL,
            attr: self.attr(&req, inode, fh).await?,
        })
    }

    async fn mknod(
        &self,
        req: Request,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _rdev: u32,
    ) -> FuseResult<ReplyEntry> {
        let path = self.child_of(parent, name)?;
        debug!("mknod {path} ignored");
        let stat = FileStat {
            ino: 0,
            kind: StatKind::File,
            size: 0,
            perm: FILE_PERM,
            uid: req.uid,
            gid: req.gid,
            time: SystemTime::now(),
        };
        Ok(self.entry(&path, &stat))
    }

    async fn mkdir(
        &self,
        req: Request,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
    ) -> FuseResult<ReplyEntry> {
        let path = self.child_of(parent, name)?;
        debug!("mkdir {path}");
        let stat = self.fs.mkdir(&caller(&req), &path).await?;
        Ok(self.entry(&path, &stat))
    }

    async fn unlink(&self, _req: Request, parent: u64, name: &OsStr) -> FuseResult<()> {
        let path = self.child_of(parent, name)?;
        debug!("unlink {path}");
        self.fs.unlink(&path).await?;
        self.inodes.remove_subtree(&path);
        Ok(())
    }

    async fn rmdir(&self, _req: Request, parent: u64, name: &OsStr) -> FuseResult<()> {
        let path = self.child_of(parent, name)?;
        debug!("rmdir {path}");
        self.fs.rmdir(&path).await?;
        self.inodes.remove_subtree(&path);
        Ok(())
    }

    async fn rename(
        &self,
        _req: Request,
        parent: u64,
        name: &OsStr,
        new_parent: u64,
        new_name: &OsStr,
    ) -> FuseResult<()> {
        let old = self.child_of(parent, name)?;
        let new = self.child_of(new_parent, new_name)?;
        self.fs.rename(&old, &new).await?;
        if old != new {
            self.inodes.rename(&old, &new);
        }
        Ok(())
    }

    async fn open(&self, req: Request, inode: u64, flags: u32) -> FuseResult<ReplyOpen> {
        let path = self.path_of(inode)?;
        debug!("open {path} flags={flags:#o}");
        let handle = self.fs.open(&caller(&req), &path, flags).await?;
        Ok(ReplyOpen {
            fh: handle.id(),
            flags: if handle.is_dir() { 0 } else { FOPEN_DIRECT_IO },
        })
    }

    async fn read(
        &self,
        req: Request,
        inode: u64,
        fh: u64,
        offset: u64,
        size: u32,
    ) -> FuseResult<ReplyData> {
        let path = self.inodes.path_of(inode);
        let data = self
            .fs
            .read(&caller(&req), path.as_deref(), Some(fh), offset, size)
            .await?;
        Ok(ReplyData { data })
    }

    #[allow(clippy::too_many_arguments)]
    async fn write(
        &self,
        req: Request,
        inode: u64,
        fh: u64,
        offset: u64,
        data: &[u8],
        _write_flags: u32,
        _flags: u32,
    ) -> FuseResult<ReplyWrite> {
        let path = self.inodes.path_of(inode);
        let written = self
            .fs
            .write(&caller(&req), path.as_deref(), Some(fh), offset, data)
            .await?;
        Ok(ReplyWrite {
            written: written as u32,
        })
    }

    /// There is no meaningful capacity for a KV store; report conservative
    /// constants.
    async fn statfs(&self, _req: Request, _inode: u64) -> FuseResult<ReplyStatFs> {
        Ok(ReplyStatFs {
            blocks: 0,
            bfree: 0,
            bavail: 0,
            files: self.inodes.len() as u64,
            ffree: u64::MAX,
            bsize: BLOCK_SIZE,
            namelen: 255,
            frsize: BLOCK_SIZE,
        })
    }

    async fn release(
        &self,
        req: Request,
        inode: u64,
        fh: u64,
        _flags: u32,
        _lock_owner: u64,
        flush: bool,
    ) -> FuseResult<()> {
        let path = self.inodes.path_of(inode);
        let who = caller(&req);
        if flush {
            if let Err(e) = self.fs.flush(&who, path.as_deref(), Some(fh)).await {
                warn!("flush on release of {path:?} failed: {e}");
            }
        }
        self.fs.release(&who, path.as_deref(), Some(fh)).await;
        Ok(())
    }

    async fn fsync(&self, _req: Request, _inode: u64, _fh: u64, _datasync: bool) -> FuseResult<()> {
        Ok(())
    }

    async fn setxattr(
        &self,
        _req: Request,
        _inode: u64,
        _name: &OsStr,
        _value: &[u8],
        _flags: u32,
        _position: u32,
    ) -> FuseResult<()> {
        Ok(())
    }

    async fn getxattr(
        &self,
        _req: Request,
        _inode: u64,
        _name: &OsStr,
        _size: u32,
    ) -> FuseResult<ReplyXAttr> {
        Err(libc::ENODATA.into())
    }

    async fn listxattr(&self, _req: Request, _inode: u64, size: u32) -> FuseResult<ReplyXAttr> {
        if size == 0 {
            Ok(ReplyXAttr::Size(0))
        } else {
            Ok(ReplyXAttr::Data(bytes::Bytes::new()))
        }
    }

    async fn removexattr(&self, _req: Request, _inode: u64, _name: &OsStr) -> FuseResult<()> {
        Ok(())
    }

    async fn flush(&self, req: Request, inode: u64, fh: u64, _lock_owner: u64) -> FuseResult<()> {
        let path = self.inodes.path_of(inode);
        debug!("flush {path:?} fh={fh}");
        Ok(self.fs.flush(&caller(&req), path.as_deref(), Some(fh)).await?)
    }

    async fn opendir(&self, req: Request, inode: u64, _flags: u32) -> FuseResult<ReplyOpen> {
        let path = self.path_of(inode)?;
        let who = caller(&req);
        let stat = self.fs.getattr(&who, Some(path.as_str()), None).await?;
        if stat.kind != StatKind::Dir {
            return Err(libc::ENOTDIR.into());
        }
        let handle = self.fs.opendir(&who, &path);
        Ok(ReplyOpen {
            fh: handle.id(),
            flags: 0,
        })
    }

    async fn readdir<'a>(
        &'a self,
        req: Request,
        parent: u64,
        _fh: u64,
        offset: i64,
    ) -> FuseResult<ReplyDirectory<Self::DirEntryStream<'a>>> {
        let (path, _, children) = self.listing(&req, parent).await?;
        debug!("readdir {path} offset={offset}");

        let mut all = Vec::with_capacity(children.len() + 2);
        all.push(DirectoryEntry {
            inode: parent,
            kind: FileType::Directory,
            name: OsString::from("."),
            offset: 1,
        });
        all.push(DirectoryEntry {
            inode: self.parent_ino(&path),
            kind: FileType::Directory,
            name: OsString::from(".."),
            offset: 2,
        });
        for (i, entry) in children.into_iter().enumerate() {
            let child = join(&path, &entry.name);
            all.push(DirectoryEntry {
                inode: self.inodes.ino_of(&child).unwrap_or(UNKNOWN_INO),
                kind: file_type(entry.stat.kind),
                name: OsString::from(entry.name),
                offset: i as i64 + 3,
            });
        }

        let entries: Vec<_> = all.into_iter().skip(offset.max(0) as usize).map(Ok).collect();
        let entries: Self::DirEntryStream<'a> = Box::pin(stream::iter(entries));
        Ok(ReplyDirectory { entries })
    }

    /// Like `readdir`, but every child entry counts as a lookup.
    async fn readdirplus<'a>(
        &'a self,
        req: Request,
        parent: u64,
        _fh: u64,
        offset: u64,
        _lock_owner: u64,
    ) -> FuseResult<ReplyDirectoryPlus<Self::DirEntryPlusStream<'a>>> {
        let (path, stat, children) = self.listing(&req, parent).await?;
        debug!("readdirplus {path} offset={offset}");

        let dir = to_attr(parent, &stat);
        let parent_ino = self.parent_ino(&path);
        let dots = [(".", parent, dir), ("..", parent_ino, dir)];
        let mut all: Vec<DirectoryEntryPlus> = dots
            .into_iter()
            .enumerate()
            .map(|(i, (name, inode, attr))| DirectoryEntryPlus {
                inode,
                generation: 0,
                kind: FileType::Directory,
                name: OsString::from(name),
                offset: i as i64 + 1,
                attr: FileAttr { ino: inode, ..attr },
                entry_ttl: TTL,
                attr_ttl: TTL,
            })
            .collect();

        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        for (i, entry) in children.into_iter().enumerate() {
            // Only entries actually sent may take a lookup reference.
            if i + 2 < start {
                continue;
            }
            let ino = self.inodes.remember(&join(&path, &entry.name));
            all.push(DirectoryEntryPlus {
                inode: ino,
                generation: 0,
                kind: file_type(entry.stat.kind),
                name: OsString::from(entry.name),
                offset: i as i64 + 3,
                attr: to_attr(ino, &entry.stat),
                entry_ttl: TTL,
                attr_ttl: TTL,
            });
        }

        let entries: Vec<_> = all
            .into_iter()
            .filter(|e| e.offset as u64 > offset)
            .map(Ok)
            .collect();
        let entries: Self::DirEntryPlusStream<'a> = Box::pin(stream::iter(entries));
        Ok(ReplyDirectoryPlus { entries })
    }

    async fn releasedir(&self, _req: Request, _inode: u64, fh: u64, _flags: u32) -> FuseResult<()> {
        self.fs.releasedir(fh).await;
        Ok(())
    }

    async fn fsyncdir(
        &self,
        _req: Request,
        _inode: u64,
        _fh: u64,
        _datasync: bool,
    ) -> FuseResult<()> {
        Ok(())
    }

    async fn access(&self, _req: Request, _inode: u64, _mask: u32) -> FuseResult<()> {
        Ok(())
    }

    async fn create(
        &self,
        req: Request,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _flags: u32,
    ) -> FuseResult<ReplyCreated> {
        let path = self.child_of(parent, name)?;
        debug!("create {path}");
        let handle = self.fs.create(&caller(&req), &path).await?;
        let ino = self.inodes.remember(&path);
        Ok(ReplyCreated {
            ttl: TTL,
            attr: to_attr(ino, &handle.stat().await),
            generation: 0,
            fh: handle.id(),
            flags: FOPEN_DIRECT_IO,
        })
    }

    async fn interrupt(&self, _req: Request, _unique: u64) -> FuseResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{KvAdapter, MemoryStore};

    fn request(pid: u32) -> Request {
        Request {
            unique: 1,
            uid: 1000,
            gid: 1000,
            pid,
        }
    }

    async fn mounted() -> EtcdFuse<MemoryStore> {
        let fuse = EtcdFuse::new(EtcdFs::new(KvAdapter::new(MemoryStore::new())));
        Filesystem::init(&fuse, request(1)).await.unwrap();
        fuse
    }

    #[test]
    fn test_fs_error_to_errno() {
        let e: Errno = FsError::NotExist.into();
        assert_eq!(e, Errno::from(libc::ENOENT));
        let e: Errno = FsError::DuplicateDestination.into();
        assert_eq!(e, Errno::from(libc::EEXIST));
        let e: Errno = FsError::FileTooLarge.into();
        assert_eq!(e, Errno::from(libc::EFBIG));
    }

    #[tokio::test]
    async fn test_attr_synthesis() {
        let fs = EtcdFs::new(KvAdapter::new(MemoryStore::new()));
        let who = Caller::new(1000, 1000, 42);
        let handle = fs.create(&who, "/f").await.unwrap();
        fs.write(&who, Some("/f"), Some(handle.id()), 0, b"hello")
            .await
            .unwrap();

        let attr = to_attr(7, &handle.stat().await);
        assert_eq!(attr.kind, FileType::RegularFile);
        assert_eq!((attr.ino, attr.size, attr.blocks, attr.perm), (7, 5, 1, 0o666));
        assert_eq!((attr.uid, attr.gid, attr.nlink), (1000, 1000, 1));

        let dir = to_attr(8, &fs.mkdir(&who, "/d").await.unwrap());
        assert_eq!(dir.kind, FileType::Directory);
        assert_eq!((dir.size, dir.perm, dir.nlink), (4096, 0o777, 2));
    }

    #[tokio::test]
    async fn test_inode_round_trip() {
        let fuse = mounted().await;
        let req = request(10);

        let d = Filesystem::mkdir(&fuse, req, ROOT_INO, OsStr::new("d"), 0o755, 0)
            .await
            .unwrap();
        let created = Filesystem::create(&fuse, req, d.attr.ino, OsStr::new("f"), 0o644, 0)
            .await
            .unwrap();
        let f = created.attr.ino;
        assert_eq!(fuse.inodes().path_of(f).as_deref(), Some("/d/f"));

        let written = Filesystem::write(&fuse, req, f, created.fh, 0, b"hello", 0, 0)
            .await
            .unwrap();
        assert_eq!(written.written, 5);
        Filesystem::release(&fuse, req, f, created.fh, 0, 0, true)
            .await
            .unwrap();
        assert_eq!(fuse.fs().backend().read("/d/f").await.unwrap(), b"hello");

        let looked = Filesystem::lookup(&fuse, req, d.attr.ino, OsStr::new("f"))
            .await
            .unwrap();
        assert_eq!((looked.attr.ino, looked.attr.size), (f, 5));
        let err = Filesystem::lookup(&fuse, req, d.attr.ino, OsStr::new("nope"))
            .await
            .unwrap_err();
        assert_eq!(err, Errno::from(libc::ENOENT));

        let opened = Filesystem::open(&fuse, req, f, libc::O_RDONLY as u32)
            .await
            .unwrap();
        assert_eq!(opened.flags, FOPEN_DIRECT_IO);
        let data = Filesystem::read(&fuse, req, f, opened.fh, 1, 3).await.unwrap();
        assert_eq!(data.data, &b"ell"[..]);
        Filesystem::release(&fuse, req, f, opened.fh, 0, 0, false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rename_and_unlink_track_inodes() {
        let fuse = mounted().await;
        let req = request(10);
        let a = Filesystem::mkdir(&fuse, req, ROOT_INO, OsStr::new("a"), 0o755, 0)
            .await
            .unwrap()
            .attr
            .ino;
        let x = Filesystem::create(&fuse, req, a, OsStr::new("x"), 0o644, 0)
            .await
            .unwrap();
        Filesystem::release(&fuse, req, x.attr.ino, x.fh, 0, 0, true)
            .await
            .unwrap();

        Filesystem::rename(&fuse, req, ROOT_INO, OsStr::new("a"), ROOT_INO, OsStr::new("b"))
            .await
            .unwrap();
        assert_eq!(fuse.inodes().path_of(a).as_deref(), Some("/b"));
        assert_eq!(fuse.inodes().path_of(x.attr.ino).as_deref(), Some("/b/x"));
        let attr = Filesystem::getattr(&fuse, req, x.attr.ino, None, 0)
            .await
            .unwrap();
        assert_eq!(attr.attr.kind, FileType::RegularFile);

        Filesystem::unlink(&fuse, req, a, OsStr::new("x")).await.unwrap();
        assert_eq!(fuse.inodes().path_of(x.attr.ino), None);
        let err = Filesystem::getattr(&fuse, req, x.attr.ino, None, 0)
            .await
            .unwrap_err();
        assert_eq!(err, Errno::from(libc::ENOENT));

        Filesystem::rmdir(&fuse, req, ROOT_INO, OsStr::new("b")).await.unwrap();
        assert_eq!(fuse.inodes().len(), 1);
        assert!(fuse.fs().backend().store().dump().is_empty());
    }

    #[tokio::test]
    async fn test_readdir_offsets() {
        let fuse = mounted().await;
        let req = request(10);
        for name in ["x", "y"] {
            let c = Filesystem::create(&fuse, req, ROOT_INO, OsStr::new(name), 0o644, 0)
                .await
                .unwrap();
            Filesystem::release(&fuse, req, c.attr.ino, c.fh, 0, 0, true)
                .await
                .unwrap();
        }

        let names = |entries: Vec<FuseResult<DirectoryEntry>>| -> Vec<String> {
            entries
                .into_iter()
                .map(|e| e.unwrap().name.to_string_lossy().into_owned())
                .collect()
        };

        use futures_util::StreamExt;
        let all = Filesystem::readdir(&fuse, req, ROOT_INO, 0, 0).await.unwrap();
        assert_eq!(names(all.entries.collect().await), [".", "..", "x", "y"]);
        let rest = Filesystem::readdir(&fuse, req, ROOT_INO, 0, 3).await.unwrap();
        assert_eq!(names(rest.entries.collect().await), ["y"]);

        let plus = Filesystem::readdirplus(&fuse, req, ROOT_INO, 0, 2, 0)
            .await
            .unwrap();
        let plus: Vec<_> = plus.entries.collect().await;
        let plus: Vec<_> = plus.into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(plus.len(), 2);
        assert_eq!(plus[0].name, "x");
        assert_eq!(plus[1].attr.ino, fuse.inodes().ino_of("/y").unwrap());

        let f = fuse.inodes().ino_of("/x").unwrap();
        let err = Filesystem::readdir(&fuse, req, f, 0, 0).await.err();
        assert_eq!(err, Some(Errno::from(libc::ENOTDIR)));
    }
}
