// Copyright (C) 2024 rk8s authors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mount smoke test, gated by ETCDFS_FUSE_TEST=1 (needs /dev/fuse and
//! fusermount3).

#![cfg(target_os = "linux")]

use std::fs;
use std::io::Write;
use std::time::Duration;

use etcdfs::backend::{KvAdapter, MemoryStore};
use etcdfs::fuse::{MountConfig, mount_etcdfs};
use etcdfs::vfs::EtcdFs;

#[tokio::test]
async fn smoke_mount_and_basic_ops() {
    if std::env::var("ETCDFS_FUSE_TEST").ok().as_deref() != Some("1") {
        eprintln!("skip fuse mount test: set ETCDFS_FUSE_TEST=1 to enable");
        return;
    }

    let filesystem = EtcdFs::new(KvAdapter::new(MemoryStore::new()));
    let mnt = tempfile::tempdir().expect("tmp mount");
    let mnt_path = mnt.path().to_path_buf();

    let handle = match mount_etcdfs(filesystem, &mnt_path, &MountConfig::default()).await {
        Ok(h) => h,
        Err(e) => {
            eprintln!("skip fuse test: mount failed: {e}");
            return;
        }
    };
    tokio::time::sleep(Duration::from_millis(1000)).await;

    let dir = mnt_path.join("a");
    fs::create_dir(&dir).expect("mkdir");
    let file_path = dir.join("hello.txt");
    {
        let mut f = fs::File::create(&file_path).expect("create file");
        f.write_all(b"abc").expect("write");
        f.flush().expect("flush");
    }
    assert_eq!(fs::read(&file_path).expect("read back"), b"abc");

    let names: Vec<_> = fs::read_dir(&dir)
        .expect("readdir")
        .filter_map(|e| e.ok())
        .map(|e| e.file_name())
        .collect();
    assert!(names.iter().any(|n| n.to_string_lossy() == "hello.txt"));

    let moved = mnt_path.join("b");
    fs::rename(&dir, &moved).expect("rename dir");
    assert_eq!(fs::read(moved.join("hello.txt")).expect("read moved"), b"abc");

    fs::remove_file(moved.join("hello.txt")).expect("unlink");
    fs::remove_dir(&moved).expect("rmdir");

    if let Err(e) = handle.unmount().await {
        eprintln!("unmount error: {e}");
    }
}
