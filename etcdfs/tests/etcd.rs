// Copyright (C) 2024 rk8s authors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Round trip against a live etcd, gated by ETCDFS_ETCD_ENDPOINT, e.g.
//! `ETCDFS_ETCD_ENDPOINT=etcd://127.0.0.1:2379`.

use std::time::{SystemTime, UNIX_EPOCH};

use etcdfs::FsError;
use etcdfs::backend::{Datasource, KvAdapter, KvStore, Store};
use etcdfs::vfs::{Caller, EtcdFs};

#[tokio::test]
async fn etcd_round_trip() {
    let Ok(conn) = std::env::var("ETCDFS_ETCD_ENDPOINT") else {
        eprintln!("skip etcd test: set ETCDFS_ETCD_ENDPOINT to enable");
        return;
    };
    let ds = Datasource::parse(&conn).expect("datasource");
    let store = Store::connect(&ds).await.expect("connect");
    let fs = EtcdFs::new(KvAdapter::new(store));
    let who = Caller::new(0, 0, 1);
    fs.init(&who).await;

    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let root = format!("/etcdfs-test-{nonce}");
    let file = format!("{root}/f");

    fs.mkdir(&who, &root).await.expect("mkdir");
    let h = fs.create(&who, &file).await.expect("create");
    fs.write(&who, None, Some(h.id()), 0, b"hello")
        .await
        .expect("write");
    fs.flush(&who, None, Some(h.id())).await.expect("flush");
    fs.release(&who, None, Some(h.id())).await;

    assert_eq!(fs.backend().read(&file).await.expect("read"), b"hello");
    let names: Vec<_> = fs
        .readdir(&who, &root)
        .await
        .expect("readdir")
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, ["f"]);

    fs.rmdir(&root).await.expect("rmdir");
    assert_eq!(fs.backend().read(&file).await, Err(FsError::NotExist));
    assert_eq!(
        fs.backend().store().count_prefix(&format!("{root}/")).await.unwrap(),
        0
    );

    fs.destroy().await;
    fs.destroy().await;
}
