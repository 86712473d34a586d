// Copyright (C) 2024 rk8s authors
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// etcdfs: expose an etcd keyspace as a hierarchical filesystem over FUSE.

#[macro_use]
extern crate log;

pub mod backend;
pub mod config;
pub mod error;
pub mod fuse;
pub mod handle;
pub mod vfs;

pub use error::{FsError, Result};
