// Copyright (C) 2024 rk8s authors
// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod fs;
pub mod path;

pub use fs::{Caller, DirEntry, EtcdFs, OpenIntent};
