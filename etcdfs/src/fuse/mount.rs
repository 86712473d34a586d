// Copyright (C) 2024 rk8s authors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mount helpers over the rfuse3 raw session. Unprivileged mounts go
//! through `fusermount3`, which must be in PATH.

use std::path::Path;

use rfuse3::MountOptions;
use rfuse3::raw::MountHandle;
#[cfg(target_os = "linux")]
use rfuse3::raw::Session;

#[cfg(target_os = "linux")]
use super::EtcdFuse;
use crate::backend::KvStore;
use crate::vfs::EtcdFs;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MountConfig {
    pub fs_name: String,
    pub allow_other: bool,
    pub privileged: bool,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            fs_name: "etcdfs".to_string(),
            allow_other: false,
            privileged: false,
        }
    }
}

pub fn mount_options(config: &MountConfig) -> MountOptions {
    let uid = unsafe { libc::getuid() };
    let gid = unsafe { libc::getgid() };

    let mut options = MountOptions::default();
    options
        .fs_name(config.fs_name.as_str())
        .uid(uid)
        .gid(gid)
        .allow_other(config.allow_other);
    options
}

/// Mount `fs` on `mountpoint`. The returned handle resolves when the
/// filesystem is unmounted.
#[cfg(target_os = "linux")]
pub async fn mount_etcdfs<S>(
    fs: EtcdFs<S>,
    mountpoint: impl AsRef<Path>,
    config: &MountConfig,
) -> std::io::Result<MountHandle>
where
    S: KvStore + 'static,
{
    let mountpoint = mountpoint.as_ref();
    let fs = EtcdFuse::new(fs);
    let session = Session::new(mount_options(config));
    if config.privileged {
        info!("mounting {} at {} (privileged)", config.fs_name, mountpoint.display());
        session.mount(fs, mountpoint).await
    } else {
        info!("mounting {} at {}", config.fs_name, mountpoint.display());
        session.mount_with_unprivileged(fs, mountpoint).await
    }
}

#[cfg(not(target_os = "linux"))]
pub async fn mount_etcdfs<S>(
    _fs: EtcdFs<S>,
    _mountpoint: impl AsRef<Path>,
    _config: &MountConfig,
) -> std::io::Result<MountHandle>
where
    S: KvStore + 'static,
{
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "FUSE mount is only supported on Linux in this build",
    ))
}
