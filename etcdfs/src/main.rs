// Copyright (C) 2024 rk8s authors
// SPDX-License-Identifier: MIT OR Apache-2.0

use anyhow::{Context, Result};
use clap::Parser;
use etcdfs::backend::{KvAdapter, Store};
use etcdfs::config::{Cli, Settings};
use etcdfs::fuse::mount_etcdfs;
use etcdfs::vfs::EtcdFs;
use log::info;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let settings = Settings::resolve(&cli)?;

    let store = Store::connect(&settings.datasource)
        .await
        .with_context(|| format!("Failed to connect to {}", settings.datasource.scheme()))?;
    let fs = EtcdFs::new(KvAdapter::new(store));

    let mut mount_handle = mount_etcdfs(fs, &cli.mountpoint, &settings.mount)
        .await
        .with_context(|| format!("Failed to mount on {}", cli.mountpoint.display()))?;

    let handle = &mut mount_handle;
    tokio::select! {
        res = handle => res.context("Filesystem session failed")?,
        _ = signal::ctrl_c() => {
            info!("interrupted, unmounting {}", cli.mountpoint.display());
            mount_handle.unmount().await.context("Failed to unmount")?;
        }
    }
    Ok(())
}
