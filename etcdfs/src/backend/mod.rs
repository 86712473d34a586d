// Copyright (C) 2024 rk8s authors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key-value backend.
//!
//! - `datasource`: connection string parsing
//! - `etcd` / `memory`: stores implementing the raw [`KvStore`] primitives
//! - `adapter`: path-level operations on top of a store, owning the
//!   directory-marker convention and the mapping to [`crate::FsError`]

pub mod adapter;
pub mod datasource;
pub mod etcd;
pub mod memory;

use async_trait::async_trait;

pub use adapter::KvAdapter;
pub use datasource::{Datasource, Scheme};
pub use etcd::EtcdStore;
pub use memory::MemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("key not found")]
    NotFound,
    #[error("backend connection is closed")]
    Closed,
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Etcd(#[from] Box<etcd_client::Error>),
}

impl From<etcd_client::Error> for StoreError {
    fn from(e: etcd_client::Error) -> Self {
        match &e {
            etcd_client::Error::GRpcStatus(status) if status.code() == tonic::Code::NotFound => {
                StoreError::NotFound
            }
            _ => StoreError::Etcd(Box::new(e)),
        }
    }
}

/// Raw primitives consumed from the remote store. Keys are UTF-8 strings and
/// carry no hierarchy of their own.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Number of keys equal to `key` (0 or 1).
    async fn count_key(&self, key: &str) -> Result<u64, StoreError>;

    async fn count_prefix(&self, prefix: &str) -> Result<u64, StoreError>;

    /// Keys (no values) sharing `prefix`, in key order.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    async fn delete_prefix(&self, prefix: &str) -> Result<(), StoreError>;

    /// Drop the connection. Calling it again is a no-op.
    async fn close(&self);
}

/// The store selected by the datasource scheme.
pub enum Store {
    Etcd(EtcdStore),
    Memory(MemoryStore),
}

impl Store {
    pub async fn connect(ds: &Datasource) -> Result<Self, StoreError> {
        match ds.scheme() {
            Scheme::Etcd => Ok(Store::Etcd(EtcdStore::connect(ds).await?)),
            Scheme::Memory => {
                info!("using process-local memory store, nothing will be persisted");
                Ok(Store::Memory(MemoryStore::new()))
            }
        }
    }
}

#[async_trait]
impl KvStore for Store {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match self {
            Store::Etcd(s) => s.get(key).await,
            Store::Memory(s) => s.get(key).await,
        }
    }

    async fn count_key(&self, key: &str) -> Result<u64, StoreError> {
        match self {
            Store::Etcd(s) => s.count_key(key).await,
            Store::Memory(s) => s.count_key(key).await,
        }
    }

    async fn count_prefix(&self, prefix: &str) -> Result<u64, StoreError> {
        match self {
            Store::Etcd(s) => s.count_prefix(prefix).await,
            Store::Memory(s) => s.count_prefix(prefix).await,
        }
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        match self {
            Store::Etcd(s) => s.keys_with_prefix(prefix).await,
            Store::Memory(s) => s.keys_with_prefix(prefix).await,
        }
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        match self {
            Store::Etcd(s) => s.put(key, value).await,
            Store::Memory(s) => s.put(key, value).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self {
            Store::Etcd(s) => s.delete(key).await,
            Store::Memory(s) => s.delete(key).await,
        }
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<(), StoreError> {
        match self {
            Store::Etcd(s) => s.delete_prefix(prefix).await,
            Store::Memory(s) => s.delete_prefix(prefix).await,
        }
    }

    async fn close(&self) {
        match self {
            Store::Etcd(s) => s.close().await,
            Store::Memory(s) => s.close().await,
        }
    }
}
