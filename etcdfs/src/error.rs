// Copyright (C) 2024 rk8s authors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain error kinds shared by the backend adapter, the handle table and the
//! VFS layer. Only the FUSE layer turns these into errno values.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FsError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FsError {
    #[error("entry already exists")]
    AlreadyExists,

    #[error("no such file or directory")]
    NotExist,

    #[error("not a directory")]
    NotADirectory,

    #[error("is a directory")]
    IsADirectory,

    #[error("cannot access backend: {0}")]
    BackendUnavailable(String),

    #[error("rename target already exists")]
    DuplicateDestination,

    #[error("file is being written by another process")]
    ConcurrentWriteConflict,

    #[error("caller does not hold write ownership")]
    PermissionDenied,
    #[error("file size limit exceeded")]
    FileTooLarge,
    #[error("out of memory for file content")]
    NoSpace,

    #[error("unsupported backend scheme: {0}")]
    UnsupportedBackendScheme(String),

    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),
}

impl FsError {
    /// POSIX error code reported to the kernel for this error.
    pub fn errno(&self) -> i32 {
        match self {
            FsError::AlreadyExists | FsError::DuplicateDestination => libc::EEXIST,
            FsError::NotExist => libc::ENOENT,
            FsError::NotADirectory => libc::ENOTDIR,
            FsError::IsADirectory => libc::EISDIR,
            FsError::BackendUnavailable(_) => libc::EIO,
            FsError::ConcurrentWriteConflict | FsError::PermissionDenied => libc::EPERM,
            FsError::FileTooLarge => libc::EFBIG,
            FsError::NoSpace => libc::ENOSPC,
            FsError::UnsupportedBackendScheme(_) | FsError::InvalidConnectionString(_) => {
                libc::EINVAL
            }
        }
    }
}
