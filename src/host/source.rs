// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Guest binary sources
//!
//! A source produces the raw bytes of a guest module. Fetching is the only
//! asynchronous step of loading; everything after it runs to completion on
//! the caller's task.

use crate::config::consts::MAX_MODULE_SIZE;
use crate::errors::{HostError, HostResult};
use crate::observability::messages::host::{ModuleFetched, ModuleLoadFailed};
use async_trait::async_trait;
use std::path::PathBuf;

#[async_trait]
pub trait ModuleSource: Send + Sync {
    /// Human readable location, used in logs and errors.
    fn location(&self) -> String;

    /// Fetch the binary, enforcing the size limit.
    async fn fetch(&self) -> HostResult<Vec<u8>>;
}

/// A guest binary on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ModuleSource for FileSource {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> HostResult<Vec<u8>> {
        let location = self.location();
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            let error = HostError::FetchFailed {
                location: location.clone(),
                reason: e.to_string(),
            };
            tracing::error!(
                "{}",
                ModuleLoadFailed {
                    location: &location,
                    error: &error,
                }
            );
            error
        })?;

        check_size(&location, bytes)
    }
}

/// A guest binary already in memory.
#[derive(Debug, Clone)]
pub struct BytesSource {
    label: String,
    bytes: Vec<u8>,
}

impl BytesSource {
    pub fn new<S: Into<String>>(label: S, bytes: Vec<u8>) -> Self {
        Self {
            label: label.into(),
            bytes,
        }
    }
}

#[async_trait]
impl ModuleSource for BytesSource {
    fn location(&self) -> String {
        self.label.clone()
    }

    async fn fetch(&self) -> HostResult<Vec<u8>> {
        check_size(&self.label, self.bytes.clone())
    }
}

fn check_size(location: &str, bytes: Vec<u8>) -> HostResult<Vec<u8>> {
    if bytes.len() > MAX_MODULE_SIZE {
        let error = HostError::InvalidBinary(format!(
            "module too large: {} bytes (max: {} bytes)",
            bytes.len(),
            MAX_MODULE_SIZE
        ));
        tracing::error!(
            "{}",
            ModuleLoadFailed {
                location,
                error: &error,
            }
        );
        return Err(error);
    }

    tracing::info!(
        "{}",
        ModuleFetched {
            location,
            size_bytes: bytes.len(),
        }
    );
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_fetch_small_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"\0asm").unwrap();

        let bytes = FileSource::new(temp_file.path()).fetch().await.unwrap();
        assert_eq!(bytes, b"\0asm");
    }

    #[tokio::test]
    async fn test_missing_file_is_fetch_failure() {
        let source = FileSource::new("/nonexistent/path/to/add.wasm");
        match source.fetch().await {
            Err(HostError::FetchFailed { location, .. }) => {
                assert!(location.ends_with("add.wasm"));
            }
            other => panic!("Expected FetchFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_oversized_bytes_rejected() {
        let source = BytesSource::new("huge", vec![0u8; MAX_MODULE_SIZE + 1]);
        match source.fetch().await {
            Err(HostError::InvalidBinary(msg)) => assert!(msg.contains("too large")),
            other => panic!("Expected InvalidBinary, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_max_size_boundary() {
        let source = BytesSource::new("edge", vec![0u8; MAX_MODULE_SIZE]);
        assert_eq!(source.fetch().await.unwrap().len(), MAX_MODULE_SIZE);
    }
}
