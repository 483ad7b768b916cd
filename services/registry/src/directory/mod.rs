//! Directory Service
//!
//! One capability set (`get`, `put`, `put_token`, `dump`) implemented by
//! independent backend adapters. Callers hold an `Arc<dyn Directory>` and
//! never branch on which backend is behind it.
//!
//! ## Backends
//!
//! - **memory**: in-process table
//! - **file**: object-store layout, one JSON document per gateway
//! - **http**: a remote registry reached over its HTTP surface

mod file;
mod http;
mod memory;

use async_trait::async_trait;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::types::DirectoryEntry;

pub use file::FileDirectory;
pub use http::HttpDirectory;
pub use memory::MemoryDirectory;

/// Errors surfaced by directory backends
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("gateway not found: {0}")]
    NotFound(String),

    #[error("invalid gateway name: {0:?}")]
    InvalidName(String),

    #[error("gateway id must not be empty")]
    EmptyGatewayId,

    #[error("write token missing or incorrect")]
    Unauthorized,

    #[error("backend error: {0}")]
    Backend(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl DirectoryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DirectoryError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, DirectoryError>;

/// Durable name -> gateway ID store
#[async_trait]
pub trait Directory: Send + Sync {
    /// Fetch the entry for `name`, `NotFound` when absent
    async fn get(&self, name: &str) -> Result<DirectoryEntry>;

    /// Upsert `name -> id`, bumping `changes` and `last_update`
    async fn put(&self, name: &str, id: &str) -> Result<DirectoryEntry>;

    /// Upsert carrying a write token for backends that authorize writes.
    /// Local backends leave authorization to the HTTP surface.
    async fn put_authorized(
        &self,
        name: &str,
        id: &str,
        _token: Option<&str>,
    ) -> Result<DirectoryEntry> {
        self.put(name, id).await
    }

    /// Bind a write token to an existing entry
    async fn put_token(&self, name: &str, token: &str) -> Result<()>;

    /// `put_token` carrying the token that authorizes the write
    async fn put_token_authorized(
        &self,
        name: &str,
        token: &str,
        _authorization: Option<&str>,
    ) -> Result<()> {
        self.put_token(name, token).await
    }

    /// Every entry currently stored
    async fn dump(&self) -> Result<Vec<DirectoryEntry>>;
}

/// Where a directory lives, parsed from `memory://`, `file:///path` or
/// `http(s)://host:port`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryLocation {
    Memory,
    File(PathBuf),
    Http(String),
}

impl FromStr for DirectoryLocation {
    type Err = DirectoryError;

    fn from_str(s: &str) -> Result<Self> {
        if s == "memory" || s == "memory://" {
            return Ok(DirectoryLocation::Memory);
        }
        if let Some(path) = s.strip_prefix("file://") {
            if path.is_empty() {
                return Err(DirectoryError::Backend("file location needs a path".to_string()));
            }
            return Ok(DirectoryLocation::File(PathBuf::from(path)));
        }
        if s.starts_with("http://") || s.starts_with("https://") {
            return Ok(DirectoryLocation::Http(s.trim_end_matches('/').to_string()));
        }
        Err(DirectoryError::Backend(format!(
            "unsupported directory location: {}",
            s
        )))
    }
}

impl DirectoryLocation {
    /// Build the backend for this location. `write_token` only applies to
    /// remote registries; `timeout` bounds each remote call.
    pub async fn open(
        &self,
        timeout: Duration,
        write_token: Option<&str>,
    ) -> Result<Arc<dyn Directory>> {
        let directory: Arc<dyn Directory> = match self {
            DirectoryLocation::Memory => Arc::new(MemoryDirectory::new()),
            DirectoryLocation::File(root) => Arc::new(FileDirectory::open(root).await?),
            DirectoryLocation::Http(base) => {
                let remote = HttpDirectory::new(base, timeout)?;
                match write_token {
                    Some(token) => Arc::new(remote.with_write_token(token)),
                    None => Arc::new(remote),
                }
            }
        };
        Ok(directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_locations() {
        assert_eq!(
            "memory://".parse::<DirectoryLocation>().unwrap(),
            DirectoryLocation::Memory
        );
        assert_eq!(
            "file:///var/lib/gateways".parse::<DirectoryLocation>().unwrap(),
            DirectoryLocation::File(PathBuf::from("/var/lib/gateways"))
        );
        assert_eq!(
            "http://registry:8080/".parse::<DirectoryLocation>().unwrap(),
            DirectoryLocation::Http("http://registry:8080".to_string())
        );
        assert!("s3://bucket".parse::<DirectoryLocation>().is_err());
        assert!("file://".parse::<DirectoryLocation>().is_err());
    }
}
