//! Object-store style directory
//!
//! Each gateway is one JSON document under the root directory. Object keys
//! are the percent-encoded gateway name so colons never reach the
//! filesystem.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

use super::{Directory, DirectoryError, Result};
use crate::types::{is_valid_name, DirectoryEntry};

const OBJECT_SUFFIX: &str = ".json";

pub struct FileDirectory {
    root: PathBuf,
    /// Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileDirectory {
    /// Open (and create if needed) a directory rooted at `root`
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        debug!(root = %root.display(), "Opened file directory");

        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    fn object_path(&self, name: &str) -> PathBuf {
        self.root
            .join(format!("{}{}", urlencoding::encode(name), OBJECT_SUFFIX))
    }

    async fn read_object(&self, name: &str) -> Result<DirectoryEntry> {
        match tokio::fs::read(self.object_path(name)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(DirectoryError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write through a temp object and rename so readers never see a torn
    /// document
    async fn write_object(&self, entry: &DirectoryEntry) -> Result<()> {
        let path = self.object_path(&entry.gateway_name);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(entry)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl Directory for FileDirectory {
    async fn get(&self, name: &str) -> Result<DirectoryEntry> {
        self.read_object(name).await
    }

    async fn put(&self, name: &str, id: &str) -> Result<DirectoryEntry> {
        if !is_valid_name(name) {
            return Err(DirectoryError::InvalidName(name.to_string()));
        }
        if id.is_empty() {
            return Err(DirectoryError::EmptyGatewayId);
        }

        let _guard = self.write_lock.lock().await;
        let entry = match self.read_object(name).await {
            Ok(mut existing) => {
                existing.update(id);
                existing
            }
            Err(DirectoryError::NotFound(_)) => DirectoryEntry::new(name, id),
            Err(e) => return Err(e),
        };
        self.write_object(&entry).await?;
        Ok(entry)
    }

    async fn put_token(&self, name: &str, token: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut entry = self.read_object(name).await?;
        entry.token = Some(token.to_string());
        self.write_object(&entry).await
    }

    async fn dump(&self) -> Result<Vec<DirectoryEntry>> {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.root).await?;

        while let Some(item) = dir.next_entry().await? {
            let file_name = item.file_name();
            if !file_name.to_string_lossy().ends_with(OBJECT_SUFFIX) {
                continue;
            }
            let bytes = tokio::fs::read(item.path()).await?;
            entries.push(serde_json::from_slice::<DirectoryEntry>(&bytes)?);
        }

        entries.sort_by(|a, b| a.gateway_name.cmp(&b.gateway_name));
        Ok(entries)
    }
}
