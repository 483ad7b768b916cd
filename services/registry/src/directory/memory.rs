//! In-memory directory table

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::{Directory, DirectoryError, Result};
use crate::types::{is_valid_name, DirectoryEntry};

#[derive(Debug, Default)]
pub struct MemoryDirectory {
    entries: RwLock<HashMap<String, DirectoryEntry>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn get(&self, name: &str) -> Result<DirectoryEntry> {
        self.entries
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound(name.to_string()))
    }

    async fn put(&self, name: &str, id: &str) -> Result<DirectoryEntry> {
        if !is_valid_name(name) {
            return Err(DirectoryError::InvalidName(name.to_string()));
        }
        if id.is_empty() {
            return Err(DirectoryError::EmptyGatewayId);
        }

        let mut entries = self.entries.write();
        let entry = entries
            .entry(name.to_string())
            .and_modify(|e| e.update(id))
            .or_insert_with(|| DirectoryEntry::new(name, id));
        Ok(entry.clone())
    }

    async fn put_token(&self, name: &str, token: &str) -> Result<()> {
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(name)
            .ok_or_else(|| DirectoryError::NotFound(name.to_string()))?;
        entry.token = Some(token.to_string());
        Ok(())
    }

    async fn dump(&self) -> Result<Vec<DirectoryEntry>> {
        let mut entries: Vec<DirectoryEntry> = self.entries.read().values().cloned().collect();
        entries.sort_by(|a, b| a.gateway_name.cmp(&b.gateway_name));
        Ok(entries)
    }
}
