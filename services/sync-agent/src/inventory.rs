//! Inventory Sources
//!
//! Trait-based abstraction over gateway listings. A source returns one
//! page at a time for a credential; the propagator drives pagination.
//! Cloud listing adapters plug in behind `InventorySource`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::config::Credential;
use crate::types::DiscoveredItem;

const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("listing failed for {credential}: {message}")]
    Page { credential: String, message: String },

    #[error("listing timed out")]
    Timeout,

    #[error("failed to load inventory snapshot: {0}")]
    Snapshot(String),
}

/// One page of a gateway listing
#[derive(Debug, Clone, Default)]
pub struct InventoryPage {
    pub items: Vec<DiscoveredItem>,
    /// Token for the next page, `None` on the last page
    pub next_token: Option<String>,
}

#[async_trait]
pub trait InventorySource: Send + Sync {
    /// List one page of gateways visible to `credential`
    async fn list_page(
        &self,
        credential: &Credential,
        next_token: Option<&str>,
    ) -> Result<InventoryPage, InventoryError>;
}

/// Fixed inventory keyed by role ARN, served in pages
#[derive(Debug, Clone)]
pub struct StaticInventory {
    gateways: HashMap<String, Vec<DiscoveredItem>>,
    page_size: usize,
}

impl Default for StaticInventory {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticInventory {
    pub fn new() -> Self {
        Self {
            gateways: HashMap::new(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn insert(&mut self, role_arn: &str, items: Vec<DiscoveredItem>) {
        self.gateways.insert(role_arn.to_string(), items);
    }

    /// Parse a YAML snapshot: `role_arn: [ {name, id}, ... ]`
    pub fn from_yaml(yaml: &str) -> Result<Self, InventoryError> {
        let gateways: HashMap<String, Vec<DiscoveredItem>> =
            serde_yaml::from_str(yaml).map_err(|e| InventoryError::Snapshot(e.to_string()))?;
        Ok(Self {
            gateways,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    pub fn load(path: &Path) -> Result<Self, InventoryError> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| InventoryError::Snapshot(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&yaml)
    }
}

#[async_trait]
impl InventorySource for StaticInventory {
    async fn list_page(
        &self,
        credential: &Credential,
        next_token: Option<&str>,
    ) -> Result<InventoryPage, InventoryError> {
        let all = self
            .gateways
            .get(&credential.role_arn)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let offset = match next_token {
            Some(token) => token.parse::<usize>().map_err(|_| InventoryError::Page {
                credential: credential.role_arn.clone(),
                message: format!("invalid page token {:?}", token),
            })?,
            None => 0,
        };

        let end = (offset + self.page_size).min(all.len());
        let items = all.get(offset..end).unwrap_or_default().to_vec();
        let next_token = (end < all.len()).then(|| end.to_string());

        Ok(InventoryPage { items, next_token })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn credential(role_arn: &str) -> Credential {
        Credential {
            role_arn: role_arn.to_string(),
            region: "us-east-1".to_string(),
            external_id: None,
            default_token: None,
            only: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_pages_cover_listing() {
        let mut inventory = StaticInventory::new().with_page_size(2);
        inventory.insert(
            "role-a",
            (0..5)
                .map(|i| DiscoveredItem::new(&format!("g{}", i), &format!("id{}", i)))
                .collect(),
        );
        let cred = credential("role-a");

        let mut names = Vec::new();
        let mut token: Option<String> = None;
        let mut pages = 0;
        loop {
            let page = inventory.list_page(&cred, token.as_deref()).await.unwrap();
            pages += 1;
            names.extend(page.items.into_iter().map(|i| i.name));
            token = page.next_token;
            if token.is_none() {
                break;
            }
        }

        assert_eq!(pages, 3);
        assert_eq!(names, vec!["g0", "g1", "g2", "g3", "g4"]);
    }

    #[tokio::test]
    async fn test_unknown_role_is_empty() {
        let inventory = StaticInventory::new();
        let page = inventory.list_page(&credential("nobody"), None).await.unwrap();
        assert!(page.items.is_empty());
        assert!(page.next_token.is_none());
    }

    #[tokio::test]
    async fn test_bad_page_token_errors() {
        let inventory = StaticInventory::new();
        assert!(inventory
            .list_page(&credential("role-a"), Some("not-a-number"))
            .await
            .is_err());
    }

    #[test]
    fn test_snapshot_from_yaml() {
        let yaml = r#"
"arn:aws:iam::111111111111:role/reader":
  - name: g1
    id: id1
  - name: g2
    id: id2
"#;
        let inventory = StaticInventory::from_yaml(yaml).unwrap();
        assert_eq!(
            inventory.gateways["arn:aws:iam::111111111111:role/reader"].len(),
            2
        );
    }
}
