//! Scan Pipeline
//!
//! Pure steps between an inventory scan and the sink: dedup, allow-list
//! filtering with renames, and directory key composition.

use std::collections::HashMap;
use tracing::{debug, warn};

use crate::config::Credential;
use crate::types::{DiscoveredItem, SyncItem};

/// Outcome of deduplicating one scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Deduped {
    /// Names seen exactly once, in first-seen order
    pub unique: Vec<DiscoveredItem>,
    /// Names seen more than once, dropped
    pub duplicates: Vec<String>,
}

/// Collapse a scan into unique names. A name reported more than once has
/// ambiguous identity and is dropped entirely.
pub fn dedup(items: Vec<DiscoveredItem>) -> Deduped {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, (usize, String)> = HashMap::new();

    for item in items {
        match groups.get_mut(&item.name) {
            Some((count, id)) => {
                *count += 1;
                *id = item.id;
            }
            None => {
                order.push(item.name.clone());
                groups.insert(item.name, (1, item.id));
            }
        }
    }

    let mut deduped = Deduped::default();
    for name in order {
        let Some((count, id)) = groups.remove(&name) else {
            continue;
        };
        if count == 1 {
            deduped.unique.push(DiscoveredItem { name, id });
        } else {
            warn!(gateway = %name, occurrences = count, "Dropping gateway reported more than once");
            deduped.duplicates.push(name);
        }
    }
    deduped
}

/// Accepted gateway after allow-list and rename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    pub name: String,
    pub id: String,
    pub token: Option<String>,
}

/// Apply the credential's allow-list. `None` means the gateway is not
/// listed and must not be propagated.
pub fn filter_rename(item: &DiscoveredItem, credential: &Credential) -> Option<Accepted> {
    let default_token = credential.default_token.clone().filter(|t| !t.is_empty());

    if credential.only.is_empty() {
        return Some(Accepted {
            name: item.name.clone(),
            id: item.id.clone(),
            token: default_token,
        });
    }

    let Some(spec) = credential.only.get(&item.name) else {
        debug!(gateway = %item.name, credential = %credential.role_arn, "Not in allow-list");
        return None;
    };

    Some(Accepted {
        name: spec.target().unwrap_or(&item.name).to_string(),
        id: item.id.clone(),
        token: spec
            .token
            .clone()
            .filter(|t| !t.is_empty())
            .or(default_token),
    })
}

/// Directory key for a gateway: `account:region:name`, no escaping
pub fn compose_key(account_id: &str, region: &str, name: &str) -> String {
    format!("{}:{}:{}", account_id, region, name)
}

/// Run filter, rename and key composition over a deduplicated scan.
/// Returns the items to save and how many were filtered out.
pub fn prepare(
    unique: &[DiscoveredItem],
    credential: &Credential,
    account_id: &str,
) -> (Vec<SyncItem>, usize) {
    let mut filtered = 0;
    let items = unique
        .iter()
        .filter_map(|item| {
            let accepted = filter_rename(item, credential);
            if accepted.is_none() {
                filtered += 1;
            }
            accepted
        })
        .map(|accepted| SyncItem {
            key: compose_key(account_id, &credential.region, &accepted.name),
            id: accepted.id,
            token: accepted.token,
        })
        .collect();
    (items, filtered)
}
