//! Credential Configuration
//!
//! YAML list of scanning contexts. Each credential may carry an allow-list
//! (`only`) that also renames gateways and overrides write tokens.
//!
//! ```yaml
//! - role_arn: arn:aws:iam::123456789012:role/gateway-reader
//!   region: us-east-1
//!   role_external_id: ext-1
//!   default_token: shared
//!   only:
//!     edge-gw:
//!       rename: edge
//!       token: edge-token
//!     core-gw:
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse credentials: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("credential #{index} is missing {field}")]
    MissingField { index: usize, field: &'static str },

    #[error("rename target {rename:?} declared twice ({first} and {second})")]
    DuplicateRename {
        rename: String,
        first: String,
        second: String,
    },
}

/// Per-gateway allow-list entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameSpec {
    #[serde(default)]
    pub rename: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

impl RenameSpec {
    /// Rename target, ignoring empty strings
    pub fn target(&self) -> Option<&str> {
        self.rename.as_deref().filter(|r| !r.is_empty())
    }
}

/// One scanning context: account role, region and filter rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub role_arn: String,
    pub region: String,
    #[serde(default, rename = "role_external_id")]
    pub external_id: Option<String>,
    #[serde(default)]
    pub default_token: Option<String>,
    /// Allow-list; empty means every gateway passes unchanged
    #[serde(default, deserialize_with = "deserialize_only")]
    pub only: BTreeMap<String, RenameSpec>,
}

/// `only` entries may be written without a body (`name:`), which YAML
/// reads as null
fn deserialize_only<'de, D>(deserializer: D) -> Result<BTreeMap<String, RenameSpec>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Option<RenameSpec>>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(name, spec)| (name, spec.unwrap_or_default()))
        .collect())
}

/// Parse and validate a credential file body
pub fn parse_credentials(yaml: &str) -> Result<Vec<Credential>, ConfigError> {
    let credentials: Vec<Credential> = serde_yaml::from_str(yaml)?;
    validate(&credentials)?;
    Ok(credentials)
}

/// Load the credential file at `path`; any error rejects the whole file
pub fn load_credentials(path: &Path) -> Result<Vec<Credential>, ConfigError> {
    let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let credentials = parse_credentials(&yaml)?;
    info!(
        path = %path.display(),
        credentials = credentials.len(),
        "Loaded credential configuration"
    );
    Ok(credentials)
}

fn validate(credentials: &[Credential]) -> Result<(), ConfigError> {
    // rename target -> "role_arn/gateway" that first declared it
    let mut renames: HashMap<&str, String> = HashMap::new();

    for (index, credential) in credentials.iter().enumerate() {
        if credential.role_arn.is_empty() {
            return Err(ConfigError::MissingField { index, field: "role_arn" });
        }
        if credential.region.is_empty() {
            return Err(ConfigError::MissingField { index, field: "region" });
        }

        for (name, spec) in &credential.only {
            let Some(target) = spec.target() else {
                continue;
            };
            let owner = format!("{}/{}", credential.role_arn, name);
            if let Some(first) = renames.get(target) {
                return Err(ConfigError::DuplicateRename {
                    rename: target.to_string(),
                    first: first.clone(),
                    second: owner,
                });
            }
            renames.insert(target, owner);
        }
    }

    Ok(())
}
