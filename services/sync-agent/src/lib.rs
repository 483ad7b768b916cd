//! Gateway Sync Agent
//!
//! Discovers gateways per credential, drops ambiguous names, applies
//! allow-lists and renames, and propagates `account:region:name -> id`
//! entries into a configured sink with bounded retry.
//!
//! ## Pipeline
//!
//! inventory scan -> dedup -> filter/rename -> key -> sink

pub mod account;
pub mod config;
pub mod inventory;
pub mod pipeline;
pub mod propagator;
pub mod sinks;
pub mod types;

pub use account::{AccountResolver, ArnAccountResolver};
pub use config::{load_credentials, parse_credentials, ConfigError, Credential, RenameSpec};
pub use inventory::{InventoryError, InventoryPage, InventorySource, StaticInventory};
pub use propagator::{PropagationOptions, Propagator};
pub use sinks::{build_sink, GatewaySink, SinkError, SinkKind, SinkSettings};
pub use types::{CycleReport, DiscoveredItem, SyncItem};
