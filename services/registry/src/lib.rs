//! Gateway Registry
//!
//! Name -> gateway ID directory with a pluggable storage backend, an HTTP
//! surface, and a resolution client that caches lookups and replicates
//! entries from a primary directory into a fallback one.

pub mod api;
pub mod client;
pub mod directory;
pub mod types;

pub use api::{router, AppState};
pub use client::{GatewayCache, ResolutionClient};
pub use directory::{
    Directory, DirectoryError, DirectoryLocation, FileDirectory, HttpDirectory, MemoryDirectory,
};
pub use types::{DirectoryEntry, GatewayPayload, GatewayReply, TokenUpdate};
