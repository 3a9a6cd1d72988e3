//! In-memory storage network.
//!
//! A process-local stand-in for the real storage network, used by tests
//! and by offline development builds. Keyed by account location; blobs
//! are stored as-is.

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use protocol::AccountLocation;

use super::client::{NetworkClient, NetworkError, NetworkResult};

/// Thread-safe in-memory blob store.
#[derive(Debug, Default)]
pub struct InMemoryNetwork {
    blobs: DashMap<AccountLocation, Vec<u8>>,
}

impl InMemoryNetwork {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Whether the store holds no blobs.
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl NetworkClient for InMemoryNetwork {
    async fn put(&self, location: AccountLocation, blob: Vec<u8>) -> NetworkResult<()> {
        debug!(location = %location, bytes = blob.len(), "storing blob");
        self.blobs.insert(location, blob);
        Ok(())
    }

    async fn get(&self, location: &AccountLocation) -> NetworkResult<Vec<u8>> {
        self.blobs
            .get(location)
            .map(|entry| entry.value().clone())
            .ok_or(NetworkError::NotFound)
    }

    async fn exists(&self, location: &AccountLocation) -> NetworkResult<bool> {
        Ok(self.blobs.contains_key(location))
    }
}
