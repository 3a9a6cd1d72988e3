//! The storage-network collaborator seam.
//!
//! The Launcher never talks to the storage network directly; it goes
//! through [`NetworkClient`], which covers exactly the three operations
//! the account lifecycle needs. The real network-backed implementation
//! lives outside this crate.

use async_trait::async_trait;
use thiserror::Error;

use protocol::AccountLocation;

/// Failures surfaced by the storage network.
///
/// The split between `Transient` and `Permanent` is the retry contract:
/// the Launcher preserves the registry dirty flag across transient save
/// failures so the caller can simply retry.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// No data stored at the requested location.
    #[error("no data at the requested location")]
    NotFound,

    /// The request failed in a way that is safe to retry (timeout,
    /// unreachable network).
    #[error("transient network failure: {0}")]
    Transient(String),

    /// The request failed in a way retrying will not fix.
    #[error("permanent network failure: {0}")]
    Permanent(String),
}

/// Result type alias for network operations.
pub type NetworkResult<T> = std::result::Result<T, NetworkError>;

/// Authenticated session to the storage network.
///
/// Blobs are already encrypted when they reach this interface; the
/// network never sees plaintext account data.
#[async_trait]
pub trait NetworkClient: Send + Sync {
    /// Stores `blob` at `location`, replacing any existing data.
    async fn put(&self, location: AccountLocation, blob: Vec<u8>) -> NetworkResult<()>;

    /// Fetches the blob stored at `location`.
    async fn get(&self, location: &AccountLocation) -> NetworkResult<Vec<u8>>;

    /// Whether any data is stored at `location`.
    async fn exists(&self, location: &AccountLocation) -> NetworkResult<bool>;
}

/// Capability to fetch an encrypted account blob for a derived location.
///
/// Login needs only this one operation, so it is expressed as its own
/// seam; any [`NetworkClient`] provides it for free.
#[async_trait]
pub trait AccountGetter: Send + Sync {
    /// Fetches the encrypted account blob stored at `location`.
    async fn fetch_account(&self, location: &AccountLocation) -> NetworkResult<Vec<u8>>;
}

#[async_trait]
impl<T: NetworkClient + ?Sized> AccountGetter for T {
    async fn fetch_account(&self, location: &AccountLocation) -> NetworkResult<Vec<u8>> {
        self.get(location).await
    }
}
