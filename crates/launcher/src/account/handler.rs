//! Account serialization and encryption.
//!
//! The account payload is MessagePack-encoded and sealed with
//! XChaCha20-Poly1305 under a key derived from the user's password and
//! the account location. The stored blob is `nonce || ciphertext` with a
//! random 24-byte nonce per save.
//!
//! This module is pure transformation plus the owned identity state; it
//! never touches the network.

use std::collections::BTreeMap;

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::debug;

use protocol::{AccountIdentity, SecretKey};

use crate::apps::{AppDetails, AppName};
use crate::error::{LauncherError, Result};

/// Version of the account payload format, for future migrations.
pub const ACCOUNT_FORMAT_VERSION: u32 = 1;

/// XChaCha20 nonce length in bytes.
const NONCE_LENGTH: usize = 24;

/// Poly1305 authentication tag length in bytes.
const TAG_LENGTH: usize = 16;

/// The network-persisted account payload.
///
/// Created once at account creation, read at every login, and rewritten
/// wholesale by every save; there is no partial update of the remote copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Payload format version.
    pub version: u32,
    /// The account's Ed25519 secret key bytes.
    #[serde(with = "serde_bytes")]
    identity_secret: [u8; 32],
    /// Apps registered on this machine.
    pub local_apps: BTreeMap<AppName, AppDetails>,
    /// Apps registered on other machines for this account.
    pub non_local_apps: BTreeMap<AppName, AppDetails>,
}

impl Account {
    /// Creates a fresh account with an empty registry.
    pub fn new(identity: &AccountIdentity) -> Self {
        Self {
            version: ACCOUNT_FORMAT_VERSION,
            identity_secret: identity.secret_key_bytes(),
            local_apps: BTreeMap::new(),
            non_local_apps: BTreeMap::new(),
        }
    }

    /// Restores the signing identity stored in this account.
    pub fn identity(&self) -> AccountIdentity {
        AccountIdentity::from_secret_key_bytes(&self.identity_secret)
    }
}

/// Owns the account encryption key and identity; encodes and decodes the
/// stored blob.
pub struct AccountHandler {
    key: SecretKey,
    identity: AccountIdentity,
}

impl AccountHandler {
    /// Creates a handler from the derived key and a decoded or freshly
    /// generated identity.
    pub fn new(key: SecretKey, identity: AccountIdentity) -> Self {
        Self { key, identity }
    }

    /// Opens a fetched account blob with the derived key, adopting the
    /// identity stored inside it. This is the login path; account
    /// creation uses [`AccountHandler::new`] with a fresh identity.
    pub fn open(key: SecretKey, blob: &[u8]) -> Result<(Self, Account)> {
        let mut handler = Self {
            key,
            identity: AccountIdentity::generate(),
        };
        let account = handler.decode(blob)?;
        handler.identity = account.identity();
        Ok((handler, account))
    }

    /// The account's signing identity.
    pub fn identity(&self) -> &AccountIdentity {
        &self.identity
    }

    /// Serializes and seals an account for network storage.
    pub fn encode(&self, account: &Account) -> Result<Vec<u8>> {
        let plaintext = rmp_serde::to_vec(account)
            .map_err(|e| LauncherError::PermanentFailure(format!("account encoding: {}", e)))?;

        let cipher = XChaCha20Poly1305::new(self.key.as_bytes().into());
        let mut nonce = [0u8; NONCE_LENGTH];
        rand::rngs::OsRng.fill_bytes(&mut nonce);

        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|e| LauncherError::PermanentFailure(format!("account sealing: {}", e)))?;

        let mut blob = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);

        debug!(bytes = blob.len(), "encoded account blob");
        Ok(blob)
    }

    /// Opens and deserializes a stored account blob.
    ///
    /// An AEAD rejection is reported as `DecryptionFailed` (wrong
    /// password); a structurally broken blob or payload is
    /// `CorruptAccount`. Callers rely on the distinction.
    pub fn decode(&self, blob: &[u8]) -> Result<Account> {
        if blob.len() < NONCE_LENGTH + TAG_LENGTH {
            return Err(LauncherError::CorruptAccount(format!(
                "blob too short: {} bytes",
                blob.len()
            )));
        }

        let (nonce, ciphertext) = blob.split_at(NONCE_LENGTH);
        let cipher = XChaCha20Poly1305::new(self.key.as_bytes().into());

        let plaintext = cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| LauncherError::DecryptionFailed)?;

        let account: Account = rmp_serde::from_slice(&plaintext)
            .map_err(|e| LauncherError::CorruptAccount(e.to_string()))?;

        if account.version != ACCOUNT_FORMAT_VERSION {
            return Err(LauncherError::CorruptAccount(format!(
                "unsupported account format version {}",
                account.version
            )));
        }

        Ok(account)
    }
}

impl std::fmt::Debug for AccountHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountHandler")
            .field("key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}
