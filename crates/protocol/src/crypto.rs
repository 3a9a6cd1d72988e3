//! Cryptographic identity and key derivation for SafeLauncher accounts.
//!
//! This module provides the Ed25519 account identity, the opaque session
//! public key an app presents during the handshake, and the deterministic
//! derivation of the account's network location and encryption key from
//! the user's three secrets.

use ed25519_dalek::{
    Signature as Ed25519Signature, Signer, SigningKey, Verifier, VerifyingKey, PUBLIC_KEY_LENGTH,
    SECRET_KEY_LENGTH, SIGNATURE_LENGTH,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::error::{ProtocolError, Result};

/// Length of a session public key in bytes.
pub const SESSION_KEY_LENGTH: usize = 32;

/// Length of a derived account location in bytes (SHA-256 output).
pub const LOCATION_LENGTH: usize = 32;

/// Domain separator for account location derivation.
const LOCATION_CONTEXT: &[u8] = b"safe-launcher:account-location";

/// Domain separator for account encryption key derivation.
const SECRET_CONTEXT: &[u8] = b"safe-launcher:account-secret";

/// The user-memorable keyword secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Keyword(pub String);

/// The user's PIN secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Pin(pub String);

/// The user's password secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(pub String);

macro_rules! redacted_debug {
    ($name:ident) => {
        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_tuple(stringify!($name)).field(&"[REDACTED]").finish()
            }
        }
    };
}

redacted_debug!(Keyword);
redacted_debug!(Pin);
redacted_debug!(Password);

/// The network location of an encrypted account blob, derived
/// deterministically from keyword and pin.
///
/// The password takes no part in the derivation: a wrong password must
/// still locate the stored blob so that decryption failure can be
/// reported distinctly from a missing account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountLocation(#[serde(with = "serde_bytes")] pub [u8; LOCATION_LENGTH]);

impl AccountLocation {
    /// Derives the account location from the keyword and pin.
    pub fn derive(keyword: &Keyword, pin: &Pin) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(LOCATION_CONTEXT);
        hasher.update((keyword.0.len() as u64).to_be_bytes());
        hasher.update(keyword.0.as_bytes());
        hasher.update(pin.0.as_bytes());
        Self(hasher.finalize().into())
    }

    /// Returns the raw bytes of this location.
    pub fn as_bytes(&self) -> &[u8; LOCATION_LENGTH] {
        &self.0
    }

    /// Short hex fingerprint of the location, for logs.
    pub fn fingerprint(&self) -> String {
        self.0[..4]
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<String>()
    }
}

impl std::fmt::Display for AccountLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.fingerprint())
    }
}

/// 256-bit symmetric key protecting the stored account blob.
///
/// Derived from the password and the account location, so the location
/// acts as a per-account salt. Zeroed on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SecretKey([u8; 32]);

impl SecretKey {
    /// Derives the account encryption key from the password and location.
    pub fn derive(password: &Password, location: &AccountLocation) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(SECRET_CONTEXT);
        hasher.update(location.as_bytes());
        hasher.update(password.0.as_bytes());
        Self(hasher.finalize().into())
    }

    /// Creates a key from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SecretKey").field(&"[REDACTED]").finish()
    }
}

/// The ephemeral session public key an app presents when registering.
///
/// The Launcher treats it as opaque bytes; only the length is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPublicKey(#[serde(with = "serde_bytes")] pub [u8; SESSION_KEY_LENGTH]);

impl SessionPublicKey {
    /// Creates a session key from raw bytes.
    pub fn from_bytes(bytes: [u8; SESSION_KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Generates a fresh random session key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SESSION_KEY_LENGTH];
        rand::RngCore::fill_bytes(&mut OsRng, &mut bytes);
        Self(bytes)
    }

    /// Returns the raw bytes of this key.
    pub fn as_bytes(&self) -> &[u8; SESSION_KEY_LENGTH] {
        &self.0
    }
}

/// The long-lived signing identity of an account.
///
/// Generated once at account creation and persisted inside the encrypted
/// account blob. Used to prove account ownership to the storage network.
#[derive(Clone)]
pub struct AccountIdentity {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl AccountIdentity {
    /// Generates a new random account identity.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Restores an identity from secret key bytes.
    pub fn from_secret_key_bytes(bytes: &[u8; SECRET_KEY_LENGTH]) -> Self {
        let signing_key = SigningKey::from_bytes(bytes);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Returns the secret key bytes for persistence inside the account.
    pub fn secret_key_bytes(&self) -> [u8; SECRET_KEY_LENGTH] {
        self.signing_key.to_bytes()
    }

    /// Returns the public key bytes.
    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        self.verifying_key.to_bytes()
    }

    /// Signs a message with this account's secret key.
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LENGTH] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Verifies a signature against a message using this account's public key.
    pub fn verify(&self, message: &[u8], signature: &[u8; SIGNATURE_LENGTH]) -> Result<()> {
        let sig = Ed25519Signature::from_bytes(signature);
        self.verifying_key
            .verify(message, &sig)
            .map_err(ProtocolError::from)
    }
}

impl std::fmt::Debug for AccountIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountIdentity")
            .field("public_key", &"[REDACTED]")
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}
