//! Handshake message definitions.
//!
//! This module defines the three-message exchange between the Launcher and
//! a freshly spawned app, serialized with MessagePack:
//!
//! 1. App → Launcher: [`HandshakeMessage::SessionKey`]
//! 2. Launcher → App: [`HandshakeMessage::DirectoryAccess`]
//! 3. App → Launcher: [`HandshakeMessage::Confirm`]
//!
//! Any deviation from this order aborts the launch attempt.

use serde::{Deserialize, Serialize};

use crate::crypto::SessionPublicKey;
use crate::error::{ProtocolError, Result};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Envelope wrapper for all handshake messages.
///
/// Carries the protocol version so a Launcher and an app built against
/// different releases fail loudly instead of mis-parsing each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Protocol version for compatibility checking.
    pub version: u8,
    /// The actual message payload.
    pub payload: HandshakeMessage,
}

impl Envelope {
    /// Create a new envelope with the current protocol version.
    pub fn new(payload: HandshakeMessage) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            payload,
        }
    }

    /// Serialize to MessagePack bytes.
    pub fn to_msgpack(&self) -> Result<Vec<u8>> {
        // `to_vec_named` keeps field/tag names so the adjacently tagged
        // `HandshakeMessage` (including unit variants) roundtrips.
        Ok(rmp_serde::to_vec_named(self)?)
    }

    /// Deserialize from MessagePack bytes, rejecting unknown versions.
    pub fn from_msgpack(bytes: &[u8]) -> Result<Self> {
        let envelope: Envelope = rmp_serde::from_slice(bytes)?;
        if envelope.version != PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion {
                expected: PROTOCOL_VERSION,
                got: envelope.version,
            });
        }
        Ok(envelope)
    }
}

/// The messages exchanged during an app launch handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum HandshakeMessage {
    /// The app's ephemeral session public key, sent immediately after
    /// connecting. Opaque to the Launcher beyond its length.
    SessionKey(SessionPublicKey),
    /// The set of network directories the app is authorized to access.
    DirectoryAccess(DirectoryAccess),
    /// Final confirmation from the app that the grant was received.
    Confirm,
}

impl HandshakeMessage {
    /// Short name of the message kind, for logs and error reporting.
    pub fn kind(&self) -> &'static str {
        match self {
            HandshakeMessage::SessionKey(_) => "SessionKey",
            HandshakeMessage::DirectoryAccess(_) => "DirectoryAccess",
            HandshakeMessage::Confirm => "Confirm",
        }
    }
}

/// The directory grant sent from the Launcher to the app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryAccess {
    /// Directories the app may reach, with their access rights.
    pub directories: Vec<DirectoryInfo>,
}

/// One network directory descriptor.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DirectoryInfo {
    /// Human-readable directory name.
    pub name: String,
    /// Path of the directory on the network drive.
    pub path: String,
    /// What the holder may do inside the directory.
    pub access: AccessRights,
}

/// Access rights on a network directory.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum AccessRights {
    /// No access.
    #[default]
    None,
    /// Read-only access.
    ReadOnly,
    /// Full read/write access.
    ReadWrite,
}
