//! # SafeLauncher Protocol Library
//!
//! This crate provides the wire protocol and cryptographic primitives for
//! the SafeLauncher session core.
//!
//! ## Overview
//!
//! - **Handshake Messages**: the three-message exchange that hands a
//!   launched app its directory access grant
//! - **Cryptographic Identity**: Ed25519 account identity plus the
//!   deterministic derivation of account location and encryption key
//!   from the user's keyword, pin and password
//! - **Frame Codec**: length-prefixed framing with optional LZ4
//!   compression for the loopback handshake connection
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          Handshake Messages             │  MessagePack-encoded
//! ├─────────────────────────────────────────┤
//! │              Framing                    │  Length-prefixed, LZ4
//! ├─────────────────────────────────────────┤
//! │         Transport (loopback TCP)        │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`crypto`]: Account identity, session keys, secret derivation
//! - [`messages`]: Handshake message definitions
//! - [`framing`]: Frame codec with compression
//! - [`error`]: Error types

pub mod crypto;
pub mod error;
pub mod framing;
pub mod messages;

pub use crypto::{
    AccountIdentity, AccountLocation, Keyword, Password, Pin, SecretKey, SessionPublicKey,
    LOCATION_LENGTH, SESSION_KEY_LENGTH,
};
pub use error::{ProtocolError, Result};
pub use framing::{
    Frame, FrameCodec, FrameFlags, COMPRESSION_THRESHOLD, FRAME_HEADER_SIZE, FRAME_MAGIC,
    MAX_FRAME_SIZE,
};
pub use messages::{
    AccessRights, DirectoryAccess, DirectoryInfo, Envelope, HandshakeMessage, PROTOCOL_VERSION,
};
