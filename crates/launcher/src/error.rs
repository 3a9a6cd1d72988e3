//! Error types for the launcher crate.

use thiserror::Error;

use crate::launch::HandshakePhase;
use crate::network::NetworkError;
use protocol::ProtocolError;

/// Launcher error type.
///
/// Every public mutating operation on the Launcher provides the strong
/// guarantee: when one of these errors is returned, observable state
/// (registry contents, dirty flag) is exactly as before the call.
#[derive(Debug, Error)]
pub enum LauncherError {
    // Registry errors
    /// An app with this name is already registered (locally or non-locally).
    #[error("app already exists: {name}")]
    AlreadyExists {
        /// The conflicting app name.
        name: String,
    },

    /// The named app is absent from the targeted set.
    #[error("app not found: {name}")]
    NotFound {
        /// The missing app name.
        name: String,
    },

    // Account errors
    /// No account blob exists at the derived network location.
    #[error("account not found on the network")]
    AccountNotFound,

    /// The derived network location is already occupied.
    #[error("an account already exists for these credentials")]
    AccountAlreadyExists,

    /// The stored blob exists but cannot be decrypted; almost always a
    /// wrong password. Distinct from [`LauncherError::AccountNotFound`].
    #[error("account decryption failed")]
    DecryptionFailed,

    /// The blob decrypted but its contents do not parse as an account.
    #[error("stored account data is corrupt: {0}")]
    CorruptAccount(String),

    // Launch errors
    /// A launch attempt exceeded its connect or handshake deadline.
    #[error("handshake timed out during {phase}")]
    HandshakeTimeout {
        /// The phase whose deadline was exceeded.
        phase: HandshakePhase,
    },

    /// A launch attempt was aborted by bad input or a dropped connection.
    #[error("handshake aborted: {0}")]
    HandshakeAborted(String),

    /// Could not bind a loopback listener for a launch attempt.
    #[error("failed to bind a launch listener: {0}")]
    ListenerBind(String),

    /// The target executable could not be spawned.
    #[error("failed to spawn app process: {0}")]
    SpawnFailed(String),

    // Network errors
    /// A network operation failed in a way that is safe to retry.
    #[error("transient network failure: {0}")]
    TransientNetworkFailure(String),

    /// A failure that retrying blindly will not fix; user action needed.
    #[error("permanent failure: {0}")]
    PermanentFailure(String),

    // Lifecycle errors
    /// The operation was called on a Launcher in the wrong state, e.g.
    /// after `logout_and_stop`.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias for launcher operations.
pub type Result<T> = std::result::Result<T, LauncherError>;

impl LauncherError {
    /// Whether retrying the failed operation unchanged is reasonable.
    ///
    /// `save_session` and `login` callers use this to decide between a
    /// retry prompt and a re-authentication prompt.
    pub fn is_transient(&self) -> bool {
        matches!(self, LauncherError::TransientNetworkFailure(_))
    }
}

impl From<NetworkError> for LauncherError {
    fn from(err: NetworkError) -> Self {
        match err {
            NetworkError::NotFound => LauncherError::AccountNotFound,
            NetworkError::Transient(msg) => LauncherError::TransientNetworkFailure(msg),
            NetworkError::Permanent(msg) => LauncherError::PermanentFailure(msg),
        }
    }
}

impl From<ProtocolError> for LauncherError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Timeout(msg) => LauncherError::TransientNetworkFailure(msg),
            other => LauncherError::HandshakeAborted(other.to_string()),
        }
    }
}
