//! Per-launch handshake state machine.
//!
//! Each launch attempt is an owned [`Launch`] value that moves through an
//! explicit state sequence:
//!
//! ```text
//! Idle → Listening → Connected → KeyReceived → DirectoriesSent → Confirmed
//! ```
//!
//! with `TimedOut` and `Aborted` as terminal failure states reachable
//! from any non-terminal state. Suspension points (awaiting the inbound
//! connection, the key, the confirmation) are awaited with explicit
//! deadlines; timeout is the only cancellation mechanism. A failure
//! tears down this attempt's listener and connection only; other
//! in-flight launches and the Launcher itself are unaffected.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use rand::Rng;
use tokio::net::TcpListener;
use tokio::process::Command;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};

use protocol::{DirectoryAccess, DirectoryInfo, HandshakeMessage, SessionPublicKey};

use super::connection::MessageStream;
use crate::apps::AppName;
use crate::error::{LauncherError, Result};

/// The command-line argument carrying the listening port to the app.
pub const LAUNCHER_PORT_ARG: &str = "--launcher_port";

/// Lowest port handed to a launched app; below this sits the privileged
/// range.
pub const MIN_LAUNCHER_PORT: u16 = 1025;

/// How many random ports to try before giving up on binding a listener.
const MAX_BIND_ATTEMPTS: u32 = 16;

/// The handshake step a deadline is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    /// Waiting for the spawned app to connect back.
    Connect,
    /// Waiting for the app's session public key.
    KeyExchange,
    /// Sending the directory grant.
    DirectoryDelivery,
    /// Waiting for the app's final confirmation.
    Confirmation,
}

impl std::fmt::Display for HandshakePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            HandshakePhase::Connect => "connect",
            HandshakePhase::KeyExchange => "key exchange",
            HandshakePhase::DirectoryDelivery => "directory delivery",
            HandshakePhase::Confirmation => "confirmation",
        };
        write!(f, "{}", name)
    }
}

/// State of one launch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchState {
    /// Created, nothing bound yet.
    Idle,
    /// Listener bound, app spawned, awaiting the inbound connection.
    Listening,
    /// App connected; awaiting its session key.
    Connected,
    /// Session key received; grant not yet sent.
    KeyReceived,
    /// Directory grant sent; awaiting confirmation.
    DirectoriesSent,
    /// Handshake complete; the app is orphaned. Terminal success.
    Confirmed,
    /// A deadline elapsed during the named phase. Terminal.
    TimedOut(HandshakePhase),
    /// Bad input or a dropped connection ended the attempt. Terminal.
    Aborted,
}

/// One launch attempt: the app being launched, its listener port once
/// bound, and the current handshake state.
///
/// Owned by the single `launch_app` call driving it and discarded when
/// the handshake reaches a terminal state; a confirmed app keeps running
/// with no reference back to the Launcher.
pub struct Launch {
    name: AppName,
    path: PathBuf,
    args: Vec<String>,
    directories: Vec<DirectoryInfo>,
    connect_timeout: Duration,
    handshake_timeout: Duration,
    state: LaunchState,
    listener: Option<TcpListener>,
    port: Option<u16>,
}

impl Launch {
    /// Prepares a launch attempt. Nothing happens until [`Launch::run`].
    pub fn new(
        name: AppName,
        path: PathBuf,
        args: Vec<String>,
        directories: Vec<DirectoryInfo>,
        connect_timeout: Duration,
        handshake_timeout: Duration,
    ) -> Self {
        Self {
            name,
            path,
            args,
            directories,
            connect_timeout,
            handshake_timeout,
            state: LaunchState::Idle,
            listener: None,
            port: None,
        }
    }

    /// The current state of this attempt.
    pub fn state(&self) -> LaunchState {
        self.state
    }

    /// The bound listener port, once listening.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Binds the loopback listener, choosing a random port in
    /// `[MIN_LAUNCHER_PORT, 65535]`. Called implicitly by
    /// [`Launch::run`] if not already done; calling it first makes the
    /// port observable before the handshake is driven.
    pub async fn bind(&mut self) -> Result<()> {
        if self.listener.is_some() {
            return Ok(());
        }
        for _ in 0..MAX_BIND_ATTEMPTS {
            let port = rand::thread_rng().gen_range(MIN_LAUNCHER_PORT..=u16::MAX);
            match TcpListener::bind(("127.0.0.1", port)).await {
                Ok(listener) => {
                    self.listener = Some(listener);
                    self.port = Some(port);
                    self.state = LaunchState::Listening;
                    debug!(app = %self.name, port, "launch listener bound");
                    return Ok(());
                }
                Err(e) => {
                    debug!(app = %self.name, port, error = %e, "port unavailable, retrying");
                }
            }
        }
        self.state = LaunchState::Aborted;
        Err(LauncherError::ListenerBind(format!(
            "no free port after {} attempts",
            MAX_BIND_ATTEMPTS
        )))
    }

    /// Drives the attempt to a terminal state.
    ///
    /// On success returns the session public key the app presented and
    /// leaves the attempt `Confirmed`; the connection is already closed
    /// and the app orphaned. On failure the state records whether the
    /// attempt timed out (and in which phase) or was aborted.
    pub async fn run(&mut self) -> Result<SessionPublicKey> {
        self.bind().await?;
        let listener = self
            .listener
            .take()
            .ok_or_else(|| LauncherError::InvalidState("listener missing".to_string()))?;
        self.spawn_app()?;

        // Listening → Connected, bounded by the connect budget
        let (stream, peer) = match timeout(self.connect_timeout, listener.accept()).await {
            Ok(Ok(accepted)) => accepted,
            Ok(Err(e)) => return Err(self.abort(format!("accept failed: {}", e))),
            Err(_) => return Err(self.time_out(HandshakePhase::Connect)),
        };
        self.state = LaunchState::Connected;
        debug!(app = %self.name, peer = %peer, "app connected");

        // The remaining three steps share one deadline
        let deadline = Instant::now() + self.handshake_timeout;
        let mut messages = MessageStream::new(stream);

        // Connected → KeyReceived
        let key = match timeout_at(deadline, messages.recv()).await {
            Ok(Ok(HandshakeMessage::SessionKey(key))) => key,
            Ok(Ok(other)) => {
                return Err(self.abort(format!(
                    "expected SessionKey, got {}",
                    other.kind()
                )))
            }
            Ok(Err(e)) => return Err(self.abort(e.to_string())),
            Err(_) => return Err(self.time_out(HandshakePhase::KeyExchange)),
        };
        self.state = LaunchState::KeyReceived;

        // KeyReceived → DirectoriesSent
        let grant = HandshakeMessage::DirectoryAccess(DirectoryAccess {
            directories: self.directories.clone(),
        });
        match timeout_at(deadline, messages.send(grant)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(self.abort(e.to_string())),
            Err(_) => return Err(self.time_out(HandshakePhase::DirectoryDelivery)),
        }
        self.state = LaunchState::DirectoriesSent;

        // DirectoriesSent → Confirmed
        match timeout_at(deadline, messages.recv()).await {
            Ok(Ok(HandshakeMessage::Confirm)) => {}
            Ok(Ok(other)) => {
                return Err(self.abort(format!("expected Confirm, got {}", other.kind())))
            }
            Ok(Err(e)) => return Err(self.abort(e.to_string())),
            Err(_) => return Err(self.time_out(HandshakePhase::Confirmation)),
        }

        self.state = LaunchState::Confirmed;
        info!(app = %self.name, "handshake confirmed, app orphaned");
        // Dropping the stream and listener here severs the last link to
        // the child process.
        Ok(key)
    }

    /// Spawns the target executable as a detached child with the
    /// listener port appended to its arguments.
    fn spawn_app(&mut self) -> Result<()> {
        let port = self.port.ok_or_else(|| {
            LauncherError::InvalidState("spawn before listener bound".to_string())
        })?;

        let child = Command::new(&self.path)
            .args(&self.args)
            .arg(format!("{}={}", LAUNCHER_PORT_ARG, port))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(false)
            .spawn()
            .map_err(|e| {
                self.state = LaunchState::Aborted;
                LauncherError::SpawnFailed(format!("{}: {}", self.path.display(), e))
            })?;

        info!(app = %self.name, pid = child.id(), port, "app process spawned");
        // The child handle is dropped without waiting; a timed-out child
        // keeps running but never receives directory access.
        Ok(())
    }

    fn time_out(&mut self, phase: HandshakePhase) -> LauncherError {
        warn!(app = %self.name, %phase, "launch attempt timed out");
        self.state = LaunchState::TimedOut(phase);
        LauncherError::HandshakeTimeout { phase }
    }

    fn abort(&mut self, reason: String) -> LauncherError {
        warn!(app = %self.name, reason = %reason, "launch attempt aborted");
        self.state = LaunchState::Aborted;
        LauncherError::HandshakeAborted(reason)
    }
}
