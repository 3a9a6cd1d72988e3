//! App-side registration helper.
//!
//! A launched app parses the port from its arguments, generates a
//! session key and calls [`register_app_session`] to complete the
//! handshake and receive its directory grant.

use tokio::net::TcpStream;
use tracing::debug;

use protocol::{DirectoryInfo, HandshakeMessage, ProtocolError, SessionPublicKey};

use super::connection::MessageStream;
use super::handshake::LAUNCHER_PORT_ARG;

/// Extracts the listener port from the `--launcher_port=<port>`
/// argument a launched process was spawned with.
pub fn parse_port_arg<I, S>(args: I) -> Option<u16>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let prefix = format!("{}=", LAUNCHER_PORT_ARG);
    args.into_iter().find_map(|arg| {
        arg.as_ref()
            .strip_prefix(&prefix)
            .and_then(|value| value.parse().ok())
    })
}

/// Connects back to a listening launcher and runs the app side of the
/// handshake: present `session_key`, receive the directory grant,
/// confirm. Returns the granted directories.
pub async fn register_app_session(
    port: u16,
    session_key: SessionPublicKey,
) -> protocol::Result<Vec<DirectoryInfo>> {
    let stream = TcpStream::connect(("127.0.0.1", port)).await?;
    let mut messages = MessageStream::new(stream);

    messages
        .send(HandshakeMessage::SessionKey(session_key))
        .await?;

    let directories = match messages.recv().await? {
        HandshakeMessage::DirectoryAccess(access) => access.directories,
        other => {
            return Err(ProtocolError::UnexpectedMessage {
                expected: "DirectoryAccess",
                got: other.kind(),
            })
        }
    };

    messages.send(HandshakeMessage::Confirm).await?;
    debug!(port, directories = directories.len(), "app session registered");
    Ok(directories)
}
