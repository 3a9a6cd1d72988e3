//! App launch and session registration.
//!
//! Launching an app means proving to it, over a loopback TCP
//! connection, which directories it has been granted. The launcher
//! binds a listener on a random unprivileged port, spawns the app with
//! `--launcher_port=<port>` appended to its arguments and drives a
//! three message exchange: the app presents a session public key, the
//! launcher answers with the directory grant, the app confirms. After
//! confirmation the connection is closed and the app runs on with no
//! link back to the launcher.

mod client;
mod connection;
mod handshake;

pub use client::{parse_port_arg, register_app_session};
pub use connection::MessageStream;
pub use handshake::{
    HandshakePhase, Launch, LaunchState, LAUNCHER_PORT_ARG, MIN_LAUNCHER_PORT,
};
