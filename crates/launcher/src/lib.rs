//! # SafeLauncher Session Library
//!
//! This crate provides the account-session core of SafeLauncher: the
//! single authenticated gateway between a user's apps and their storage
//! on the SAFE network.
//!
//! ## Overview
//!
//! One [`Launcher`] per logged-in account owns everything the session
//! needs:
//!
//! - **App Registry**: transactional local/non-local app records with
//!   snapshot rollback
//! - **Account Codec**: MessagePack + XChaCha20-Poly1305 sealing of the
//!   account blob stored on the network
//! - **App Launch**: spawn an app and hand it directory access over a
//!   loopback handshake
//! - **Network Seam**: a small async trait the real storage client
//!   implements
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Launcher                            │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  ┌──────────────┐  ┌──────────────┐  ┌───────────────────┐  │
//! │  │     App      │  │   Account    │  │      Launch       │  │
//! │  │   Registry   │  │    Codec     │  │  State Machine    │  │
//! │  └──────────────┘  └──────────────┘  └───────────────────┘  │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────────┐ │
//! │  │              NetworkClient (async seam)                │ │
//! │  └────────────────────────────────────────────────────────┘ │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use launcher::{Config, InMemoryNetwork, Launcher};
//! use protocol::{Keyword, Password, Pin};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let network = Arc::new(InMemoryNetwork::new());
//!     let config = Config::load_or_default()?;
//!
//!     let launcher = Launcher::create_account(
//!         &Keyword("my keyword".into()),
//!         &Pin("1234".into()),
//!         &Password("my password".into()),
//!         network,
//!         &config,
//!     )
//!     .await?;
//!
//!     launcher.add_app(
//!         "editor".into(),
//!         "/usr/bin/editor".into(),
//!         vec![],
//!         vec![],
//!         false,
//!     )
//!     .await?;
//!     launcher.save_session(false).await?;
//!     launcher.logout_and_stop().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`apps`]: Transactional app registry
//! - [`account`]: Account payload sealing and unsealing
//! - [`network`]: Storage-network collaborator seam
//! - [`launch`]: Per-app launch handshake
//! - [`launcher`]: Session orchestrator
//! - [`error`]: Crate-wide error type

pub mod account;
pub mod apps;
pub mod config;
pub mod error;
pub mod launch;
pub mod launcher;
pub mod network;

// Re-export protocol for convenience
pub use protocol;

// Re-export config types for convenience
pub use config::{default_config_path, default_data_dir, init_tracing, Config, ConfigError};

// Re-export registry types for convenience
pub use apps::{AppArgs, AppDetails, AppHandler, AppName, Snapshot};

// Re-export account types for convenience
pub use account::{Account, AccountHandler, ACCOUNT_FORMAT_VERSION};

// Re-export network types for convenience
pub use network::{AccountGetter, InMemoryNetwork, NetworkClient, NetworkError, NetworkResult};

// Re-export launch types for convenience
pub use launch::{
    parse_port_arg, register_app_session, HandshakePhase, Launch, LaunchState, MessageStream,
    LAUNCHER_PORT_ARG,
};

// Re-export orchestrator types for convenience
pub use launcher::{Launcher, APP_DIR_ROOT, SAFE_DRIVE_PATH};

// Re-export error types for convenience
pub use error::{LauncherError, Result};
