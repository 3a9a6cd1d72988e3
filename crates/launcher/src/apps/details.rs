//! Registered-application records.

use std::path::PathBuf;

use protocol::AccessRights;
use serde::{Deserialize, Serialize};

/// Unique name of a registered app within its set.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AppName(pub String);

impl AppName {
    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AppName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AppName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for AppName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Ordered launch arguments for an app.
pub type AppArgs = Vec<String>;

/// One registered application.
///
/// `name` is the unique key within its set; ordering is by name first so
/// listings come out sorted the way users expect.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct AppDetails {
    /// Unique app name.
    pub name: AppName,
    /// Location of the executable on this machine.
    pub path: PathBuf,
    /// Launch arguments, in order.
    pub args: AppArgs,
    /// Opaque icon blob; never inspected by the Launcher.
    #[serde(with = "serde_bytes")]
    pub icon: Vec<u8>,
    /// Whether the app should start when the Launcher starts.
    pub auto_start: bool,
    /// The app's access rights on the shared SafeDrive directory.
    pub safe_drive_access: AccessRights,
}

impl AppDetails {
    /// Creates a locally registered app with no SafeDrive access.
    pub fn new(
        name: AppName,
        path: PathBuf,
        args: AppArgs,
        icon: Vec<u8>,
        auto_start: bool,
    ) -> Self {
        Self {
            name,
            path,
            args,
            icon,
            auto_start,
            safe_drive_access: AccessRights::None,
        }
    }
}
