//! The session orchestrator.
//!
//! A [`Launcher`] is built by [`Launcher::login`] or
//! [`Launcher::create_account`] and owns one account session end to end:
//! the decryption handler, the app registry, the network handle and the
//! launch timeouts. Registry state lives behind a single async mutex;
//! registry operations are infrequent and must be atomic as a whole, so
//! no finer-grained locking is used. Launch attempts hold the mutex only
//! long enough to read the target app's record, then drive their
//! handshake independently.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use protocol::{
    AccessRights, AccountIdentity, AccountLocation, DirectoryInfo, Keyword, Password, Pin,
    SecretKey, SessionPublicKey,
};

use crate::account::{Account, AccountHandler};
use crate::apps::{AppArgs, AppDetails, AppHandler, AppName, Snapshot};
use crate::config::Config;
use crate::error::{LauncherError, Result};
use crate::launch::Launch;
use crate::network::NetworkClient;

/// Path of the SafeDrive root granted to apps with drive access.
pub const SAFE_DRIVE_PATH: &str = "/safe-drive";

/// Root under which each app's private directory lives.
pub const APP_DIR_ROOT: &str = "/apps";

/// Mutable session state, guarded by the one session mutex.
struct Session {
    apps: AppHandler,
    /// Registry state as of the last successful save, or the post-login
    /// state if none has happened yet. Target of reverts.
    last_saved: Snapshot,
    /// Cleared by `logout_and_stop`; every call checks it first.
    open: bool,
}

/// An authenticated account session.
pub struct Launcher {
    account: AccountHandler,
    location: AccountLocation,
    network: Arc<dyn NetworkClient>,
    session: Mutex<Session>,
    connect_timeout: Duration,
    handshake_timeout: Duration,
}

impl Launcher {
    /// Logs into an existing account.
    ///
    /// Derives the account location from keyword and pin and the sealing
    /// key from password and location, fetches the stored blob and
    /// decodes it. A missing blob is `AccountNotFound`; a blob that will
    /// not decrypt is `DecryptionFailed`. Callers rely on telling those
    /// apart.
    pub async fn login(
        keyword: &Keyword,
        pin: &Pin,
        password: &Password,
        network: Arc<dyn NetworkClient>,
        config: &Config,
    ) -> Result<Self> {
        let location = AccountLocation::derive(keyword, pin);
        let key = SecretKey::derive(password, &location);
        debug!(account = %location.fingerprint(), "logging in");

        let blob = network.get(&location).await?;
        let (account, payload) = AccountHandler::open(key, &blob)?;

        let apps = AppHandler::from_registry(
            payload.local_apps.clone(),
            payload.non_local_apps.clone(),
        );
        info!(
            account = %location.fingerprint(),
            local_apps = payload.local_apps.len(),
            non_local_apps = payload.non_local_apps.len(),
            "login complete"
        );
        Ok(Self::assemble(account, location, network, apps, config))
    }

    /// Creates a brand-new account and returns its session.
    ///
    /// Generates a fresh signing identity, seals an empty registry and
    /// stores it at the derived location. Refuses with
    /// `AccountAlreadyExists` if the location is occupied, so existing
    /// data is never silently overwritten.
    pub async fn create_account(
        keyword: &Keyword,
        pin: &Pin,
        password: &Password,
        network: Arc<dyn NetworkClient>,
        config: &Config,
    ) -> Result<Self> {
        let location = AccountLocation::derive(keyword, pin);
        let key = SecretKey::derive(password, &location);
        debug!(account = %location.fingerprint(), "creating account");

        if network.exists(&location).await? {
            return Err(LauncherError::AccountAlreadyExists);
        }

        let identity = AccountIdentity::generate();
        let account = AccountHandler::new(key, identity);
        let blob = account.encode(&Account::new(account.identity()))?;
        network.put(location, blob).await?;

        info!(account = %location.fingerprint(), "account created");
        Ok(Self::assemble(
            account,
            location,
            network,
            AppHandler::new(),
            config,
        ))
    }

    fn assemble(
        account: AccountHandler,
        location: AccountLocation,
        network: Arc<dyn NetworkClient>,
        apps: AppHandler,
        config: &Config,
    ) -> Self {
        let last_saved = apps.snapshot();
        Self {
            account,
            location,
            network,
            session: Mutex::new(Session {
                apps,
                last_saved,
                open: true,
            }),
            connect_timeout: config.launch.connect_timeout(),
            handshake_timeout: config.launch.handshake_timeout(),
        }
    }

    /// Returns the requested set of registered apps, sorted by name.
    pub async fn get_apps(&self, locally_available: bool) -> Result<BTreeSet<AppDetails>> {
        let session = self.session.lock().await;
        Self::ensure_open(&session)?;
        Ok(session.apps.apps(locally_available))
    }

    /// Whether the registry has unsaved mutations.
    pub async fn is_dirty(&self) -> Result<bool> {
        let session = self.session.lock().await;
        Self::ensure_open(&session)?;
        Ok(session.apps.dirty())
    }

    /// Registers a new app on this machine.
    pub async fn add_app(
        &self,
        name: AppName,
        path: PathBuf,
        args: AppArgs,
        icon: Vec<u8>,
        auto_start: bool,
    ) -> Result<()> {
        self.mutate(|apps| apps.add_local(name, path, args, icon, auto_start))
            .await
    }

    /// Makes an app registered on another machine launchable here.
    pub async fn link_app(
        &self,
        name: AppName,
        path: PathBuf,
        args: AppArgs,
        auto_start: bool,
    ) -> Result<()> {
        self.mutate(|apps| apps.link_local(name, path, args, auto_start))
            .await
    }

    /// Renames an app in whichever set holds it.
    pub async fn update_app_name(&self, name: &AppName, new_name: AppName) -> Result<()> {
        self.mutate(|apps| apps.update_name(name, new_name)).await
    }

    /// Updates the executable path of a locally registered app.
    pub async fn update_app_path(&self, name: &AppName, new_path: PathBuf) -> Result<()> {
        self.mutate(|apps| apps.update_path(name, new_path)).await
    }

    /// Updates the launch arguments of a locally registered app.
    pub async fn update_app_args(&self, name: &AppName, new_args: AppArgs) -> Result<()> {
        self.mutate(|apps| apps.update_args(name, new_args)).await
    }

    /// Updates an app's SafeDrive access grant.
    pub async fn update_app_safe_drive_access(
        &self,
        name: &AppName,
        access: AccessRights,
    ) -> Result<()> {
        self.mutate(|apps| apps.update_safe_drive_access(name, access))
            .await
    }

    /// Replaces an app's icon blob.
    pub async fn update_app_icon(&self, name: &AppName, new_icon: Vec<u8>) -> Result<()> {
        self.mutate(|apps| apps.update_icon(name, new_icon)).await
    }

    /// Toggles auto-start for a locally registered app.
    pub async fn update_app_auto_start(&self, name: &AppName, auto_start: bool) -> Result<()> {
        self.mutate(|apps| apps.update_auto_start(name, auto_start))
            .await
    }

    /// Removes an app from this machine's local set. The account keeps
    /// no record of it; other machines are unaffected.
    pub async fn remove_app_locally(&self, name: &AppName) -> Result<()> {
        self.mutate(|apps| apps.remove_local(name).map(|_| ())).await
    }

    /// Removes another machine's app from the account-wide registry.
    pub async fn remove_app_from_network(&self, name: &AppName) -> Result<()> {
        self.mutate(|apps| apps.remove_non_local(name).map(|_| ()))
            .await
    }

    /// Runs one registry mutation under the session mutex with
    /// snapshot/rollback, giving the strong guarantee.
    async fn mutate<F>(&self, op: F) -> Result<()>
    where
        F: FnOnce(&mut AppHandler) -> Result<()>,
    {
        let mut session = self.session.lock().await;
        Self::ensure_open(&session)?;

        let before = session.apps.snapshot();
        match op(&mut session.apps) {
            Ok(()) => Ok(()),
            Err(err) => {
                session.apps.restore(before);
                Err(err)
            }
        }
    }

    /// Persists the current registry to the network.
    ///
    /// A no-op when the registry is clean, unless `force` is set. On
    /// success the dirty flag clears and the saved state becomes the
    /// revert target. On failure nothing changes; a transient failure
    /// leaves the dirty flag set so the caller can retry.
    pub async fn save_session(&self, force: bool) -> Result<()> {
        let mut session = self.session.lock().await;
        Self::ensure_open(&session)?;

        if !force && !session.apps.dirty() {
            debug!("registry clean, skipping save");
            return Ok(());
        }

        let mut payload = Account::new(self.account.identity());
        payload.local_apps = session.apps.local().clone();
        payload.non_local_apps = session.apps.non_local().clone();

        let blob = self.account.encode(&payload)?;
        if let Err(err) = self.network.put(self.location, blob).await {
            warn!(account = %self.location.fingerprint(), error = %err, "save failed");
            return Err(err.into());
        }

        session.apps.set_clean();
        session.last_saved = session.apps.snapshot();
        info!(account = %self.location.fingerprint(), "session saved");
        Ok(())
    }

    /// Discards all mutations since the last successful save (or since
    /// login if none) and clears the dirty flag.
    pub async fn revert_to_last_saved_session(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        Self::ensure_open(&session)?;

        let saved = session.last_saved.clone();
        session.apps.restore(saved);
        session.apps.set_clean();
        info!("registry reverted to last saved state");
        Ok(())
    }

    /// Ends the session. Does NOT save; call
    /// [`Launcher::save_session`] first if persistence is wanted. Every
    /// call after this one fails with `InvalidState`.
    pub async fn logout_and_stop(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        Self::ensure_open(&session)?;

        session.open = false;
        session.apps = AppHandler::new();
        info!(account = %self.location.fingerprint(), "logged out");
        Ok(())
    }

    /// Launches a locally registered app and drives the session
    /// handshake to completion.
    ///
    /// The session mutex is held only while the app's record is read;
    /// concurrent launches of different apps proceed without contention.
    /// Returns the session public key the app presented.
    pub async fn launch_app(&self, name: &AppName) -> Result<SessionPublicKey> {
        let (details, directories) = {
            let session = self.session.lock().await;
            Self::ensure_open(&session)?;

            let details = session
                .apps
                .get_local(name)
                .cloned()
                .ok_or_else(|| LauncherError::NotFound {
                    name: name.0.clone(),
                })?;
            let directories = Self::authorized_directories(&details);
            (details, directories)
        };

        let mut launch = Launch::new(
            name.clone(),
            details.path,
            details.args,
            directories,
            self.connect_timeout,
            self.handshake_timeout,
        );
        launch.run().await
    }

    /// Computes the directory grant for an app: its private directory,
    /// plus the SafeDrive root when it has been granted access.
    fn authorized_directories(details: &AppDetails) -> Vec<DirectoryInfo> {
        let mut directories = vec![DirectoryInfo {
            name: details.name.0.clone(),
            path: format!("{}/{}", APP_DIR_ROOT, details.name),
            access: AccessRights::ReadWrite,
        }];
        if details.safe_drive_access != AccessRights::None {
            directories.push(DirectoryInfo {
                name: "SafeDrive".to_string(),
                path: SAFE_DRIVE_PATH.to_string(),
                access: details.safe_drive_access,
            });
        }
        directories
    }

    fn ensure_open(session: &Session) -> Result<()> {
        if session.open {
            Ok(())
        } else {
            Err(LauncherError::InvalidState(
                "launcher already logged out".to_string(),
            ))
        }
    }
}

impl std::fmt::Debug for Launcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Launcher")
            .field("location", &self.location)
            .field("connect_timeout", &self.connect_timeout)
            .field("handshake_timeout", &self.handshake_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::InMemoryNetwork;

    fn credentials() -> (Keyword, Pin, Password) {
        (
            Keyword("a sufficiently long keyword".to_string()),
            Pin("1234".to_string()),
            Password("correct horse battery staple".to_string()),
        )
    }

    async fn fresh_launcher(network: Arc<InMemoryNetwork>) -> Launcher {
        let (keyword, pin, password) = credentials();
        Launcher::create_account(&keyword, &pin, &password, network, &Config::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_then_login_roundtrip() {
        let network = Arc::new(InMemoryNetwork::new());
        let (keyword, pin, password) = credentials();

        let launcher = fresh_launcher(network.clone()).await;
        launcher
            .add_app(
                AppName::from("editor"),
                PathBuf::from("/usr/bin/editor"),
                vec!["--fast".to_string()],
                vec![7],
                false,
            )
            .await
            .unwrap();
        launcher.save_session(false).await.unwrap();

        let restored =
            Launcher::login(&keyword, &pin, &password, network, &Config::default())
                .await
                .unwrap();
        let apps = restored.get_apps(true).await.unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps.first().unwrap().name.as_str(), "editor");
        assert!(!restored.is_dirty().await.unwrap());
    }

    #[tokio::test]
    async fn test_login_without_account_is_not_found() {
        let network: Arc<dyn NetworkClient> = Arc::new(InMemoryNetwork::new());
        let (keyword, pin, password) = credentials();

        let result =
            Launcher::login(&keyword, &pin, &password, network, &Config::default()).await;
        assert!(matches!(result, Err(LauncherError::AccountNotFound)));
    }

    #[tokio::test]
    async fn test_wrong_password_is_decryption_failed() {
        let network = Arc::new(InMemoryNetwork::new());
        let (keyword, pin, _) = credentials();
        let _launcher = fresh_launcher(network.clone()).await;

        let result = Launcher::login(
            &keyword,
            &pin,
            &Password("a typo".to_string()),
            network,
            &Config::default(),
        )
        .await;
        assert!(matches!(result, Err(LauncherError::DecryptionFailed)));
    }

    #[tokio::test]
    async fn test_double_create_is_already_exists() {
        let network = Arc::new(InMemoryNetwork::new());
        let (keyword, pin, password) = credentials();
        let _first = fresh_launcher(network.clone()).await;

        let result = Launcher::create_account(
            &keyword,
            &pin,
            &password,
            network.clone(),
            &Config::default(),
        )
        .await;
        assert!(matches!(result, Err(LauncherError::AccountAlreadyExists)));
        assert_eq!(network.len(), 1);
    }

    #[tokio::test]
    async fn test_save_skips_network_when_clean() {
        let network = Arc::new(InMemoryNetwork::new());
        let launcher = fresh_launcher(network.clone()).await;
        let before = network.get(&launcher.location).await.unwrap();

        launcher.save_session(false).await.unwrap();
        let after = network.get(&launcher.location).await.unwrap();
        assert_eq!(before, after, "clean non-forced save must not write");

        // A forced save always writes; the fresh nonce changes the blob.
        launcher.save_session(true).await.unwrap();
        let forced = network.get(&launcher.location).await.unwrap();
        assert_ne!(before, forced);
    }

    #[tokio::test]
    async fn test_revert_restores_last_save_not_login_state() {
        let network = Arc::new(InMemoryNetwork::new());
        let launcher = fresh_launcher(network).await;

        launcher
            .add_app(
                AppName::from("keeper"),
                PathBuf::from("/bin/keeper"),
                vec![],
                vec![],
                false,
            )
            .await
            .unwrap();
        launcher.save_session(false).await.unwrap();

        launcher
            .add_app(
                AppName::from("discarded"),
                PathBuf::from("/bin/discarded"),
                vec![],
                vec![],
                false,
            )
            .await
            .unwrap();
        launcher.revert_to_last_saved_session().await.unwrap();

        let apps = launcher.get_apps(true).await.unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps.first().unwrap().name.as_str(), "keeper");
        assert!(!launcher.is_dirty().await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_mutation_leaves_registry_unchanged() {
        let network = Arc::new(InMemoryNetwork::new());
        let launcher = fresh_launcher(network).await;
        launcher
            .add_app(
                AppName::from("app"),
                PathBuf::from("/bin/app"),
                vec![],
                vec![],
                false,
            )
            .await
            .unwrap();
        let before = launcher.get_apps(true).await.unwrap();

        let result = launcher
            .add_app(
                AppName::from("app"),
                PathBuf::from("/bin/other"),
                vec![],
                vec![],
                true,
            )
            .await;
        assert!(matches!(result, Err(LauncherError::AlreadyExists { .. })));
        assert_eq!(launcher.get_apps(true).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_logout_poisons_further_calls() {
        let network = Arc::new(InMemoryNetwork::new());
        let launcher = fresh_launcher(network).await;
        launcher.logout_and_stop().await.unwrap();

        assert!(matches!(
            launcher.get_apps(true).await,
            Err(LauncherError::InvalidState(_))
        ));
        assert!(matches!(
            launcher.save_session(true).await,
            Err(LauncherError::InvalidState(_))
        ));
        assert!(matches!(
            launcher.logout_and_stop().await,
            Err(LauncherError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_launch_unknown_app_is_not_found() {
        let network = Arc::new(InMemoryNetwork::new());
        let launcher = fresh_launcher(network).await;

        let result = launcher.launch_app(&AppName::from("ghost")).await;
        assert!(matches!(result, Err(LauncherError::NotFound { .. })));
    }

    #[test]
    fn test_directory_grant_includes_safe_drive_when_granted() {
        let mut details = AppDetails::new(
            AppName::from("notes"),
            PathBuf::from("/bin/notes"),
            vec![],
            vec![],
            false,
        );
        let bare = Launcher::authorized_directories(&details);
        assert_eq!(bare.len(), 1);
        assert_eq!(bare[0].path, "/apps/notes");
        assert_eq!(bare[0].access, AccessRights::ReadWrite);

        details.safe_drive_access = AccessRights::ReadOnly;
        let granted = Launcher::authorized_directories(&details);
        assert_eq!(granted.len(), 2);
        assert_eq!(granted[1].path, SAFE_DRIVE_PATH);
        assert_eq!(granted[1].access, AccessRights::ReadOnly);
    }
}
