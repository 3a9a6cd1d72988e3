//! End-to-end integration tests for SafeLauncher.
//!
//! These tests verify complete flows work correctly:
//! - Account lifecycle (create, login, save, revert, logout)
//! - Registry invariants across mutation sequences
//! - Launch handshake against a scripted app
//! - Save behavior over an unreliable network

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use launcher::apps::{AppDetails, AppName};
use launcher::config::Config;
use launcher::launch::{register_app_session, Launch, LaunchState};
use launcher::launcher::Launcher;
use launcher::network::{InMemoryNetwork, NetworkClient, NetworkError, NetworkResult};
use launcher::{Account, AccountHandler, LauncherError};
use protocol::{
    AccessRights, AccountIdentity, AccountLocation, Keyword, Password, Pin, SecretKey,
    SessionPublicKey,
};

fn credentials() -> (Keyword, Pin, Password) {
    (
        Keyword("integration keyword".to_string()),
        Pin("0000".to_string()),
        Password("integration password".to_string()),
    )
}

fn fast_config() -> Config {
    let mut config = Config::default();
    config.launch.connect_timeout_ms = 300;
    config.launch.handshake_timeout_ms = 500;
    config
}

/// Seeds the network with an account whose registry already holds one
/// app registered "on another machine".
async fn seed_account_with_non_local(
    network: &InMemoryNetwork,
    app_name: &str,
) -> AccountLocation {
    let (keyword, pin, password) = credentials();
    let location = AccountLocation::derive(&keyword, &pin);
    let key = SecretKey::derive(&password, &location);
    let handler = AccountHandler::new(key, AccountIdentity::generate());

    let mut non_local = BTreeMap::new();
    let name = AppName::from(app_name);
    non_local.insert(
        name.clone(),
        AppDetails::new(
            name,
            PathBuf::from("/remote/machine/bin/app"),
            vec![],
            vec![0xAB],
            false,
        ),
    );

    let mut account = Account::new(handler.identity());
    account.non_local_apps = non_local;
    let blob = handler.encode(&account).unwrap();
    network.put(location, blob).await.unwrap();
    location
}

/// Network wrapper whose writes can be made to fail transiently.
struct FlakyNetwork {
    inner: InMemoryNetwork,
    fail_puts: AtomicBool,
}

impl FlakyNetwork {
    fn new() -> Self {
        Self {
            inner: InMemoryNetwork::new(),
            fail_puts: AtomicBool::new(false),
        }
    }

    fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl NetworkClient for FlakyNetwork {
    async fn put(&self, location: AccountLocation, blob: Vec<u8>) -> NetworkResult<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(NetworkError::Transient("simulated outage".to_string()));
        }
        self.inner.put(location, blob).await
    }

    async fn get(&self, location: &AccountLocation) -> NetworkResult<Vec<u8>> {
        self.inner.get(location).await
    }

    async fn exists(&self, location: &AccountLocation) -> NetworkResult<bool> {
        self.inner.exists(location).await
    }
}

// =============================================================================
// Account Lifecycle Tests
// =============================================================================

#[tokio::test]
async fn test_full_account_lifecycle() {
    let network = Arc::new(InMemoryNetwork::new());
    let (keyword, pin, password) = credentials();
    let config = Config::default();

    let launcher =
        Launcher::create_account(&keyword, &pin, &password, network.clone(), &config)
            .await
            .unwrap();
    launcher
        .add_app(
            AppName::from("editor"),
            PathBuf::from("/usr/bin/editor"),
            vec!["--no-splash".to_string()],
            vec![1, 2, 3],
            true,
        )
        .await
        .unwrap();
    launcher.save_session(false).await.unwrap();
    launcher.logout_and_stop().await.unwrap();

    let restored = Launcher::login(&keyword, &pin, &password, network, &config)
        .await
        .unwrap();
    let apps = restored.get_apps(true).await.unwrap();
    assert_eq!(apps.len(), 1);

    let editor = apps.first().unwrap();
    assert_eq!(editor.name.as_str(), "editor");
    assert_eq!(editor.path, PathBuf::from("/usr/bin/editor"));
    assert_eq!(editor.args, vec!["--no-splash".to_string()]);
    assert!(editor.auto_start);
}

#[tokio::test]
async fn test_second_create_leaves_first_account_intact() {
    let network = Arc::new(InMemoryNetwork::new());
    let (keyword, pin, password) = credentials();
    let config = Config::default();

    let first =
        Launcher::create_account(&keyword, &pin, &password, network.clone(), &config)
            .await
            .unwrap();
    first
        .add_app(
            AppName::from("survivor"),
            PathBuf::from("/bin/survivor"),
            vec![],
            vec![],
            false,
        )
        .await
        .unwrap();
    first.save_session(false).await.unwrap();

    let second =
        Launcher::create_account(&keyword, &pin, &password, network.clone(), &config).await;
    assert!(matches!(second, Err(LauncherError::AccountAlreadyExists)));

    let relogin = Launcher::login(&keyword, &pin, &password, network, &config)
        .await
        .unwrap();
    assert_eq!(relogin.get_apps(true).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_wrong_password_distinct_from_missing_account() {
    let network = Arc::new(InMemoryNetwork::new());
    let (keyword, pin, password) = credentials();
    let config = Config::default();

    // No account yet: NotFound, regardless of the password.
    let missing = Launcher::login(&keyword, &pin, &password, network.clone(), &config).await;
    assert!(matches!(missing, Err(LauncherError::AccountNotFound)));

    Launcher::create_account(&keyword, &pin, &password, network.clone(), &config)
        .await
        .unwrap();

    let wrong = Launcher::login(
        &keyword,
        &pin,
        &Password("not the password".to_string()),
        network,
        &config,
    )
    .await;
    assert!(matches!(wrong, Err(LauncherError::DecryptionFailed)));
}

// =============================================================================
// Registry Invariant Tests
// =============================================================================

#[tokio::test]
async fn test_sets_stay_disjoint_across_mutation_sequence() {
    let network = Arc::new(InMemoryNetwork::new());
    seed_account_with_non_local(&network, "shared").await;
    let (keyword, pin, password) = credentials();
    let launcher =
        Launcher::login(&keyword, &pin, &password, network, &Config::default())
            .await
            .unwrap();

    let assert_disjoint = |local: &std::collections::BTreeSet<AppDetails>,
                           non_local: &std::collections::BTreeSet<AppDetails>| {
        for app in local {
            assert!(
                !non_local.iter().any(|other| other.name == app.name),
                "app {} present in both sets",
                app.name
            );
        }
    };

    // add, link, rename, remove, in sequence; check after every step
    launcher
        .add_app(
            AppName::from("local-only"),
            PathBuf::from("/bin/a"),
            vec![],
            vec![],
            false,
        )
        .await
        .unwrap();
    assert_disjoint(
        &launcher.get_apps(true).await.unwrap(),
        &launcher.get_apps(false).await.unwrap(),
    );

    launcher
        .link_app(AppName::from("shared"), PathBuf::from("/bin/b"), vec![], true)
        .await
        .unwrap();
    assert_disjoint(
        &launcher.get_apps(true).await.unwrap(),
        &launcher.get_apps(false).await.unwrap(),
    );
    assert!(launcher.get_apps(false).await.unwrap().is_empty());

    launcher
        .update_app_name(&AppName::from("shared"), AppName::from("renamed"))
        .await
        .unwrap();
    assert_disjoint(
        &launcher.get_apps(true).await.unwrap(),
        &launcher.get_apps(false).await.unwrap(),
    );

    launcher
        .remove_app_locally(&AppName::from("renamed"))
        .await
        .unwrap();
    assert_disjoint(
        &launcher.get_apps(true).await.unwrap(),
        &launcher.get_apps(false).await.unwrap(),
    );
    assert_eq!(launcher.get_apps(true).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_linked_app_keeps_icon_and_drive_access() {
    let network = Arc::new(InMemoryNetwork::new());
    seed_account_with_non_local(&network, "ported").await;
    let (keyword, pin, password) = credentials();
    let launcher =
        Launcher::login(&keyword, &pin, &password, network, &Config::default())
            .await
            .unwrap();

    launcher
        .update_app_safe_drive_access(&AppName::from("ported"), AccessRights::ReadOnly)
        .await
        .unwrap();
    launcher
        .link_app(
            AppName::from("ported"),
            PathBuf::from("/this/machine/bin/app"),
            vec!["--here".to_string()],
            true,
        )
        .await
        .unwrap();

    let apps = launcher.get_apps(true).await.unwrap();
    let linked = apps.first().unwrap();
    assert_eq!(linked.icon, vec![0xAB]);
    assert_eq!(linked.safe_drive_access, AccessRights::ReadOnly);
    assert_eq!(linked.path, PathBuf::from("/this/machine/bin/app"));
    assert!(linked.auto_start);
}

#[tokio::test]
async fn test_failing_link_leaves_both_sets_unchanged() {
    let network = Arc::new(InMemoryNetwork::new());
    let (keyword, pin, password) = credentials();
    let launcher =
        Launcher::create_account(&keyword, &pin, &password, network, &Config::default())
            .await
            .unwrap();

    let local_before = launcher.get_apps(true).await.unwrap();
    let non_local_before = launcher.get_apps(false).await.unwrap();

    let result = launcher
        .link_app(AppName::from("never-added"), PathBuf::from("/bin/x"), vec![], false)
        .await;
    assert!(matches!(result, Err(LauncherError::NotFound { .. })));

    assert_eq!(launcher.get_apps(true).await.unwrap(), local_before);
    assert_eq!(launcher.get_apps(false).await.unwrap(), non_local_before);
    assert!(!launcher.is_dirty().await.unwrap());
}

// =============================================================================
// Save / Revert Tests
// =============================================================================

#[tokio::test]
async fn test_transient_save_failure_preserves_dirty_flag() {
    let flaky = Arc::new(FlakyNetwork::new());
    let (keyword, pin, password) = credentials();
    let launcher = Launcher::create_account(
        &keyword,
        &pin,
        &password,
        flaky.clone(),
        &Config::default(),
    )
    .await
    .unwrap();

    launcher
        .add_app(
            AppName::from("pending"),
            PathBuf::from("/bin/pending"),
            vec![],
            vec![],
            false,
        )
        .await
        .unwrap();
    assert!(launcher.is_dirty().await.unwrap());

    flaky.set_fail_puts(true);
    let failed = launcher.save_session(false).await;
    assert!(matches!(
        failed,
        Err(LauncherError::TransientNetworkFailure(_))
    ));
    assert!(failed.unwrap_err().is_transient());
    assert!(
        launcher.is_dirty().await.unwrap(),
        "failed save must leave the registry dirty for retry"
    );

    // The retry contract: same call succeeds once the outage clears.
    flaky.set_fail_puts(false);
    launcher.save_session(false).await.unwrap();
    assert!(!launcher.is_dirty().await.unwrap());
}

#[tokio::test]
async fn test_revert_without_any_save_restores_login_state() {
    let network = Arc::new(InMemoryNetwork::new());
    seed_account_with_non_local(&network, "seeded").await;
    let (keyword, pin, password) = credentials();
    let launcher = Launcher::login(&keyword, &pin, &password, network, &Config::default())
        .await
        .unwrap();

    launcher
        .add_app(AppName::from("scratch"), PathBuf::from("/bin/s"), vec![], vec![], false)
        .await
        .unwrap();
    launcher
        .link_app(AppName::from("seeded"), PathBuf::from("/bin/here"), vec![], true)
        .await
        .unwrap();
    assert!(launcher.is_dirty().await.unwrap());

    launcher.revert_to_last_saved_session().await.unwrap();

    // Back to exactly the post-login registry: no local apps, the
    // seeded app non-local again, nothing pending.
    assert!(launcher.get_apps(true).await.unwrap().is_empty());
    let non_local = launcher.get_apps(false).await.unwrap();
    assert_eq!(non_local.len(), 1);
    assert_eq!(non_local.first().unwrap().name.as_str(), "seeded");
    assert!(!launcher.is_dirty().await.unwrap());
}

#[tokio::test]
async fn test_revert_targets_latest_save() {
    let network = Arc::new(InMemoryNetwork::new());
    let (keyword, pin, password) = credentials();
    let launcher =
        Launcher::create_account(&keyword, &pin, &password, network, &Config::default())
            .await
            .unwrap();

    launcher
        .add_app(AppName::from("first"), PathBuf::from("/bin/1"), vec![], vec![], false)
        .await
        .unwrap();
    launcher.save_session(false).await.unwrap();
    launcher
        .add_app(AppName::from("second"), PathBuf::from("/bin/2"), vec![], vec![], false)
        .await
        .unwrap();
    launcher.save_session(false).await.unwrap();
    launcher
        .add_app(AppName::from("third"), PathBuf::from("/bin/3"), vec![], vec![], false)
        .await
        .unwrap();

    launcher.revert_to_last_saved_session().await.unwrap();

    let names: Vec<String> = launcher
        .get_apps(true)
        .await
        .unwrap()
        .into_iter()
        .map(|app| app.name.0)
        .collect();
    assert_eq!(names, vec!["first".to_string(), "second".to_string()]);
}

// =============================================================================
// Launch Handshake Tests
// =============================================================================

#[tokio::test]
async fn test_handshake_completes_against_registering_app() {
    let mut launch = Launch::new(
        AppName::from("notes"),
        // The spawned process exits immediately; the scripted task below
        // plays the app side of the handshake.
        PathBuf::from("/bin/true"),
        vec![],
        vec![protocol::DirectoryInfo {
            name: "notes".to_string(),
            path: "/apps/notes".to_string(),
            access: AccessRights::ReadWrite,
        }],
        std::time::Duration::from_secs(2),
        std::time::Duration::from_secs(2),
    );
    launch.bind().await.unwrap();
    let port = launch.port().unwrap();

    let session_key = SessionPublicKey::generate();
    let app_key = session_key.clone();
    let app = tokio::spawn(async move { register_app_session(port, app_key).await });

    let presented = launch.run().await.unwrap();
    assert_eq!(launch.state(), LaunchState::Confirmed);
    assert_eq!(presented, session_key);

    let directories = app.await.unwrap().unwrap();
    assert_eq!(directories.len(), 1);
    assert_eq!(directories[0].path, "/apps/notes");
}

#[tokio::test]
async fn test_launch_app_times_out_when_nothing_connects() {
    let network = Arc::new(InMemoryNetwork::new());
    let (keyword, pin, password) = credentials();
    let launcher =
        Launcher::create_account(&keyword, &pin, &password, network, &fast_config())
            .await
            .unwrap();

    launcher
        .add_app(
            AppName::from("mute"),
            PathBuf::from("/bin/true"),
            vec![],
            vec![],
            false,
        )
        .await
        .unwrap();

    let result = launcher.launch_app(&AppName::from("mute")).await;
    match result {
        Err(LauncherError::HandshakeTimeout { phase }) => {
            assert_eq!(phase.to_string(), "connect");
        }
        other => panic!("expected connect-phase timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn test_launch_app_with_missing_binary_fails_to_spawn() {
    let network = Arc::new(InMemoryNetwork::new());
    let (keyword, pin, password) = credentials();
    let launcher =
        Launcher::create_account(&keyword, &pin, &password, network, &fast_config())
            .await
            .unwrap();

    launcher
        .add_app(
            AppName::from("ghost"),
            PathBuf::from("/no/such/binary/anywhere"),
            vec![],
            vec![],
            false,
        )
        .await
        .unwrap();

    let result = launcher.launch_app(&AppName::from("ghost")).await;
    assert!(matches!(result, Err(LauncherError::SpawnFailed(_))));
}
