//! Transactional in-memory registry of registered apps.
//!
//! The registry keeps two disjoint sets keyed by app name: apps added on
//! this machine (local) and apps added for the same account on another
//! machine (non-local). Every mutation either fully commits and sets the
//! dirty flag, or returns an error with zero observable change; a
//! [`Snapshot`] captures the whole registry for rollback.
//!
//! `AppHandler` is a plain value with no interior locking. The Launcher
//! serializes all access through its single session mutex.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use protocol::AccessRights;
use tracing::debug;

use super::details::{AppArgs, AppDetails, AppName};
use crate::error::{LauncherError, Result};

/// Point-in-time deep copy of the registry, the unit of rollback.
///
/// Independently owned: mutating the live registry after capture never
/// affects a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    local: BTreeMap<AppName, AppDetails>,
    non_local: BTreeMap<AppName, AppDetails>,
    dirty: bool,
}

/// The transactional app registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppHandler {
    /// Apps registered on this machine, launchable.
    local: BTreeMap<AppName, AppDetails>,
    /// Apps registered elsewhere for the same account; visible but not
    /// launchable until linked.
    non_local: BTreeMap<AppName, AppDetails>,
    /// Set on every successful mutation, cleared on save.
    dirty: bool,
}

impl AppHandler {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from decoded account state. Starts clean.
    pub fn from_registry(
        local: BTreeMap<AppName, AppDetails>,
        non_local: BTreeMap<AppName, AppDetails>,
    ) -> Self {
        Self {
            local,
            non_local,
            dirty: false,
        }
    }

    /// Returns the requested set of apps by value, sorted by name.
    pub fn apps(&self, locally_available: bool) -> BTreeSet<AppDetails> {
        let source = if locally_available {
            &self.local
        } else {
            &self.non_local
        };
        source.values().cloned().collect()
    }

    /// Looks up a locally registered app by name.
    pub fn get_local(&self, name: &AppName) -> Option<&AppDetails> {
        self.local.get(name)
    }

    /// The local-set map, for account encoding.
    pub fn local(&self) -> &BTreeMap<AppName, AppDetails> {
        &self.local
    }

    /// The non-local-set map, for account encoding.
    pub fn non_local(&self) -> &BTreeMap<AppName, AppDetails> {
        &self.non_local
    }

    /// Whether there are unsaved mutations.
    pub fn dirty(&self) -> bool {
        self.dirty
    }

    /// Marks the registry as saved.
    pub fn set_clean(&mut self) {
        self.dirty = false;
    }

    /// Adds a brand-new app to the local set.
    ///
    /// Fails with `AlreadyExists` if the name is present in either set;
    /// an app previously added on another machine must be linked with
    /// [`AppHandler::link_local`] instead.
    pub fn add_local(
        &mut self,
        name: AppName,
        path: PathBuf,
        args: AppArgs,
        icon: Vec<u8>,
        auto_start: bool,
    ) -> Result<()> {
        self.ensure_absent(&name)?;

        debug!(app = %name, path = %path.display(), "adding local app");
        let details = AppDetails::new(name.clone(), path, args, icon, auto_start);
        self.local.insert(name, details);
        self.dirty = true;
        Ok(())
    }

    /// Links a non-local app into the local set.
    ///
    /// The icon and SafeDrive access travel with the account and are kept
    /// from the non-local record; path, args and auto-start are
    /// machine-specific and supplied fresh.
    pub fn link_local(
        &mut self,
        name: AppName,
        path: PathBuf,
        args: AppArgs,
        auto_start: bool,
    ) -> Result<()> {
        if self.local.contains_key(&name) {
            return Err(LauncherError::AlreadyExists {
                name: name.0.clone(),
            });
        }
        let existing = self
            .non_local
            .get(&name)
            .ok_or_else(|| LauncherError::NotFound {
                name: name.0.clone(),
            })?;

        let details = AppDetails {
            name: name.clone(),
            path,
            args,
            icon: existing.icon.clone(),
            auto_start,
            safe_drive_access: existing.safe_drive_access,
        };

        debug!(app = %name, "linking non-local app");
        self.non_local.remove(&name);
        self.local.insert(name, details);
        self.dirty = true;
        Ok(())
    }

    /// Renames an app in whichever set holds it.
    ///
    /// Fails with `NotFound` if no set holds `name`, and `AlreadyExists`
    /// if `new_name` is taken by a different app. Renaming an app to its
    /// current name is a no-op.
    pub fn update_name(&mut self, name: &AppName, new_name: AppName) -> Result<()> {
        if name == &new_name {
            self.containing_set_mut(name)?;
            return Ok(());
        }
        self.ensure_absent(&new_name)?;

        let set = self.containing_set_mut(name)?;
        // Checked above that the entry exists.
        let mut details = set.remove(name).expect("entry present");
        details.name = new_name.clone();
        debug!(app = %name, new_name = %new_name, "renaming app");
        set.insert(new_name, details);
        self.dirty = true;
        Ok(())
    }

    /// Replaces the executable path of a local app.
    pub fn update_path(&mut self, name: &AppName, new_path: PathBuf) -> Result<()> {
        let details = self.local_mut(name)?;
        details.path = new_path;
        self.dirty = true;
        Ok(())
    }

    /// Replaces the launch arguments of a local app.
    pub fn update_args(&mut self, name: &AppName, new_args: AppArgs) -> Result<()> {
        let details = self.local_mut(name)?;
        details.args = new_args;
        self.dirty = true;
        Ok(())
    }

    /// Replaces the SafeDrive access rights of an app in either set.
    pub fn update_safe_drive_access(
        &mut self,
        name: &AppName,
        new_rights: AccessRights,
    ) -> Result<()> {
        let set = self.containing_set_mut(name)?;
        let details = set.get_mut(name).expect("entry present");
        debug!(app = %name, rights = ?new_rights, "updating SafeDrive access");
        details.safe_drive_access = new_rights;
        self.dirty = true;
        Ok(())
    }

    /// Replaces the icon of an app in either set.
    pub fn update_icon(&mut self, name: &AppName, new_icon: Vec<u8>) -> Result<()> {
        let set = self.containing_set_mut(name)?;
        let details = set.get_mut(name).expect("entry present");
        details.icon = new_icon;
        self.dirty = true;
        Ok(())
    }

    /// Replaces the auto-start flag of a local app.
    pub fn update_auto_start(&mut self, name: &AppName, auto_start: bool) -> Result<()> {
        let details = self.local_mut(name)?;
        details.auto_start = auto_start;
        self.dirty = true;
        Ok(())
    }

    /// Removes an app from the local set.
    pub fn remove_local(&mut self, name: &AppName) -> Result<AppDetails> {
        let removed = self.local.remove(name).ok_or_else(|| LauncherError::NotFound {
            name: name.0.clone(),
        })?;
        debug!(app = %name, "removed local app");
        self.dirty = true;
        Ok(removed)
    }

    /// Removes an app from the non-local set.
    pub fn remove_non_local(&mut self, name: &AppName) -> Result<AppDetails> {
        let removed = self
            .non_local
            .remove(name)
            .ok_or_else(|| LauncherError::NotFound {
                name: name.0.clone(),
            })?;
        debug!(app = %name, "removed non-local app");
        self.dirty = true;
        Ok(removed)
    }

    /// Captures a deep copy of the whole registry.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            local: self.local.clone(),
            non_local: self.non_local.clone(),
            dirty: self.dirty,
        }
    }

    /// Restores the registry to a previously captured snapshot,
    /// discarding every mutation made since.
    pub fn restore(&mut self, snapshot: Snapshot) {
        self.local = snapshot.local;
        self.non_local = snapshot.non_local;
        self.dirty = snapshot.dirty;
    }

    fn ensure_absent(&self, name: &AppName) -> Result<()> {
        if self.local.contains_key(name) || self.non_local.contains_key(name) {
            return Err(LauncherError::AlreadyExists {
                name: name.0.clone(),
            });
        }
        Ok(())
    }

    fn local_mut(&mut self, name: &AppName) -> Result<&mut AppDetails> {
        self.local.get_mut(name).ok_or_else(|| LauncherError::NotFound {
            name: name.0.clone(),
        })
    }

    /// The set containing `name`, local set first.
    fn containing_set_mut(
        &mut self,
        name: &AppName,
    ) -> Result<&mut BTreeMap<AppName, AppDetails>> {
        if self.local.contains_key(name) {
            Ok(&mut self.local)
        } else if self.non_local.contains_key(name) {
            Ok(&mut self.non_local)
        } else {
            Err(LauncherError::NotFound {
                name: name.0.clone(),
            })
        }
    }
}
