//! Plugin manager
//!
//! Ties the store, the runtime, and the host together and implements the
//! protocols that span them: the install pipeline, enable/disable with
//! rollback, uninstall, and explicit trust refresh.

use edbp_registry::{ApprovedIds, TrustTier};
use sdk::errors::PluginError;
use sdk::host::SharedHost;
use sdk::manifest::{PluginInfo, PluginRecord};
use tracing::{error, info, warn};

use crate::archive::{InstallPhase, InstallProgress, PluginArchive, ProgressFn};
use crate::db::DurableSlot;
use crate::manifest_parser::parse_manifest;
use crate::runtime::PluginRuntime;
use crate::store::PluginStore;
use crate::validator::validate;

/// Where an archive came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallSource {
    /// A zip picked by the user; never official
    LocalFile,
    /// A repository found by discovery
    Shop { owner: String },
}

impl InstallSource {
    pub fn owner(&self) -> Option<&str> {
        match self {
            Self::LocalFile => None,
            Self::Shop { owner } => Some(owner),
        }
    }
}

/// Outcome of [`PluginManager::install_archive`]
#[derive(Debug)]
pub enum InstallResult {
    Installed {
        plugin: PluginInfo,
        tier: TrustTier,
        /// An existing record with the same id was overwritten
        replaced: bool,
    },
    Failed {
        error: PluginError,
    },
}

impl InstallResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Installed { .. })
    }
}

/// Per-plugin result of [`PluginManager::load_all`]
#[derive(Debug)]
pub struct LoadOutcome {
    pub plugin_id: String,
    pub result: Result<(), PluginError>,
}

pub struct PluginManager<S: DurableSlot> {
    store: PluginStore<S>,
    runtime: PluginRuntime,
}

impl<S: DurableSlot> PluginManager<S> {
    pub fn new(store: PluginStore<S>, runtime: PluginRuntime) -> Self {
        Self { store, runtime }
    }

    /// Read installed plugins from the durable slot
    pub async fn init(&mut self) -> usize {
        self.store.load_installed().await.len()
    }

    pub fn store(&self) -> &PluginStore<S> {
        &self.store
    }

    pub fn runtime(&self) -> &PluginRuntime {
        &self.runtime
    }

    pub fn host(&self) -> SharedHost {
        self.runtime.host()
    }

    pub fn installed(&self) -> &[PluginRecord] {
        self.store.records()
    }

    /// Install a plugin zip
    ///
    /// Failures are returned as [`InstallResult::Failed`] and leave the
    /// registry untouched. Trust is classified afresh from `source` and
    /// `approved`. A record with the same id is replaced in place; a loaded
    /// copy keeps running until it is unloaded.
    pub async fn install_archive(
        &mut self,
        bytes: &[u8],
        source: InstallSource,
        approved: &ApprovedIds,
        progress: ProgressFn<'_>,
    ) -> InstallResult {
        match self.try_install(bytes, &source, approved, progress).await {
            Ok(result) => result,
            Err(error) => {
                error!("Plugin installation failed: {}", error);
                InstallResult::Failed { error }
            }
        }
    }

    async fn try_install(
        &mut self,
        bytes: &[u8],
        source: &InstallSource,
        approved: &ApprovedIds,
        progress: ProgressFn<'_>,
    ) -> Result<InstallResult, PluginError> {
        let mut archive = PluginArchive::open(bytes, &mut *progress)?;
        let manifest_text = archive.manifest_text()?;

        progress(InstallProgress::at(InstallPhase::Validate));
        let manifest = validate(parse_manifest(&manifest_text)?)?;

        let files = archive.extract_files(&mut *progress);
        let tier = approved.classify(source.owner(), &[manifest.id.as_str()]);
        let record =
            PluginRecord::from_manifest(manifest, tier.is_official(), tier.is_approved(), files);
        let plugin = record.info();

        progress(InstallProgress::at(InstallPhase::Persist));
        let previous = self.store.get(&record.id).cloned();
        let replaced = self.store.upsert(record);

        if let Err(e) = self.store.save().await {
            // keep memory and slot in agreement
            match previous {
                Some(previous) => {
                    self.store.upsert(previous);
                }
                None => {
                    self.store.remove(&plugin.id);
                }
            }
            return Err(e);
        }

        progress(InstallProgress::at(InstallPhase::Complete));
        info!(
            "Installed plugin '{}' v{} ({})",
            plugin.id,
            plugin.version,
            tier.label()
        );

        Ok(InstallResult::Installed {
            plugin,
            tier,
            replaced,
        })
    }

    /// Load an installed plugin
    pub fn load(&mut self, id: &str) -> Result<(), PluginError> {
        let record = self
            .store
            .get(id)
            .ok_or_else(|| PluginError::NotInstalled(id.to_string()))?;

        self.runtime.load(record)
    }

    pub fn unload(&mut self, id: &str) -> bool {
        self.runtime.unload(id)
    }

    /// Load every enabled plugin in registry order
    ///
    /// One plugin failing does not stop the others.
    pub fn load_all(&mut self) -> Vec<LoadOutcome> {
        let ids: Vec<String> = self
            .store
            .records()
            .iter()
            .filter(|r| r.enabled)
            .map(|r| r.id.clone())
            .collect();

        let outcomes: Vec<LoadOutcome> = ids
            .into_iter()
            .map(|plugin_id| {
                let result = self.load(&plugin_id);
                LoadOutcome { plugin_id, result }
            })
            .collect();

        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        info!(
            "Loaded {} of {} enabled plugin(s)",
            outcomes.len() - failed,
            outcomes.len()
        );
        outcomes
    }

    /// Remove and persist, then unload and drop the plugin's stylesheet
    ///
    /// A failed save puts the record back and leaves the plugin running.
    pub async fn uninstall(&mut self, id: &str) -> Result<(), PluginError> {
        let Some((index, removed)) = self.store.remove_indexed(id) else {
            return Err(PluginError::NotInstalled(id.to_string()));
        };
        if let Err(e) = self.store.save().await {
            self.store.insert_at(index, removed);
            return Err(e);
        }

        self.runtime.unload(id);
        self.runtime.host().borrow_mut().remove_style(id);

        info!("Uninstalled plugin '{}'", id);
        Ok(())
    }

    /// Flip the enabled flag and persist it; loading is left to the caller
    pub async fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<(), PluginError> {
        let previous = self
            .store
            .get(id)
            .map(|r| r.enabled)
            .ok_or_else(|| PluginError::NotInstalled(id.to_string()))?;

        self.store.set_enabled(id, enabled)?;
        if let Err(e) = self.store.save().await {
            self.store.set_enabled(id, previous)?;
            return Err(e);
        }
        Ok(())
    }

    /// Enable and load, or disable and unload
    ///
    /// The flag is persisted first. If loading fails the flag is rolled back
    /// to disabled, persisted again, and the load error is returned.
    pub async fn toggle_enabled(&mut self, id: &str, enabled: bool) -> Result<(), PluginError> {
        self.set_enabled(id, enabled).await?;

        if !enabled {
            self.runtime.unload(id);
            return Ok(());
        }

        if self.runtime.is_loaded(id) {
            return Ok(());
        }

        if let Err(load_error) = self.load(id) {
            warn!("Enabling '{}' failed, rolling back: {}", id, load_error);
            self.set_enabled(id, false).await?;
            return Err(load_error);
        }

        Ok(())
    }

    /// Recompute approval for an installed plugin from the current set
    ///
    /// Installed records are otherwise never reclassified.
    pub async fn reclassify(
        &mut self,
        id: &str,
        approved: &ApprovedIds,
    ) -> Result<TrustTier, PluginError> {
        let (official, was_approved) = self
            .store
            .get(id)
            .map(|r| (r.official, r.approved))
            .ok_or_else(|| PluginError::NotInstalled(id.to_string()))?;

        let tier = if official {
            TrustTier::Official
        } else {
            approved.classify(None, &[id])
        };

        self.store
            .set_trust(id, tier.is_official(), tier.is_approved())?;
        if let Err(e) = self.store.save().await {
            self.store.set_trust(id, official, was_approved)?;
            return Err(e);
        }

        info!("Plugin '{}' reclassified as {}", id, tier.label());
        Ok(tier)
    }
}
