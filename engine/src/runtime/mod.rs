//! Runtime module for loading and running plugins
//!
//! A loaded plugin is an entry source turned into a [`PluginModule`] by a
//! [`ModuleResolver`] and activated once against its [`PluginApi`]. The
//! default resolver is [`ScriptResolver`], which evaluates the entry with
//! Rhai.
//!
//! # Loaded-Plugin Set
//!
//! Membership means the plugin's entry ran to completion. A failed load
//! leaves no entry behind, and an id is never loaded twice at once.
//!
//! # Examples
//!
//! ```no_run
//! use edbp_engine::host::InMemoryHost;
//! use edbp_engine::runtime::PluginRuntime;
//! # fn example(record: sdk::PluginRecord) -> Result<(), sdk::PluginError> {
//! let (_host, shared) = InMemoryHost::shared();
//! let mut runtime = PluginRuntime::new(shared);
//!
//! runtime.load(&record)?;
//! assert!(runtime.is_loaded(&record.id));
//!
//! runtime.unload(&record.id);
//! # Ok(())
//! # }
//! ```

pub mod capability;
pub mod script;

pub use capability::PluginApi;
pub use script::ScriptResolver;

use sdk::errors::PluginError;
use sdk::host::SharedHost;
use sdk::manifest::{FileContent, PluginRecord};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{error, info, warn};

/// Executable form of a plugin entry
pub trait PluginModule {
    /// Run the entry against its capability object; called exactly once
    fn activate(&mut self, api: &PluginApi) -> Result<(), PluginError>;

    /// Run the plugin's cleanup hook, if it registered one
    fn deactivate(&mut self, api: &PluginApi) -> Result<(), PluginError>;
}

/// Turns entry source into a module
pub trait ModuleResolver {
    fn resolve(
        &self,
        record: &PluginRecord,
        entry_path: &str,
        source: &str,
    ) -> Result<Box<dyn PluginModule>, PluginError>;
}

/// A plugin whose entry has run
pub struct LoadedPlugin {
    pub record: PluginRecord,
    pub api: PluginApi,
    module: Box<dyn PluginModule>,
}

/// Locate the entry script in a record's files
///
/// The exact `main` path wins. Otherwise any file with the same file name is
/// used, splitting paths on both `/` and `\` (archives from GitHub nest
/// everything under a `<repo>-<branch>/` folder). Binary placeholders never
/// count as an entry.
///
/// Returns `(path, source)`.
pub fn resolve_entry(record: &PluginRecord) -> Result<(&str, &str), PluginError> {
    let not_found = || PluginError::EntryNotFound(record.main.clone());

    if let Some(content) = record.files.get(&record.main) {
        return content
            .as_text()
            .map(|source| (record.main.as_str(), source))
            .ok_or_else(not_found);
    }

    let wanted = file_name(&record.main);
    record
        .files
        .iter()
        .find(|(path, _)| file_name(path) == wanted)
        .and_then(|(path, content)| match content {
            FileContent::Text(source) => Some((path.as_str(), source.as_str())),
            FileContent::Binary(_) => None,
        })
        .ok_or_else(not_found)
}

fn file_name(path: &str) -> &str {
    path.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(path)
}

pub struct PluginRuntime {
    host: SharedHost,
    resolver: Box<dyn ModuleResolver>,
    loaded: HashMap<String, LoadedPlugin>,
}

impl PluginRuntime {
    /// Runtime that evaluates entries as Rhai scripts
    pub fn new(host: SharedHost) -> Self {
        Self::with_resolver(host, Box::new(ScriptResolver::new()))
    }

    pub fn with_resolver(host: SharedHost, resolver: Box<dyn ModuleResolver>) -> Self {
        info!("Initializing plugin runtime");
        Self {
            host,
            resolver,
            loaded: HashMap::new(),
        }
    }

    pub fn host(&self) -> SharedHost {
        Rc::clone(&self.host)
    }

    /// Load and activate a plugin
    ///
    /// # Errors
    ///
    /// - [`PluginError::AlreadyLoaded`] if the id is in the loaded set
    /// - [`PluginError::EntryNotFound`] if no text entry resolves
    /// - [`PluginError::Execution`] if the entry fails to compile or run
    ///
    /// On error nothing is recorded as loaded.
    pub fn load(&mut self, record: &PluginRecord) -> Result<(), PluginError> {
        if self.loaded.contains_key(&record.id) {
            return Err(PluginError::AlreadyLoaded(record.id.clone()));
        }

        let (entry_path, source) = resolve_entry(record).map_err(|e| {
            error!("Entry for '{}' not found: {}", record.id, record.main);
            e
        })?;

        let mut module = self.resolver.resolve(record, entry_path, source)?;
        let api = PluginApi::new(record.info(), Rc::clone(&self.host));

        module.activate(&api).map_err(|e| {
            error!("Plugin '{}' failed to start: {}", record.id, e);
            e
        })?;

        self.loaded.insert(
            record.id.clone(),
            LoadedPlugin {
                record: record.clone(),
                api,
                module,
            },
        );

        info!("Plugin '{}' v{} loaded", record.id, record.version);
        Ok(())
    }

    /// Run the plugin's cleanup hook and forget it
    ///
    /// Returns `false` if the plugin was not loaded. A failing cleanup hook
    /// is logged; the plugin is unloaded regardless.
    pub fn unload(&mut self, id: &str) -> bool {
        let Some(mut plugin) = self.loaded.remove(id) else {
            return false;
        };

        if let Err(e) = plugin.module.deactivate(&plugin.api) {
            warn!("Cleanup hook for '{}' failed: {}", id, e);
        }

        info!("Plugin '{}' unloaded", id);
        true
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        self.loaded.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&LoadedPlugin> {
        self.loaded.get(id)
    }

    /// Ids of loaded plugins, sorted
    pub fn loaded_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.loaded.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}
