//! Integration tests for plugin lifecycle
//!
//! Loading, load-all isolation, enable/disable with rollback, and uninstall,
//! all observed through the in-memory host.

mod common;

use common::{block_script, manifest, plugin_zip, zip_of, FlakySlot};
use edbp_engine::db::{DurableSlot, MemorySlot};
use edbp_engine::host::InMemoryHost;
use edbp_engine::manager::{InstallSource, PluginManager};
use edbp_engine::runtime::PluginRuntime;
use edbp_engine::store::{PluginStore, PLUGINS_KEY};
use edbp_registry::{ApprovedIds, TrustTier};
use sdk::errors::PluginError;
use sdk::manifest::PluginRecord;
use std::cell::RefCell;
use std::rc::Rc;

struct Fixture {
    host: Rc<RefCell<InMemoryHost>>,
    manager: PluginManager<MemorySlot>,
}

impl Fixture {
    fn new() -> Self {
        let (host, shared) = InMemoryHost::shared();
        let manager =
            PluginManager::new(PluginStore::new(MemorySlot::new()), PluginRuntime::new(shared));
        Self { host, manager }
    }

    async fn install(&mut self, bytes: &[u8]) {
        let result = self
            .manager
            .install_archive(bytes, InstallSource::LocalFile, &ApprovedIds::default(), &mut |_| {})
            .await;
        assert!(result.is_success(), "install failed: {:?}", result);
    }
}

#[tokio::test]
async fn test_plugin_is_loaded_at_most_once() {
    let mut fx = Fixture::new();
    fx.install(&plugin_zip("once", &block_script("once_block"))).await;

    fx.manager.load("once").unwrap();
    assert!(matches!(
        fx.manager.load("once"),
        Err(PluginError::AlreadyLoaded(_))
    ));
    assert_eq!(fx.manager.runtime().loaded_ids(), vec!["once"]);
    assert!(fx.host.borrow().block("once_block").is_some());
}

#[tokio::test]
async fn test_load_unknown_plugin_is_not_installed() {
    let mut fx = Fixture::new();
    assert!(matches!(
        fx.manager.load("ghost"),
        Err(PluginError::NotInstalled(_))
    ));
}

#[tokio::test]
async fn test_load_all_isolates_failures() {
    let mut fx = Fixture::new();
    fx.install(&plugin_zip("first", &block_script("first_block"))).await;
    fx.install(&plugin_zip("broken", "throw \"boom\";")).await;
    fx.install(&plugin_zip("third", &block_script("third_block"))).await;

    let outcomes = fx.manager.load_all();
    let summary: Vec<(&str, bool)> = outcomes
        .iter()
        .map(|o| (o.plugin_id.as_str(), o.result.is_ok()))
        .collect();

    assert_eq!(
        summary,
        vec![("first", true), ("broken", false), ("third", true)]
    );
    assert!(matches!(
        outcomes[1].result,
        Err(PluginError::Execution(_))
    ));
    assert!(!fx.manager.runtime().is_loaded("broken"));

    let host = fx.host.borrow();
    assert!(host.block("first_block").is_some());
    assert!(host.block("third_block").is_some());
}

#[tokio::test]
async fn test_load_all_skips_disabled() {
    let mut fx = Fixture::new();
    fx.install(&plugin_zip("on", "")).await;
    fx.install(&plugin_zip("off", "")).await;
    fx.manager.set_enabled("off", false).await.unwrap();

    let outcomes = fx.manager.load_all();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].plugin_id, "on");
}

#[tokio::test]
async fn test_enable_failure_rolls_back() {
    let mut fx = Fixture::new();
    fx.install(&plugin_zip("flaky", "throw \"nope\";")).await;
    fx.manager.set_enabled("flaky", false).await.unwrap();

    let result = fx.manager.toggle_enabled("flaky", true).await;
    assert!(matches!(result, Err(PluginError::Execution(_))));

    assert!(!fx.manager.store().get("flaky").unwrap().enabled);
    assert!(!fx.manager.runtime().is_loaded("flaky"));

    let raw = fx.manager.store().slot().read(PLUGINS_KEY).await.unwrap().unwrap();
    let persisted: Vec<PluginRecord> = serde_json::from_str(&raw).unwrap();
    assert!(!persisted.iter().find(|r| r.id == "flaky").unwrap().enabled);
}

#[tokio::test]
async fn test_disable_unloads_and_runs_cleanup() {
    let mut fx = Fixture::new();
    let script = r#"
        api.add_style(".x {}");
        api.on_cleanup(|| host.remove_style("tidy"));
    "#;
    fx.install(&plugin_zip("tidy", script)).await;

    fx.manager.toggle_enabled("tidy", true).await.unwrap();
    assert!(fx.manager.runtime().is_loaded("tidy"));
    assert!(fx.host.borrow().has_style("tidy"));

    fx.manager.toggle_enabled("tidy", false).await.unwrap();
    assert!(!fx.manager.runtime().is_loaded("tidy"));
    assert!(!fx.manager.store().get("tidy").unwrap().enabled);
    assert!(!fx.host.borrow().has_style("tidy"));
}

#[tokio::test]
async fn test_toggle_unknown_plugin() {
    let mut fx = Fixture::new();
    assert!(matches!(
        fx.manager.toggle_enabled("ghost", true).await,
        Err(PluginError::NotInstalled(_))
    ));
}

#[tokio::test]
async fn test_entry_found_by_file_name_in_nested_archive() {
    let mut fx = Fixture::new();
    let script = block_script("nested_block");
    let bytes = zip_of(&[
        ("nested-main/plugin.json", manifest("nested").as_bytes()),
        ("nested-main/main.js", script.as_bytes()),
    ]);
    fx.install(&bytes).await;

    fx.manager.load("nested").unwrap();
    assert!(fx.host.borrow().block("nested_block").is_some());
}

#[tokio::test]
async fn test_missing_entry_fails_to_load() {
    let mut fx = Fixture::new();
    let bytes = zip_of(&[("plugin.json", manifest("empty").as_bytes())]);
    fx.install(&bytes).await;

    assert!(matches!(
        fx.manager.load("empty"),
        Err(PluginError::EntryNotFound(main)) if main == "main.js"
    ));
}

#[tokio::test]
async fn test_uninstall_removes_record_and_style() {
    let mut fx = Fixture::new();
    fx.install(&plugin_zip("gone", &block_script("gone_block"))).await;
    fx.manager.load("gone").unwrap();
    assert!(fx.host.borrow().has_style("gone"));

    fx.manager.uninstall("gone").await.unwrap();

    assert!(fx.manager.store().get("gone").is_none());
    assert!(!fx.manager.runtime().is_loaded("gone"));
    assert!(!fx.host.borrow().has_style("gone"));

    assert!(matches!(
        fx.manager.uninstall("gone").await,
        Err(PluginError::NotInstalled(_))
    ));
}

#[tokio::test]
async fn test_reinstall_keeps_loaded_copy_running() {
    let mut fx = Fixture::new();
    fx.install(&plugin_zip("live", &block_script("live_v1"))).await;
    fx.manager.load("live").unwrap();

    fx.install(&plugin_zip("live", &block_script("live_v2"))).await;

    assert!(fx.manager.runtime().is_loaded("live"));
    assert!(matches!(
        fx.manager.load("live"),
        Err(PluginError::AlreadyLoaded(_))
    ));

    fx.manager.unload("live");
    fx.manager.load("live").unwrap();
    assert!(fx.host.borrow().block("live_v2").is_some());
}

async fn flaky_manager(ids: &[&str]) -> (Rc<RefCell<InMemoryHost>>, PluginManager<FlakySlot>) {
    let (host, shared) = InMemoryHost::shared();
    let mut manager =
        PluginManager::new(PluginStore::new(FlakySlot::default()), PluginRuntime::new(shared));

    for id in ids {
        let result = manager
            .install_archive(
                &plugin_zip(id, &block_script(&format!("{}_block", id))),
                InstallSource::LocalFile,
                &ApprovedIds::default(),
                &mut |_| {},
            )
            .await;
        assert!(result.is_success());
    }
    (host, manager)
}

async fn persisted_ids(manager: &PluginManager<FlakySlot>) -> Vec<String> {
    let raw = manager.store().slot().read(PLUGINS_KEY).await.unwrap().unwrap();
    let records: Vec<PluginRecord> = serde_json::from_str(&raw).unwrap();
    records.into_iter().map(|r| r.id).collect()
}

#[tokio::test]
async fn test_uninstall_save_failure_keeps_plugin() {
    let (host, mut manager) = flaky_manager(&["a", "b"]).await;
    manager.load("a").unwrap();

    manager.store().slot().fail_writes(true);
    assert!(matches!(
        manager.uninstall("a").await,
        Err(PluginError::Storage(_))
    ));

    let ids: Vec<&str> = manager.installed().iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(persisted_ids(&manager).await, vec!["a", "b"]);
    assert!(manager.runtime().is_loaded("a"));
    assert!(host.borrow().has_style("a"));

    manager.store().slot().fail_writes(false);
    manager.uninstall("a").await.unwrap();
    assert_eq!(persisted_ids(&manager).await, vec!["b"]);
}

#[tokio::test]
async fn test_reclassify_save_failure_restores_flags() {
    let (_host, mut manager) = flaky_manager(&["late"]).await;
    let mut approved = ApprovedIds::default();
    approved.replace(["late"]);

    manager.store().slot().fail_writes(true);
    assert!(matches!(
        manager.reclassify("late", &approved).await,
        Err(PluginError::Storage(_))
    ));
    assert!(!manager.store().get("late").unwrap().approved);

    manager.store().slot().fail_writes(false);
    assert_eq!(
        manager.reclassify("late", &approved).await.unwrap(),
        TrustTier::Approved
    );
}
