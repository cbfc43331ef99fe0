/// Integration tests for durable storage
///
/// Tests the SQLite-backed slot end to end:
/// - Installed registry survives a restart
/// - Corrupt registry data degrades to an empty list
/// - Pending-install handoff is consumed once and expires
mod common;

use common::plugin_zip;
use edbp_engine::db::{Database, DurableSlot};
use edbp_engine::host::InMemoryHost;
use edbp_engine::manager::{InstallSource, PluginManager};
use edbp_engine::pending::{take_pending, write_pending, PendingInstall, PENDING_INSTALL_KEY};
use edbp_engine::runtime::PluginRuntime;
use edbp_engine::store::{PluginStore, PLUGINS_KEY};
use edbp_registry::ApprovedIds;
use std::sync::Arc;
use tempfile::TempDir;

fn manager(db: &Arc<Database>) -> PluginManager<Arc<Database>> {
    let (_host, shared) = InMemoryHost::shared();
    PluginManager::new(PluginStore::new(Arc::clone(db)), PluginRuntime::new(shared))
}

#[tokio::test]
async fn test_registry_survives_restart() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("plugins.db");

    {
        let db = Arc::new(Database::new(&db_path).await.unwrap());
        let mut manager = manager(&db);
        manager.init().await;

        for id in ["first", "second"] {
            let result = manager
                .install_archive(
                    &plugin_zip(id, ""),
                    InstallSource::LocalFile,
                    &ApprovedIds::default(),
                    &mut |_| {},
                )
                .await;
            assert!(result.is_success());
        }
        manager.set_enabled("second", false).await.unwrap();

        drop(manager);
        db.flush_wal().await.unwrap();
    }

    let db = Arc::new(Database::new(&db_path).await.unwrap());
    let mut manager = manager(&db);
    assert_eq!(manager.init().await, 2);

    let ids: Vec<&str> = manager.installed().iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["first", "second"]);
    assert!(manager.store().get("first").unwrap().enabled);
    assert!(!manager.store().get("second").unwrap().enabled);
    assert!(manager.store().get("first").unwrap().files.contains_key("main.js"));
}

#[tokio::test]
async fn test_corrupt_registry_loads_empty() {
    let temp_dir = TempDir::new().unwrap();
    let db = Arc::new(Database::new(&temp_dir.path().join("plugins.db")).await.unwrap());
    db.write(PLUGINS_KEY, "{ not an array").await.unwrap();

    let mut manager = manager(&db);
    assert_eq!(manager.init().await, 0);
    assert!(manager.installed().is_empty());
}

#[tokio::test]
async fn test_pending_install_consumed_once() {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::new(&temp_dir.path().join("plugins.db")).await.unwrap();

    let pending = PendingInstall::new("https://x.test/a.zip", "demo", 1_000);
    write_pending(&db, &pending).await.unwrap();

    assert_eq!(take_pending(&db, 2_000).await, Some(pending));
    assert_eq!(take_pending(&db, 2_000).await, None);
    assert_eq!(db.read(PENDING_INSTALL_KEY).await.unwrap(), None);

    db.close().await.unwrap();
}

#[tokio::test]
async fn test_expired_pending_install_is_discarded() {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::new(&temp_dir.path().join("plugins.db")).await.unwrap();

    let pending = PendingInstall::new("https://x.test/a.zip", "demo", 1_000);
    write_pending(&db, &pending).await.unwrap();

    assert_eq!(take_pending(&db, 1_000 + 5 * 60 * 1000).await, None);
    assert_eq!(db.read(PENDING_INSTALL_KEY).await.unwrap(), None);
}
