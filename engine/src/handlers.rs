//! Command handlers for CLI operations
//!
//! This module implements the handlers for all CLI commands:
//! - list: Show installed plugins and their trust tier
//! - install / install-url: Run the install pipeline on a zip
//! - uninstall, enable, disable: Registry mutations
//! - load-all: Start every enabled plugin against an in-memory host
//! - shop: Discover plugins published to the shop
//! - pending: Consume a pending-install handoff

use anyhow::{anyhow, bail, Context, Result};
use edbp_registry::installer::download_archive;
use edbp_registry::registry::{filter_candidates, repository_owner};
use edbp_registry::{ApprovedIds, RegistryClient, TrustTier};
use sdk::errors::PluginErrorExt;
use sdk::manifest::PluginRecord;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

use crate::archive::InstallProgress;
use crate::config::Config;
use crate::db::Database;
use crate::host::InMemoryHost;
use crate::manager::{InstallResult, InstallSource, PluginManager};
use crate::pending::{now_ms, take_pending, write_pending, PendingInstall};
use crate::runtime::PluginRuntime;
use crate::store::PluginStore;

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

type Manager = PluginManager<Arc<Database>>;

struct Session {
    db: Arc<Database>,
    manager: Manager,
}

impl Session {
    async fn open(config: &Config) -> Result<Self> {
        let db = Arc::new(
            Database::new(&config.database_path())
                .await
                .context("Failed to open database")?,
        );

        let store = PluginStore::with_key(Arc::clone(&db), config.storage.plugins_key.as_str());
        let (_host, shared) = InMemoryHost::shared();
        let mut manager = PluginManager::new(store, PluginRuntime::new(shared));
        manager.init().await;

        Ok(Self { db, manager })
    }

    async fn finish(self) -> Result<()> {
        drop(self.manager);
        self.db.flush_wal().await
    }
}

fn registry_client(config: &Config) -> Result<RegistryClient> {
    RegistryClient::new(config.discovery.registry_settings())
        .map_err(|e| anyhow!("{}", e))
}

/// Approved-ID Set for this run; best effort
async fn approved_ids(config: &Config) -> Result<ApprovedIds> {
    let client = registry_client(config)?;
    let mut approved = ApprovedIds::new(config.discovery.official_owner.as_str());
    client.fetch_approved_list(&mut approved).await;
    Ok(approved)
}

fn record_summary(record: &PluginRecord) -> serde_json::Value {
    json!({
        "id": record.id,
        "name": record.name,
        "version": record.version,
        "author": record.author,
        "description": record.description,
        "enabled": record.enabled,
        "trust": TrustTier::from_flags(record.official, record.approved).label(),
        "files": record.files.len(),
    })
}

fn print_progress(format: OutputFormat) -> impl FnMut(InstallProgress) {
    move |progress| {
        if format == OutputFormat::Text {
            eprintln!("[{:>3}%] {}", progress.percent, progress.phase.label());
        }
    }
}

fn report_install(result: InstallResult, format: OutputFormat) -> Result<()> {
    match result {
        InstallResult::Installed {
            plugin,
            tier,
            replaced,
        } => {
            match format {
                OutputFormat::Text => {
                    let verb = if replaced { "Reinstalled" } else { "Installed" };
                    println!(
                        "{} {} v{} by {} ({})",
                        verb,
                        plugin.name,
                        plugin.version,
                        plugin.author,
                        tier.label()
                    );
                }
                OutputFormat::Json => {
                    let output = json!({
                        "success": true,
                        "plugin": plugin,
                        "trust": tier.label(),
                        "replaced": replaced,
                    });
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
            }
            Ok(())
        }
        InstallResult::Failed { error } => {
            if format == OutputFormat::Json {
                let output = json!({
                    "success": false,
                    "error": error.to_string(),
                    "hint": error.user_hint(),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                eprintln!("Hint: {}", error.user_hint());
            }
            Err(anyhow!("Installation failed: {}", error))
        }
    }
}

/// List installed plugins
pub async fn handle_list(config: &Config, format: OutputFormat) -> Result<()> {
    let session = Session::open(config).await?;
    let records = session.manager.installed();

    match format {
        OutputFormat::Text => {
            if records.is_empty() {
                println!("No plugins installed");
            } else {
                println!("Installed Plugins:");
                println!();
                for record in records {
                    let tier = TrustTier::from_flags(record.official, record.approved);
                    println!(
                        "  {} v{} [{}] {}",
                        record.id,
                        record.version,
                        tier.label(),
                        if record.enabled { "enabled" } else { "disabled" }
                    );
                    println!("    {} by {}", record.name, record.author);
                    if let Some(description) = &record.description {
                        println!("    {}", description);
                    }
                }
            }
        }
        OutputFormat::Json => {
            let plugins: Vec<_> = records.iter().map(record_summary).collect();
            let output = json!({ "plugins": plugins, "count": plugins.len() });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    session.finish().await
}

/// Install a plugin from a local zip file
pub async fn handle_install(path: &Path, config: &Config, format: OutputFormat) -> Result<()> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let approved = approved_ids(config).await?;
    let mut session = Session::open(config).await?;

    let result = session
        .manager
        .install_archive(
            &bytes,
            InstallSource::LocalFile,
            &approved,
            &mut print_progress(format),
        )
        .await;

    let reported = report_install(result, format);
    session.finish().await?;
    reported
}

/// Download an archive and install it, or leave it for the next session
pub async fn handle_install_url(
    url: &str,
    expected_id: Option<&str>,
    defer: bool,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    if defer {
        let plugin_id = expected_id.context("--defer needs --id")?;
        let db = Database::new(&config.database_path())
            .await
            .context("Failed to open database")?;

        let pending = PendingInstall::new(url, plugin_id, now_ms());
        write_pending(&db, &pending)
            .await
            .map_err(|e| anyhow!("{}", e))?;

        match format {
            OutputFormat::Text => println!("Pending install recorded for '{}'", plugin_id),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&pending)?),
        }
        return db.close().await;
    }

    install_from_url(url, expected_id, config, format).await
}

async fn install_from_url(
    url: &str,
    expected_id: Option<&str>,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let client = registry_client(config)?;
    let mut approved = ApprovedIds::new(config.discovery.official_owner.as_str());
    client.fetch_approved_list(&mut approved).await;

    let bytes = download_archive(&client, url)
        .await
        .map_err(|e| anyhow!("Download failed: {} ({})", e, e.user_hint()))?;

    let source = match repository_owner(url) {
        Some(owner) => InstallSource::Shop { owner },
        None => InstallSource::LocalFile,
    };

    let mut session = Session::open(config).await?;
    let result = session
        .manager
        .install_archive(&bytes, source, &approved, &mut print_progress(format))
        .await;

    if let (InstallResult::Installed { plugin, .. }, Some(expected)) = (&result, expected_id) {
        if plugin.id != expected {
            tracing::warn!(
                "Archive declared plugin '{}' where '{}' was expected",
                plugin.id,
                expected
            );
        }
    }

    let reported = report_install(result, format);
    session.finish().await?;
    reported
}

/// Uninstall a plugin
pub async fn handle_uninstall(id: &str, config: &Config, format: OutputFormat) -> Result<()> {
    let mut session = Session::open(config).await?;
    session
        .manager
        .uninstall(id)
        .await
        .map_err(|e| anyhow!("{}", e))?;

    match format {
        OutputFormat::Text => println!("Uninstalled '{}'", id),
        OutputFormat::Json => println!("{}", json!({ "success": true, "id": id })),
    }

    session.finish().await
}

/// Enable (and load) or disable a plugin
pub async fn handle_set_enabled(
    id: &str,
    enabled: bool,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let mut session = Session::open(config).await?;
    let result = session.manager.toggle_enabled(id, enabled).await;

    let reported = match &result {
        Ok(()) => {
            let state = if enabled { "enabled" } else { "disabled" };
            match format {
                OutputFormat::Text => println!("Plugin '{}' {}", id, state),
                OutputFormat::Json => {
                    println!("{}", json!({ "success": true, "id": id, "enabled": enabled }))
                }
            }
            Ok(())
        }
        Err(e) => {
            if format == OutputFormat::Json {
                println!(
                    "{}",
                    json!({ "success": false, "id": id, "error": e.to_string(), "hint": e.user_hint() })
                );
            }
            Err(anyhow!("Failed to update '{}': {}", id, e))
        }
    };

    session.finish().await?;
    reported
}

/// Load every enabled plugin and report per-plugin results
pub async fn handle_load_all(config: &Config, format: OutputFormat) -> Result<()> {
    let mut session = Session::open(config).await?;
    let outcomes = session.manager.load_all();

    match format {
        OutputFormat::Text => {
            if outcomes.is_empty() {
                println!("No enabled plugins");
            }
            for outcome in &outcomes {
                match &outcome.result {
                    Ok(()) => println!("  ok    {}", outcome.plugin_id),
                    Err(e) => println!("  FAIL  {}: {}", outcome.plugin_id, e),
                }
            }
        }
        OutputFormat::Json => {
            let results: Vec<_> = outcomes
                .iter()
                .map(|o| {
                    json!({
                        "id": o.plugin_id,
                        "success": o.result.is_ok(),
                        "error": o.result.as_ref().err().map(|e| e.to_string()),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json!({ "results": results }))?);
        }
    }

    session.finish().await
}

/// Discover published plugins
pub async fn handle_shop(query: Option<&str>, config: &Config, format: OutputFormat) -> Result<()> {
    let client = registry_client(config)?;
    let mut approved = ApprovedIds::new(config.discovery.official_owner.as_str());

    let candidates = client
        .fetch_candidates(&mut approved)
        .await
        .map_err(|e| anyhow!("{} ({})", e, e.user_hint()))?;
    let candidates = filter_candidates(&candidates, query.unwrap_or_default());

    match format {
        OutputFormat::Text => {
            if candidates.is_empty() {
                println!("No plugins found");
            }
            for candidate in &candidates {
                println!(
                    "  {} by {} [{}]{}",
                    candidate.name,
                    candidate.author,
                    candidate.trust_tier().label(),
                    if candidate.can_install() { "" } else { " (not installable)" }
                );
                println!("    {}", candidate.description);
                if candidate.can_install() {
                    println!("    edbp install-url '{}'", candidate.download_url);
                }
            }
        }
        OutputFormat::Json => {
            let output = json!({ "plugins": candidates, "count": candidates.len() });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Install the pending plugin left by another session, if it is still fresh
pub async fn handle_pending(config: &Config, format: OutputFormat) -> Result<()> {
    let db = Database::new(&config.database_path())
        .await
        .context("Failed to open database")?;
    let pending = take_pending(&db, now_ms()).await;
    db.close().await?;

    match pending {
        Some(pending) => {
            if format == OutputFormat::Text {
                println!("Installing pending plugin '{}'", pending.plugin_id);
            }
            install_from_url(&pending.url, Some(&pending.plugin_id), config, format).await
        }
        None => {
            match format {
                OutputFormat::Text => println!("No pending install"),
                OutputFormat::Json => println!("{}", json!({ "pending": null })),
            }
            Ok(())
        }
    }
}

/// Fail early when a global `--log` level is unknown
pub fn check_log_level(level: &str) -> Result<()> {
    match level {
        "error" | "warn" | "info" | "debug" | "trace" => Ok(()),
        other => bail!("Invalid log level '{}'", other),
    }
}
