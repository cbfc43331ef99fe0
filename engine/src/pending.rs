//! One-shot install handoff
//!
//! A web page or another editor instance can ask for a plugin to be
//! installed by leaving a record in the durable slot. The next session
//! consumes it once; records older than five minutes are discarded.

use sdk::errors::PluginError;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use crate::db::DurableSlot;

pub const PENDING_INSTALL_KEY: &str = "edbp_pending_install";

/// How long a pending install stays valid
pub const PENDING_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingInstall {
    /// Archive URL, direct or relay-wrapped
    pub url: String,
    pub plugin_id: String,
    /// Creation time in epoch milliseconds
    pub timestamp: u64,
}

impl PendingInstall {
    pub fn new(url: impl Into<String>, plugin_id: impl Into<String>, now_ms: u64) -> Self {
        Self {
            url: url.into(),
            plugin_id: plugin_id.into(),
            timestamp: now_ms,
        }
    }

    /// Timestamps in the future count as fresh
    pub fn is_fresh(&self, now_ms: u64) -> bool {
        u128::from(now_ms.saturating_sub(self.timestamp)) < PENDING_TTL.as_millis()
    }
}

/// Current wall-clock time in epoch milliseconds
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

pub async fn write_pending<S: DurableSlot + ?Sized>(
    slot: &S,
    pending: &PendingInstall,
) -> Result<(), PluginError> {
    let json = serde_json::to_string(pending)
        .map_err(|e| PluginError::Storage(format!("Failed to serialize pending install: {}", e)))?;

    slot.write(PENDING_INSTALL_KEY, &json).await
}

/// Consume the pending install, if a fresh one exists
///
/// The key is removed whether or not the record was usable.
pub async fn take_pending<S: DurableSlot + ?Sized>(
    slot: &S,
    now_ms: u64,
) -> Option<PendingInstall> {
    let raw = match slot.read(PENDING_INSTALL_KEY).await {
        Ok(raw) => raw?,
        Err(e) => {
            warn!("Failed to read pending install: {}", e);
            return None;
        }
    };

    if let Err(e) = slot.remove(PENDING_INSTALL_KEY).await {
        warn!("Failed to clear pending install: {}", e);
    }

    let pending: PendingInstall = match serde_json::from_str(&raw) {
        Ok(pending) => pending,
        Err(e) => {
            warn!("Discarding unreadable pending install: {}", e);
            return None;
        }
    };

    if !pending.is_fresh(now_ms) {
        debug!("Discarding expired pending install for '{}'", pending.plugin_id);
        return None;
    }

    Some(pending)
}
