//! Installed-plugin registry and its durable mirror
//!
//! The registry is an ordered list of records kept in memory and mirrored
//! to one durable key as a JSON array. The slot is the source of truth at
//! startup; afterwards memory leads and every mutation is followed by
//! [`PluginStore::save`].

use sdk::errors::PluginError;
use sdk::manifest::PluginRecord;
use tracing::{debug, info, warn};

use crate::db::DurableSlot;

/// Durable key holding the installed-plugin array
pub const PLUGINS_KEY: &str = "edbp_plugins";

pub struct PluginStore<S: DurableSlot> {
    slot: S,
    key: String,
    records: Vec<PluginRecord>,
}

impl<S: DurableSlot> PluginStore<S> {
    pub fn new(slot: S) -> Self {
        Self::with_key(slot, PLUGINS_KEY)
    }

    pub fn with_key(slot: S, key: impl Into<String>) -> Self {
        Self {
            slot,
            key: key.into(),
            records: Vec::new(),
        }
    }

    pub fn slot(&self) -> &S {
        &self.slot
    }

    /// Replace the in-memory registry with what the slot holds
    ///
    /// Missing data, unreadable data, and a failing slot all yield an empty
    /// registry. Records without an `enabled` flag come back enabled. When an
    /// id appears more than once the last copy wins, at the first position.
    pub async fn load_installed(&mut self) -> &[PluginRecord] {
        let stored = match self.slot.read(&self.key).await {
            Ok(Some(json)) => match serde_json::from_str::<Vec<PluginRecord>>(&json) {
                Ok(records) => records,
                Err(e) => {
                    warn!("Installed plugin data is corrupt, starting empty: {}", e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Failed to read installed plugins, starting empty: {}", e);
                Vec::new()
            }
        };

        let stored_len = stored.len();
        self.records = Vec::with_capacity(stored_len);
        for record in stored {
            self.upsert(record);
        }
        if self.records.len() < stored_len {
            warn!(
                "Dropped {} duplicate plugin record(s)",
                stored_len - self.records.len()
            );
        }

        info!("Loaded {} installed plugin(s)", self.records.len());
        &self.records
    }

    /// Write the full registry to the slot
    pub async fn save(&self) -> Result<(), PluginError> {
        let json = serde_json::to_string(&self.records)
            .map_err(|e| PluginError::Storage(format!("Failed to serialize plugins: {}", e)))?;

        self.slot.write(&self.key, &json).await?;
        debug!("Persisted {} plugin record(s)", self.records.len());
        Ok(())
    }

    /// Insert a record, replacing any record with the same id in place
    ///
    /// Returns `true` when an existing record was replaced.
    pub fn upsert(&mut self, record: PluginRecord) -> bool {
        match self.records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => {
                *existing = record;
                true
            }
            None => {
                self.records.push(record);
                false
            }
        }
    }

    /// Drop the record with `id`, returning it
    pub fn remove(&mut self, id: &str) -> Option<PluginRecord> {
        self.remove_indexed(id).map(|(_, record)| record)
    }

    /// Drop the record with `id`, returning it with its former position
    pub fn remove_indexed(&mut self, id: &str) -> Option<(usize, PluginRecord)> {
        let index = self.records.iter().position(|r| r.id == id)?;
        Some((index, self.records.remove(index)))
    }

    /// Put a record back at `index` (clamped to the end)
    pub fn insert_at(&mut self, index: usize, record: PluginRecord) {
        let index = index.min(self.records.len());
        self.records.insert(index, record);
    }

    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<(), PluginError> {
        let record = self.get_mut(id)?;
        record.enabled = enabled;
        Ok(())
    }

    pub fn set_trust(&mut self, id: &str, official: bool, approved: bool) -> Result<(), PluginError> {
        let record = self.get_mut(id)?;
        record.official = official;
        record.approved = approved;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&PluginRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut PluginRecord, PluginError> {
        self.records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| PluginError::NotInstalled(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Records in registry order
    pub fn records(&self) -> &[PluginRecord] {
        &self.records
    }
}
