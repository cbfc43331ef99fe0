/// Durable key/value slot
///
/// The plugin store and the pending-install handoff persist whole JSON
/// documents under fixed keys. Anything that can read, write, and remove a
/// string by key can back them.
use async_trait::async_trait;
use sdk::errors::PluginError;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[async_trait]
pub trait DurableSlot: Send + Sync {
    /// Value stored under `key`, if any
    async fn read(&self, key: &str) -> Result<Option<String>, PluginError>;

    /// Store `value` under `key`, replacing what was there
    async fn write(&self, key: &str, value: &str) -> Result<(), PluginError>;

    /// Remove `key`; removing a missing key is not an error
    async fn remove(&self, key: &str) -> Result<(), PluginError>;
}

/// Process-local slot for tests and ephemeral runs
#[derive(Debug, Default)]
pub struct MemorySlot {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot pre-filled with `(key, value)` pairs
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: Mutex::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl DurableSlot for MemorySlot {
    async fn read(&self, key: &str) -> Result<Option<String>, PluginError> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), PluginError> {
        self.values
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), PluginError> {
        self.values.lock().await.remove(key);
        Ok(())
    }
}

#[async_trait]
impl<T: DurableSlot + ?Sized> DurableSlot for std::sync::Arc<T> {
    async fn read(&self, key: &str) -> Result<Option<String>, PluginError> {
        (**self).read(key).await
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), PluginError> {
        (**self).write(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), PluginError> {
        (**self).remove(key).await
    }
}
