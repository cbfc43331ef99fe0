//! Manifest and installed-record types for plugin metadata

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Entry script used when a record does not name one
pub const DEFAULT_ENTRY: &str = "main.js";

/// Manifest as written by the plugin author, before validation
///
/// Every field is optional here; the validator decides what is missing.
/// Values that are absent, `null`, `""`, `false`, or `0` count as missing.
/// Numbers and `true` are accepted and stringified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ManifestDraft {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub main: Option<String>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(Value::Number(n)) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        Some(Value::Bool(true)) => Some("true".to_string()),
        _ => None,
    })
}

/// Validated plugin manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub id: String,
    pub name: String,
    pub version: String,
    pub author: String,
    #[serde(default)]
    pub description: Option<String>,
    pub main: String,
}

/// Content of one archive entry as persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileContent {
    /// UTF-8 text
    Text(String),
    /// Placeholder for entries that could not be decoded as text
    Binary(BinaryMarker),
}

/// Serialized as `{"type":"binary"}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BinaryMarker {
    Binary,
}

impl FileContent {
    pub fn binary() -> Self {
        Self::Binary(BinaryMarker::Binary)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_))
    }
}

/// An installed plugin as stored in the durable slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginRecord {
    pub id: String,
    pub name: String,
    pub version: String,
    pub author: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Entry script path; older records persisted without it
    #[serde(default = "default_main")]
    pub main: String,
    #[serde(default)]
    pub official: bool,
    #[serde(default)]
    pub approved: bool,
    /// Records written before the flag existed are enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub files: BTreeMap<String, FileContent>,
}

fn default_main() -> String {
    DEFAULT_ENTRY.to_string()
}

fn default_enabled() -> bool {
    true
}

impl PluginRecord {
    /// Build a freshly installed, enabled record
    pub fn from_manifest(
        manifest: Manifest,
        official: bool,
        approved: bool,
        files: BTreeMap<String, FileContent>,
    ) -> Self {
        Self {
            id: manifest.id,
            name: manifest.name,
            version: manifest.version,
            author: manifest.author,
            description: manifest.description,
            main: manifest.main,
            official,
            approved,
            enabled: true,
            files,
        }
    }

    /// Public identity handed to plugins through the capability object
    pub fn info(&self) -> PluginInfo {
        PluginInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            version: self.version.clone(),
            author: self.author.clone(),
        }
    }
}

/// Self-introspection data exposed to a running plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub id: String,
    pub name: String,
    pub version: String,
    pub author: String,
}
