//! EDBP SDK
//!
//! Shared library providing the types used by the plugin manager engine,
//! the discovery registry, and host editors that embed them.

/// Error types and handling
pub mod errors;

/// Host extension surface
pub mod host;

/// Manifest and installed-record types
pub mod manifest;

// Re-export commonly used types
pub use errors::{ParseFailure, PluginError, PluginErrorExt, ValidationFailure};
pub use host::{BlockDefinition, BlockHost, CodeGenerator, SharedHost, ToolboxCategory};
pub use manifest::{
    FileContent, Manifest, ManifestDraft, PluginInfo, PluginRecord, DEFAULT_ENTRY,
};
