//! EDBP Engine Library
//!
//! This library provides the plugin manager of the EDBP block editor:
//! the install pipeline, the persisted registry, and the plugin runtime.
//! It is used by both the main binary and integration tests.

/// Plugin archive reading and install progress
pub mod archive;

/// CLI interface module
pub mod cli;

/// Configuration management module
pub mod config;

/// Database persistence module
pub mod db;

/// Command handlers module
pub mod handlers;

/// In-memory block editor host
pub mod host;

/// Install, load, uninstall, and toggle orchestration
pub mod manager;

/// Lenient plugin.json parsing
pub mod manifest_parser;

/// One-shot install handoff between sessions
pub mod pending;

/// Runtime module for loading and running plugin scripts
pub mod runtime;

/// Persisted plugin registry
pub mod store;

/// Telemetry and Observability
pub mod telemetry;

/// Manifest validation
pub mod validator;
